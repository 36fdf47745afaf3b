//! Failure taxonomy shared across the workspace.

use thiserror::Error;

use crate::revert::{DecodedRevert, ErrorFrame};

/// Everything that can go wrong while assembling, signing or submitting a
/// user operation. Component-local failures abort the pipeline; retry
/// policy belongs to the caller.
#[derive(Debug, Error)]
pub enum OperationError {
    /// A draft field was still pending when a resolved operation was
    /// required. The canonical encodings and the operation hash only
    /// accept fully resolved operations.
    #[error("user operation field `{0}` is not resolved")]
    Unresolved(&'static str),

    /// The account is not deployed and no factory address was configured,
    /// so no init code can be produced.
    #[error("no factory configured to build init code for an undeployed account")]
    NoFactoryConfigured,

    /// The adapter could not resolve required on-chain account state.
    #[error("account resolution failed: {0}")]
    AccountResolution(String),

    /// The bundler reports a different network than the one this client
    /// was configured for.
    #[error("bundler is on chain id {actual}, expected {expected}")]
    NetworkMismatch { expected: u64, actual: u64 },

    /// The signing backend refused to produce a signature.
    #[error("signing failed: {0}")]
    Signer(String),

    /// Transport-level RPC failure, nothing decodable attached.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The bundler rejected the submission. The frame carries the nested
    /// cause chain as received; `decoded` is present when a revert payload
    /// somewhere in that chain matched a known selector.
    #[error("submission rejected: {}", frame.message)]
    Submission {
        frame: ErrorFrame,
        decoded: Option<DecodedRevert>,
    },
}
