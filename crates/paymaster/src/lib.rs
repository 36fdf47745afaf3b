//! Fee sponsorship: the closed set of paymaster data providers.
//!
//! Only a fixed set of sponsor behaviors exists in this domain, so the
//! providers are a tagged enum dispatched by match rather than an open
//! trait hierarchy. Every variant tolerates a draft whose gas, nonce and
//! code fields are still pending; the data it returns is provisional
//! until the draft is final.

use alloy_primitives::{Address, B256, Bytes, keccak256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolValue;
use tracing::debug;
use userop_core::{OperationError, UserOperationDraft};

/// Source of the `paymasterAndData` field.
#[derive(Debug)]
pub enum PaymasterProvider {
    /// No sponsorship; `paymasterAndData` stays empty.
    None,
    /// Bare sponsor address, no attached data. The sponsor contract
    /// accepts every operation it is asked to fund.
    Static { paymaster: Address },
    /// Sponsor address plus the operation identity hash; the sponsor
    /// contract re-derives authorization from on-chain token state
    /// instead of checking a signature.
    TokenSponsor { paymaster: Address },
    /// Sponsor address plus a verifier signature over the identity hash,
    /// checked by the sponsor contract on-chain.
    Verifying {
        paymaster: Address,
        verifier: PrivateKeySigner,
    },
}

impl PaymasterProvider {
    /// Compute the value to embed as `paymasterAndData`, or `None` to
    /// leave the field empty.
    pub async fn sponsor_data(
        &self,
        draft: &UserOperationDraft,
    ) -> Result<Option<Bytes>, OperationError> {
        match self {
            Self::None => Ok(None),
            Self::Static { paymaster } => Ok(Some(paymaster.as_slice().to_vec().into())),
            Self::TokenSponsor { paymaster } => {
                let hash = identity_hash(draft);
                debug!(paymaster = %paymaster, identity = %hash, "attaching token sponsor data");
                Ok(Some(concat_paymaster(*paymaster, hash.as_slice())))
            }
            Self::Verifying {
                paymaster,
                verifier,
            } => {
                let hash = identity_hash(draft);
                let signature = verifier
                    .sign_message(hash.as_slice())
                    .await
                    .map_err(|err| OperationError::Signer(err.to_string()))?;
                debug!(paymaster = %paymaster, verifier = %verifier.address(), "attaching verified sponsor data");
                Ok(Some(concat_paymaster(
                    *paymaster,
                    &signature.as_bytes()[..],
                )))
            }
        }
    }
}

/// Hash over the identity fields of a (possibly partial) operation:
/// sender, nonce, the init code and call data digests, and the five
/// gas/fee words. Pending fields enter at their zero/empty defaults.
///
/// The init code and call data digests are distinct inputs; a sponsor
/// contract that expects the init code digest in both slots is relying on
/// a defect, not a design.
pub fn identity_hash(draft: &UserOperationDraft) -> B256 {
    let encoded = (
        draft.sender.unwrap_or_default(),
        draft.nonce.unwrap_or_default(),
        keccak256(draft.init_code.clone().unwrap_or_default()),
        keccak256(draft.call_data.clone().unwrap_or_default()),
        draft.call_gas_limit.unwrap_or_default(),
        draft.verification_gas_limit.unwrap_or_default(),
        draft.pre_verification_gas.unwrap_or_default(),
        draft.max_fee_per_gas.unwrap_or_default(),
        draft.max_priority_fee_per_gas.unwrap_or_default(),
    )
        .abi_encode();
    keccak256(encoded)
}

fn concat_paymaster(paymaster: Address, data: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(20 + data.len());
    out.extend_from_slice(paymaster.as_slice());
    out.extend_from_slice(data);
    out.into()
}
