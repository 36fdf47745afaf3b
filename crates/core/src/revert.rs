//! Decoding of opaque revert payloads into structured failures.
//!
//! The entry point reverts either with Solidity's generic `Error(string)`
//! or with `FailedOp(uint256,address,string)` tagging the failing
//! operation inside a batch. Anything else is passed through opaque.

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{SolError, sol};
use serde::{Deserialize, Serialize};
use tracing::debug;

sol! {
    /// Solidity's built-in revert carrying a bare message. Selector
    /// 0x08c379a0, fixed by the ABI.
    error Error(string reason);
    /// Entry-point revert naming the failing operation. Selector
    /// 0x00fa072b, fixed by the entry point interface.
    error FailedOp(uint256 opIndex, address paymaster, string reason);
}

/// Structured failure reconstructed from a revert payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRevert {
    pub message: String,
    /// Index of the failing operation within the submitted batch, present
    /// only for `FailedOp` reverts.
    pub op_index: Option<u64>,
    /// Paymaster blamed by the entry point; a zero address is omitted.
    pub paymaster: Option<Address>,
}

/// Decode a revert payload, returning `None` when neither known selector
/// matches. Callers treat a miss as an opaque failure, not an error.
pub fn decode_revert(data: &[u8]) -> Option<DecodedRevert> {
    if data.starts_with(&Error::SELECTOR) {
        let err = Error::abi_decode(data).ok()?;
        return Some(DecodedRevert {
            message: err.reason,
            op_index: None,
            paymaster: None,
        });
    }
    if data.starts_with(&FailedOp::SELECTOR) {
        let err = FailedOp::abi_decode(data).ok()?;
        let paymaster = (err.paymaster != Address::ZERO).then_some(err.paymaster);
        let mut message = format!("FailedOp: {}", err.reason);
        if let Some(paymaster) = paymaster {
            message = format!("{message} (paymaster {paymaster})");
        }
        return Some(DecodedRevert {
            message,
            op_index: Some(u64::try_from(err.opIndex).unwrap_or(u64::MAX)),
            paymaster,
        });
    }
    None
}

/// One link of a nested error/cause chain, as surfaced by JSON-RPC nodes:
/// a message plus either raw revert bytes or a wrapped inner error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<RevertData>,
}

/// Payload attached to an [`ErrorFrame`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RevertData {
    /// Raw revert bytes, hex-encoded on the wire.
    Raw(Bytes),
    /// A further wrapped error.
    Nested(Box<ErrorFrame>),
}

impl ErrorFrame {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: RevertData) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Walk the cause chain to its innermost raw payload and decode it.
///
/// On a hit the outer message is rewritten to the decoded one, and when an
/// operation index was recovered the raw payload itself is rewritten to
/// the `Error(string)` encoding of that message, normalizing downstream
/// handling. A miss leaves the frame untouched.
pub fn enrich(frame: &mut ErrorFrame) -> Option<DecodedRevert> {
    let decoded = {
        let raw = innermost_raw(frame)?;
        let decoded = decode_revert(raw)?;
        if decoded.op_index.is_some() {
            *raw = Error { reason: decoded.message.clone() }.abi_encode().into();
        }
        decoded
    };
    debug!(message = %decoded.message, op_index = ?decoded.op_index, "decoded revert payload");
    frame.message = decoded.message.clone();
    Some(decoded)
}

fn innermost_raw(frame: &mut ErrorFrame) -> Option<&mut Bytes> {
    match frame.data.as_mut()? {
        RevertData::Raw(bytes) => Some(bytes),
        RevertData::Nested(inner) => innermost_raw(inner),
    }
}
