//! EIP-4337 user operation data model.
//!
//! Operations exist in two forms: a [`UserOperationDraft`] whose fields are
//! filled in progressively while the operation is assembled, and a
//! [`UserOperation`] with every field concrete. Only the resolved form may
//! be canonically encoded or hashed; [`UserOperationDraft::resolve`] is the
//! single transition between the two.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::error::OperationError;

/// Fully resolved user operation, as relayed to the bundler.
///
/// This is also the wire form: serde produces the camelCase, hex-encoded
/// JSON object that `eth_sendUserOperation` expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

/// Partially assembled user operation. Each field is either concrete or
/// still pending; pending fields are skipped on the wire, so a draft can
/// be sent as-is to `eth_estimateUserOperationGas`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_code: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_gas_limit: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_gas_limit: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_verification_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymaster_and_data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Bytes>,
}

impl UserOperationDraft {
    /// Resolve the draft into a concrete [`UserOperation`].
    ///
    /// Every field feeding the canonical encodings must be present; the
    /// first missing one is reported by name. `paymasterAndData` and
    /// `signature` default to empty, which is their canonical unsponsored /
    /// unsigned value.
    pub fn resolve(&self) -> Result<UserOperation, OperationError> {
        Ok(UserOperation {
            sender: self.sender.ok_or(OperationError::Unresolved("sender"))?,
            nonce: self.nonce.ok_or(OperationError::Unresolved("nonce"))?,
            init_code: self
                .init_code
                .clone()
                .ok_or(OperationError::Unresolved("initCode"))?,
            call_data: self
                .call_data
                .clone()
                .ok_or(OperationError::Unresolved("callData"))?,
            call_gas_limit: self
                .call_gas_limit
                .ok_or(OperationError::Unresolved("callGasLimit"))?,
            verification_gas_limit: self
                .verification_gas_limit
                .ok_or(OperationError::Unresolved("verificationGasLimit"))?,
            pre_verification_gas: self
                .pre_verification_gas
                .ok_or(OperationError::Unresolved("preVerificationGas"))?,
            max_fee_per_gas: self
                .max_fee_per_gas
                .ok_or(OperationError::Unresolved("maxFeePerGas"))?,
            max_priority_fee_per_gas: self
                .max_priority_fee_per_gas
                .ok_or(OperationError::Unresolved("maxPriorityFeePerGas"))?,
            paymaster_and_data: self.paymaster_and_data.clone().unwrap_or_default(),
            signature: self.signature.clone().unwrap_or_default(),
        })
    }
}

impl From<UserOperation> for UserOperationDraft {
    fn from(op: UserOperation) -> Self {
        Self {
            sender: Some(op.sender),
            nonce: Some(op.nonce),
            init_code: Some(op.init_code),
            call_data: Some(op.call_data),
            call_gas_limit: Some(op.call_gas_limit),
            verification_gas_limit: Some(op.verification_gas_limit),
            pre_verification_gas: Some(op.pre_verification_gas),
            max_fee_per_gas: Some(op.max_fee_per_gas),
            max_priority_fee_per_gas: Some(op.max_priority_fee_per_gas),
            paymaster_and_data: Some(op.paymaster_and_data),
            signature: Some(op.signature),
        }
    }
}
