//! Pre-verification gas accounting.
//!
//! `preVerificationGas` covers the cost the entry point cannot meter
//! on-chain: the amortized base transaction cost and the calldata bytes of
//! the operation itself. It has to be priced before the final signature
//! and before `preVerificationGas` itself exist, so missing fields enter
//! the calculation at stable dummy values.

use alloy_primitives::{Bytes, U256};
use tracing::debug;

use crate::pack::{PackMode, pack_user_op};
use crate::user_operation::{UserOperation, UserOperationDraft};

/// Dummy `preVerificationGas` substituted while the real value is unknown;
/// only its calldata bytes matter.
const DUMMY_PRE_VERIFICATION_GAS: u64 = 21_000;

/// Byte-level cost model for an operation's share of a bundle transaction.
/// Not mutated after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasOverheads {
    /// Base transaction cost, amortized over the assumed bundle size.
    pub fixed: u64,
    /// Flat per-operation overhead.
    pub per_user_op: u64,
    /// Cost per 32-byte word of the encoded operation.
    pub per_user_op_word: u64,
    /// Calldata cost of a zero byte.
    pub zero_byte: u64,
    /// Calldata cost of a non-zero byte.
    pub non_zero_byte: u64,
    /// Assumed number of operations sharing the bundle transaction.
    pub bundle_size: u64,
    /// Assumed signature length in bytes.
    pub sig_size: usize,
}

impl Default for GasOverheads {
    fn default() -> Self {
        Self {
            fixed: 21_000,
            per_user_op: 18_300,
            per_user_op_word: 4,
            zero_byte: 4,
            non_zero_byte: 16,
            bundle_size: 1,
            sig_size: 65,
        }
    }
}

/// Estimate the `preVerificationGas` of a possibly still partial operation.
///
/// Pending fields are replaced with dummies (a 21000 placeholder for
/// `preVerificationGas`, an all-ones signature of `sig_size` bytes, zero or
/// empty otherwise) so the estimate is stable across the fill cycle. The
/// cost-mode encoding is then priced byte by byte.
pub fn estimate_pre_verification_gas(draft: &UserOperationDraft, overheads: &GasOverheads) -> u64 {
    let op = with_cost_dummies(draft, overheads.sig_size);
    let packed = pack_user_op(&op, PackMode::ForCost);

    let call_data_cost: u64 = packed
        .iter()
        .map(|byte| {
            if *byte == 0 {
                overheads.zero_byte
            } else {
                overheads.non_zero_byte
            }
        })
        .sum();

    let bundle_size = overheads.bundle_size.max(1);
    let amortized_fixed = (overheads.fixed + bundle_size / 2) / bundle_size;
    let words = (packed.len() as u64).div_ceil(32);
    let total = call_data_cost
        + amortized_fixed
        + overheads.per_user_op
        + overheads.per_user_op_word * words;

    debug!(
        packed_len = packed.len(),
        call_data_cost,
        total,
        "estimated pre-verification gas"
    );
    total
}

fn with_cost_dummies(draft: &UserOperationDraft, sig_size: usize) -> UserOperation {
    UserOperation {
        sender: draft.sender.unwrap_or_default(),
        nonce: draft.nonce.unwrap_or_default(),
        init_code: draft.init_code.clone().unwrap_or_default(),
        call_data: draft.call_data.clone().unwrap_or_default(),
        call_gas_limit: draft.call_gas_limit.unwrap_or_default(),
        verification_gas_limit: draft.verification_gas_limit.unwrap_or_default(),
        pre_verification_gas: draft
            .pre_verification_gas
            .unwrap_or(U256::from(DUMMY_PRE_VERIFICATION_GAS)),
        max_fee_per_gas: draft.max_fee_per_gas.unwrap_or_default(),
        max_priority_fee_per_gas: draft.max_priority_fee_per_gas.unwrap_or_default(),
        paymaster_and_data: draft.paymaster_and_data.clone().unwrap_or_default(),
        signature: draft
            .signature
            .clone()
            .unwrap_or_else(|| Bytes::from(vec![1u8; sig_size])),
    }
}
