//! Canonical encodings of a user operation and the entry-point-bound hash.
//!
//! Two encodings exist and they serve different masters: the signature
//! form is a fixed 320-byte string the operation hash binds to, the cost
//! form is the literal ABI calldata whose bytes are paid for on-chain.

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::SolValue;

use crate::user_operation::UserOperation;

/// Selects which canonical encoding [`pack_user_op`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackMode {
    /// Fixed-size form hashed for signing: the variable-length byte fields
    /// collapse to their keccak256 digests and the signature is left out,
    /// so the encoding exists before a signature does and field boundaries
    /// cannot be shifted between the dynamic fields.
    ForSignature,
    /// Full ABI parameter encoding of all eleven fields. Its length and
    /// byte composition drive calldata cost accounting.
    ForCost,
}

/// Encode `op` canonically in the requested mode.
pub fn pack_user_op(op: &UserOperation, mode: PackMode) -> Bytes {
    match mode {
        PackMode::ForSignature => pack_for_signature(op),
        PackMode::ForCost => pack_for_cost(op),
    }
}

/// Operation hash bound to a specific entry point and chain, the exact
/// value an account signs. Binding the entry point address and chain id
/// prevents replay against another dispatcher or network.
pub fn user_op_hash(op: &UserOperation, entry_point: Address, chain_id: u64) -> B256 {
    let packed_hash = keccak256(pack_user_op(op, PackMode::ForSignature));
    let bound = (packed_hash, entry_point, U256::from(chain_id)).abi_encode();
    keccak256(bound)
}

fn pack_for_signature(op: &UserOperation) -> Bytes {
    let mut out = Vec::with_capacity(10 * 32);
    push_address(&mut out, op.sender);
    push_word(&mut out, op.nonce);
    out.extend_from_slice(keccak256(&op.init_code).as_slice());
    out.extend_from_slice(keccak256(&op.call_data).as_slice());
    push_word(&mut out, op.call_gas_limit);
    push_word(&mut out, op.verification_gas_limit);
    push_word(&mut out, op.pre_verification_gas);
    push_word(&mut out, op.max_fee_per_gas);
    push_word(&mut out, op.max_priority_fee_per_gas);
    out.extend_from_slice(keccak256(&op.paymaster_and_data).as_slice());
    out.into()
}

fn pack_for_cost(op: &UserOperation) -> Bytes {
    // Standard ABI head/tail layout: 11 head words, four dynamic tails.
    let head_len = 11 * 32;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    push_address(&mut head, op.sender);
    push_word(&mut head, op.nonce);
    push_dynamic(&mut head, &mut tail, head_len, &op.init_code);
    push_dynamic(&mut head, &mut tail, head_len, &op.call_data);
    push_word(&mut head, op.call_gas_limit);
    push_word(&mut head, op.verification_gas_limit);
    push_word(&mut head, op.pre_verification_gas);
    push_word(&mut head, op.max_fee_per_gas);
    push_word(&mut head, op.max_priority_fee_per_gas);
    push_dynamic(&mut head, &mut tail, head_len, &op.paymaster_and_data);
    push_dynamic(&mut head, &mut tail, head_len, &op.signature);

    head.extend_from_slice(&tail);
    head.into()
}

fn push_word(out: &mut Vec<u8>, value: U256) {
    out.extend_from_slice(&value.to_be_bytes::<32>());
}

fn push_address(out: &mut Vec<u8>, address: Address) {
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(address.as_slice());
}

fn push_dynamic(head: &mut Vec<u8>, tail: &mut Vec<u8>, head_len: usize, data: &[u8]) {
    push_word(head, U256::from(head_len + tail.len()));
    push_word(tail, U256::from(data.len()));
    tail.extend_from_slice(data);
    let padded = data.len().div_ceil(32) * 32;
    tail.resize(tail.len() + padded - data.len(), 0);
}
