//! Account adapters: per-account data and signing for user operations.
//!
//! An adapter knows how to deploy its account (init code), where the
//! account lives (counterfactual address resolution), its sequence number,
//! how to wrap a call for the account's execute entry and how the owner
//! signs an operation hash.

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use userop_core::OperationError;

pub mod reader;
pub mod simple;
pub mod token;

pub use reader::StateReader;
pub use simple::SimpleAccount;
pub use token::TokenAccount;

/// Capability set the operation builder needs from an account.
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Counterfactual or deployed address of the account contract.
    async fn get_account_address(&self) -> Result<Address, OperationError>;

    /// True while the account contract has no code on-chain.
    async fn check_account_phantom(&self) -> Result<bool, OperationError>;

    /// Value for the `initCode` field: factory address followed by the
    /// encoded create call while the account is phantom, empty once
    /// deployed.
    async fn get_init_code(&self) -> Result<Bytes, OperationError>;

    /// Current sequence number of the account; zero while phantom.
    async fn get_nonce(&self) -> Result<U256, OperationError>;

    /// Encode `(target, value, data)` into the account's execute call.
    async fn encode_execute(
        &self,
        target: Address,
        value: U256,
        data: Bytes,
    ) -> Result<Bytes, OperationError>;

    /// Sign a bound operation hash on behalf of the account owner.
    async fn sign_op_hash(&self, hash: B256) -> Result<Bytes, OperationError>;
}
