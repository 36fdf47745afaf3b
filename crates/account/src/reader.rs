//! Chain-read seam used by the account adapters.
//!
//! Kept narrow so adapters stay testable without a network: code lookup,
//! a bare `eth_call`, and the entry point's counterfactual sender
//! resolution, which reverts with the resolved address by design.

use alloy_primitives::{Address, Bytes, TxKind};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::{TransactionInput, TransactionRequest};
use alloy_sol_types::{SolCall, SolError, sol};
use async_trait::async_trait;
use tracing::debug;
use userop_core::OperationError;

sol! {
    /// Entry point hook resolving the account address an init code would
    /// deploy to. Always reverts, carrying the answer.
    function getSenderAddress(bytes initCode);
    /// Revert payload of `getSenderAddress`.
    error SenderAddressResult(address sender);
}

/// On-chain reads the adapters depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateReader: Send + Sync {
    /// Byte length of the code deployed at `address`.
    async fn code_size(&self, address: Address) -> Result<usize, OperationError>;

    /// `eth_call` against `to`, returning the raw return data.
    async fn eth_call(&self, to: Address, input: Bytes) -> Result<Bytes, OperationError>;

    /// Ask the entry point which address `init_code` deploys to.
    async fn resolve_sender(
        &self,
        entry_point: Address,
        init_code: Bytes,
    ) -> Result<Address, OperationError>;
}

#[async_trait]
impl StateReader for RootProvider {
    async fn code_size(&self, address: Address) -> Result<usize, OperationError> {
        let code = self
            .get_code_at(address)
            .await
            .map_err(|err| OperationError::AccountResolution(err.to_string()))?;
        Ok(code.len())
    }

    async fn eth_call(&self, to: Address, input: Bytes) -> Result<Bytes, OperationError> {
        let tx = TransactionRequest {
            to: Some(TxKind::Call(to)),
            input: TransactionInput::new(input),
            ..Default::default()
        };
        Provider::call(self, tx)
            .await
            .map_err(|err| OperationError::AccountResolution(err.to_string()))
    }

    async fn resolve_sender(
        &self,
        entry_point: Address,
        init_code: Bytes,
    ) -> Result<Address, OperationError> {
        let call = getSenderAddressCall {
            initCode: init_code,
        };
        let tx = TransactionRequest {
            to: Some(TxKind::Call(entry_point)),
            input: TransactionInput::new(call.abi_encode().into()),
            ..Default::default()
        };

        // getSenderAddress reverts with SenderAddressResult on success.
        match Provider::call(self, tx).await {
            Ok(_) => Err(OperationError::AccountResolution(
                "entry point did not revert with a sender address".to_string(),
            )),
            Err(err) => {
                let data = err
                    .as_error_resp()
                    .and_then(|payload| payload.as_revert_data())
                    .ok_or_else(|| {
                        OperationError::AccountResolution(format!(
                            "getSenderAddress failed without revert data: {err}"
                        ))
                    })?;
                let result = SenderAddressResult::abi_decode(&data)
                    .map_err(|err| OperationError::AccountResolution(err.to_string()))?;
                debug!(sender = %result.sender, "resolved counterfactual sender");
                Ok(result.sender)
            }
        }
    }
}
