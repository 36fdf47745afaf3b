//! JSON-RPC client for an ERC-4337 bundler endpoint.

use alloy_primitives::{Address, B256, U64, U256};
use jsonrpsee::{
    core::{ClientError, client::ClientT},
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;
use userop_core::{ErrorFrame, OperationError, RevertData, UserOperation, UserOperationDraft, enrich};

/// Gas figures returned by `eth_estimateUserOperationGas`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    pub pre_verification_gas: U256,
    /// Some bundlers still report this under the pre-release
    /// `verificationGas` name.
    #[serde(alias = "verificationGas")]
    pub verification_gas_limit: U256,
    pub call_gas_limit: U256,
}

/// HTTP client for a single bundler, pinned to one entry point and one
/// chain id. The bundler's chain id is checked against the configured one
/// exactly once, before the first request that would otherwise reach it.
#[derive(Debug)]
pub struct BundlerClient {
    client: HttpClient,
    url: Url,
    entry_point: Address,
    chain_id: u64,
    /// Chain id the bundler reported, fetched at most once; a mismatch is
    /// re-raised from the cached value without another request.
    remote_chain_id: OnceCell<u64>,
}

impl BundlerClient {
    pub fn new(url: Url, entry_point: Address, chain_id: u64) -> Result<Self, OperationError> {
        let client = HttpClientBuilder::default()
            .build(url.as_str())
            .map_err(|err| OperationError::Rpc(err.to_string()))?;
        Ok(Self {
            client,
            url,
            entry_point,
            chain_id,
            remote_chain_id: OnceCell::new(),
        })
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Submit a resolved, signed operation. Returns the operation hash the
    /// bundler assigned, usable to look the operation up later.
    pub async fn send_user_operation(&self, op: &UserOperation) -> Result<B256, OperationError> {
        self.ensure_chain_id().await?;
        debug!(sender = %op.sender, nonce = %op.nonce, url = %self.url, "sending user operation");
        self.client
            .request("eth_sendUserOperation", (op.clone(), self.entry_point))
            .await
            .map_err(classify)
    }

    /// Ask the bundler for gas figures over a partial operation. Pending
    /// draft fields are omitted from the wire object.
    pub async fn estimate_user_operation_gas(
        &self,
        draft: &UserOperationDraft,
    ) -> Result<GasEstimate, OperationError> {
        self.ensure_chain_id().await?;
        self.client
            .request("eth_estimateUserOperationGas", (draft.clone(), self.entry_point))
            .await
            .map_err(classify)
    }

    async fn ensure_chain_id(&self) -> Result<(), OperationError> {
        let actual = *self
            .remote_chain_id
            .get_or_try_init(|| async {
                let chain: U64 = self
                    .client
                    .request("eth_chainId", rpc_params![])
                    .await
                    .map_err(|err| OperationError::Rpc(err.to_string()))?;
                debug!(chain_id = %chain, url = %self.url, "fetched bundler chain id");
                Ok::<_, OperationError>(chain.to::<u64>())
            })
            .await?;
        if actual != self.chain_id {
            return Err(OperationError::NetworkMismatch {
                expected: self.chain_id,
                actual,
            });
        }
        Ok(())
    }
}

/// Map a transport error to [`OperationError`]. Call errors carry the
/// bundler's nested cause chain; anything decodable in it is surfaced,
/// everything else passes through unchanged.
fn classify(err: ClientError) -> OperationError {
    match err {
        ClientError::Call(call) => {
            let data = call
                .data()
                .and_then(|raw| serde_json::from_str::<RevertData>(raw.get()).ok());
            let mut frame = ErrorFrame {
                message: call.message().to_string(),
                data,
            };
            let decoded = enrich(&mut frame);
            OperationError::Submission { frame, decoded }
        }
        other => OperationError::Rpc(other.to_string()),
    }
}
