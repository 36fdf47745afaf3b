//! Assembles complete user operations from a call request.
//!
//! Building is strictly sequential: account state, call gas, fees,
//! sponsor data, pre-verification gas, then resolve/hash/sign. Every
//! call starts from a fresh draft; nothing is cached between builds.

use alloy_primitives::{Address, B256, Bytes, TxKind, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::{TransactionInput, TransactionRequest};
use async_trait::async_trait;
use tracing::debug;
use userop_account::AccountApi;
use userop_core::{
    GasOverheads, OperationError, UserOperation, UserOperationDraft,
    estimate_pre_verification_gas, user_op_hash,
};
use userop_paymaster::PaymasterProvider;

use crate::bundler::{BundlerClient, GasEstimate};

/// Verification gas budget used when the caller does not override it.
/// Generous enough for signature validation plus a first-time account
/// deployment on the reference account implementations.
pub const DEFAULT_VERIFICATION_GAS_LIMIT: u64 = 100_000;

/// Node-side gas queries the builder needs. Split out from the provider
/// so builds can be tested without a node.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GasOracle: Send + Sync {
    /// Gas for executing `data` against `to`, as called from `from`.
    async fn estimate_call_gas(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> Result<u64, OperationError>;

    /// Current `(max_fee_per_gas, max_priority_fee_per_gas)` estimate.
    async fn fee_estimate(&self) -> Result<(u128, u128), OperationError>;
}

#[async_trait]
impl GasOracle for RootProvider {
    async fn estimate_call_gas(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> Result<u64, OperationError> {
        let request = TransactionRequest {
            from: Some(from),
            to: Some(TxKind::Call(to)),
            input: TransactionInput::new(data),
            ..Default::default()
        };
        self.estimate_gas(request)
            .await
            .map_err(|err| OperationError::Rpc(err.to_string()))
    }

    async fn fee_estimate(&self) -> Result<(u128, u128), OperationError> {
        let fees = self
            .estimate_eip1559_fees()
            .await
            .map_err(|err| OperationError::Rpc(err.to_string()))?;
        Ok((fees.max_fee_per_gas, fees.max_priority_fee_per_gas))
    }
}

/// A call the account should execute, with optional gas overrides.
/// Unset limits and fees are estimated at build time.
#[derive(Debug, Clone, Default)]
pub struct ExecuteRequest {
    pub target: Address,
    pub value: U256,
    pub data: Bytes,
    pub call_gas_limit: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

/// Ties an account adapter, a fee sponsor, a gas oracle and a bundler
/// together into the build/sign/submit pipeline.
pub struct OperationBuilder<A, G> {
    account: A,
    paymaster: PaymasterProvider,
    gas: G,
    bundler: BundlerClient,
    overheads: GasOverheads,
}

impl<A, G> std::fmt::Debug for OperationBuilder<A, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationBuilder")
            .field("paymaster", &self.paymaster)
            .field("bundler", &self.bundler)
            .field("overheads", &self.overheads)
            .finish_non_exhaustive()
    }
}

impl<A: AccountApi, G: GasOracle> OperationBuilder<A, G> {
    pub fn new(account: A, paymaster: PaymasterProvider, gas: G, bundler: BundlerClient) -> Self {
        Self {
            account,
            paymaster,
            gas,
            bundler,
            overheads: GasOverheads::default(),
        }
    }

    pub fn with_overheads(mut self, overheads: GasOverheads) -> Self {
        self.overheads = overheads;
        self
    }

    /// Assemble everything except the signature. The returned draft is
    /// fully populated apart from `signature` and resolves cleanly.
    pub async fn build_unsigned(
        &self,
        request: &ExecuteRequest,
    ) -> Result<UserOperationDraft, OperationError> {
        let sender = self.account.get_account_address().await?;
        let init_code = self.account.get_init_code().await?;
        let nonce = self.account.get_nonce().await?;
        let call_data = self
            .account
            .encode_execute(request.target, request.value, request.data.clone())
            .await?;

        let call_gas_limit = match request.call_gas_limit {
            Some(limit) => limit,
            None => U256::from(
                self.gas
                    .estimate_call_gas(self.bundler.entry_point(), sender, call_data.clone())
                    .await?,
            ),
        };
        let (max_fee_per_gas, max_priority_fee_per_gas) =
            match (request.max_fee_per_gas, request.max_priority_fee_per_gas) {
                (Some(fee), Some(priority)) => (fee, priority),
                (fee, priority) => {
                    let (estimated_fee, estimated_priority) = self.gas.fee_estimate().await?;
                    (
                        fee.unwrap_or(U256::from(estimated_fee)),
                        priority.unwrap_or(U256::from(estimated_priority)),
                    )
                }
            };

        let mut draft = UserOperationDraft {
            sender: Some(sender),
            nonce: Some(nonce),
            init_code: Some(init_code),
            call_data: Some(call_data),
            call_gas_limit: Some(call_gas_limit),
            verification_gas_limit: Some(U256::from(DEFAULT_VERIFICATION_GAS_LIMIT)),
            max_fee_per_gas: Some(max_fee_per_gas),
            max_priority_fee_per_gas: Some(max_priority_fee_per_gas),
            ..Default::default()
        };

        // Sponsor data becomes part of what pre-verification gas pays for,
        // so it is attached before the estimate.
        if let Some(data) = self.paymaster.sponsor_data(&draft).await? {
            draft.paymaster_and_data = Some(data);
        }
        draft.pre_verification_gas = Some(U256::from(estimate_pre_verification_gas(
            &draft,
            &self.overheads,
        )));
        Ok(draft)
    }

    /// Build, hash and sign: the complete operation, ready to submit.
    pub async fn build(&self, request: &ExecuteRequest) -> Result<UserOperation, OperationError> {
        let draft = self.build_unsigned(request).await?;
        let mut op = draft.resolve()?;
        let hash = user_op_hash(&op, self.bundler.entry_point(), self.bundler.chain_id());
        op.signature = self.account.sign_op_hash(hash).await?;
        debug!(sender = %op.sender, %hash, "built signed user operation");
        Ok(op)
    }

    /// Build, sign and hand the operation to the bundler.
    pub async fn submit(&self, request: &ExecuteRequest) -> Result<B256, OperationError> {
        let op = self.build(request).await?;
        self.bundler.send_user_operation(&op).await
    }

    /// Build an unsigned draft and ask the bundler for its gas figures.
    pub async fn estimate(&self, request: &ExecuteRequest) -> Result<GasEstimate, OperationError> {
        let draft = self.build_unsigned(request).await?;
        self.bundler.estimate_user_operation_gas(&draft).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use jsonrpsee::{RpcModule, server::Server};
    use url::Url;

    const ENTRY_POINT: Address = address!("5ff137d4b0fdcd49dca30c7cf57e578a026d2789");
    const ACCOUNT: Address = address!("2222222222222222222222222222222222222222");
    const TARGET: Address = address!("3333333333333333333333333333333333333333");
    const CHAIN_ID: u64 = 8453;

    struct StubAccount {
        owner: PrivateKeySigner,
    }

    impl StubAccount {
        fn new() -> Self {
            Self {
                owner: PrivateKeySigner::random(),
            }
        }
    }

    #[async_trait]
    impl AccountApi for StubAccount {
        async fn get_account_address(&self) -> Result<Address, OperationError> {
            Ok(ACCOUNT)
        }

        async fn check_account_phantom(&self) -> Result<bool, OperationError> {
            Ok(true)
        }

        async fn get_init_code(&self) -> Result<Bytes, OperationError> {
            Ok(vec![0xfa; 24].into())
        }

        async fn get_nonce(&self) -> Result<U256, OperationError> {
            Ok(U256::ZERO)
        }

        async fn encode_execute(
            &self,
            target: Address,
            _value: U256,
            data: Bytes,
        ) -> Result<Bytes, OperationError> {
            let mut out = target.as_slice().to_vec();
            out.extend_from_slice(&data);
            Ok(out.into())
        }

        async fn sign_op_hash(&self, hash: B256) -> Result<Bytes, OperationError> {
            let signature = self
                .owner
                .sign_message_sync(hash.as_slice())
                .map_err(|err| OperationError::Signer(err.to_string()))?;
            Ok(signature.as_bytes().to_vec().into())
        }
    }

    /// Client pointed at a port nothing listens on; fine for builds that
    /// never reach the bundler.
    fn offline_bundler() -> BundlerClient {
        let url = Url::parse("http://127.0.0.1:1").unwrap();
        BundlerClient::new(url, ENTRY_POINT, CHAIN_ID).unwrap()
    }

    fn request() -> ExecuteRequest {
        ExecuteRequest {
            target: TARGET,
            value: U256::from(1),
            data: vec![0xde, 0xad].into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn build_unsigned_fills_every_gas_field() {
        let mut oracle = MockGasOracle::new();
        oracle
            .expect_estimate_call_gas()
            .withf(|from, to, _| *from == ENTRY_POINT && *to == ACCOUNT)
            .times(1)
            .returning(|_, _, _| Ok(80_000));
        oracle
            .expect_fee_estimate()
            .times(1)
            .returning(|| Ok((2_000_000_000, 1_000_000_000)));

        let builder = OperationBuilder::new(
            StubAccount::new(),
            PaymasterProvider::None,
            oracle,
            offline_bundler(),
        );
        let draft = builder.build_unsigned(&request()).await.unwrap();

        assert_eq!(draft.sender, Some(ACCOUNT));
        assert_eq!(draft.call_gas_limit, Some(U256::from(80_000)));
        assert_eq!(
            draft.verification_gas_limit,
            Some(U256::from(DEFAULT_VERIFICATION_GAS_LIMIT))
        );
        assert_eq!(draft.max_fee_per_gas, Some(U256::from(2_000_000_000u64)));
        assert_eq!(
            draft.max_priority_fee_per_gas,
            Some(U256::from(1_000_000_000u64))
        );
        assert!(draft.pre_verification_gas.unwrap() > U256::from(21_000));
        assert_eq!(draft.paymaster_and_data, None);
        assert!(draft.resolve().is_ok());
    }

    #[tokio::test]
    async fn request_overrides_bypass_the_oracle() {
        // No expectations registered: any oracle call panics.
        let oracle = MockGasOracle::new();
        let builder = OperationBuilder::new(
            StubAccount::new(),
            PaymasterProvider::None,
            oracle,
            offline_bundler(),
        );

        let draft = builder
            .build_unsigned(&ExecuteRequest {
                call_gas_limit: Some(U256::from(70_000)),
                max_fee_per_gas: Some(U256::from(100)),
                max_priority_fee_per_gas: Some(U256::from(10)),
                ..request()
            })
            .await
            .unwrap();

        assert_eq!(draft.call_gas_limit, Some(U256::from(70_000)));
        assert_eq!(draft.max_fee_per_gas, Some(U256::from(100)));
        assert_eq!(draft.max_priority_fee_per_gas, Some(U256::from(10)));
    }

    #[tokio::test]
    async fn sponsor_data_lands_in_the_draft() {
        let mut oracle = MockGasOracle::new();
        oracle
            .expect_estimate_call_gas()
            .returning(|_, _, _| Ok(80_000));
        oracle.expect_fee_estimate().returning(|| Ok((100, 10)));

        let paymaster = address!("4444444444444444444444444444444444444444");
        let builder = OperationBuilder::new(
            StubAccount::new(),
            PaymasterProvider::Static { paymaster },
            oracle,
            offline_bundler(),
        );

        let draft = builder.build_unsigned(&request()).await.unwrap();
        assert_eq!(
            draft.paymaster_and_data.as_ref().map(|data| data.as_ref()),
            Some(paymaster.as_slice())
        );
    }

    #[tokio::test]
    async fn build_signs_the_bound_operation_hash() {
        let mut oracle = MockGasOracle::new();
        oracle
            .expect_estimate_call_gas()
            .returning(|_, _, _| Ok(80_000));
        oracle.expect_fee_estimate().returning(|| Ok((100, 10)));

        let account = StubAccount::new();
        let owner = account.owner.clone();
        let builder = OperationBuilder::new(
            account,
            PaymasterProvider::None,
            oracle,
            offline_bundler(),
        );

        let op = builder.build(&request()).await.unwrap();
        assert_eq!(op.signature.len(), 65);

        let mut unsigned = op.clone();
        unsigned.signature = Bytes::new();
        let hash = user_op_hash(&unsigned, ENTRY_POINT, CHAIN_ID);
        let expected = owner.sign_message_sync(hash.as_slice()).unwrap();
        assert_eq!(op.signature.as_ref(), &expected.as_bytes()[..]);
    }

    #[tokio::test]
    async fn submit_returns_the_bundler_hash() {
        let server = Server::builder().build("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let mut module = RpcModule::new(());
        module
            .register_method("eth_chainId", |_, _, _| "0x2105".to_string())
            .unwrap();
        module
            .register_method("eth_sendUserOperation", |_, _, _| {
                B256::repeat_byte(0x07).to_string()
            })
            .unwrap();
        let _handle = server.start(module);

        let url = Url::parse(&format!("http://{addr}")).unwrap();
        let bundler = BundlerClient::new(url, ENTRY_POINT, CHAIN_ID).unwrap();

        let mut oracle = MockGasOracle::new();
        oracle
            .expect_estimate_call_gas()
            .returning(|_, _, _| Ok(80_000));
        oracle.expect_fee_estimate().returning(|| Ok((100, 10)));

        let builder =
            OperationBuilder::new(StubAccount::new(), PaymasterProvider::None, oracle, bundler);
        let hash = builder.submit(&request()).await.unwrap();
        assert_eq!(hash, B256::repeat_byte(0x07));
    }
}
