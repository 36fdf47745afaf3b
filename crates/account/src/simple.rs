//! Adapter for the plain owner-signed account contract.
//!
//! The factory deploys with `createAccount(owner, index)`, the account
//! exposes `execute(dest, value, func)` and a `nonce()` accessor, and the
//! owner signs operation hashes as EIP-191 personal messages.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolCall, sol};
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;
use userop_core::OperationError;

use crate::{AccountApi, StateReader};

sol! {
    /// Factory deployer for plain accounts.
    function createAccount(address owner, uint256 index);
    /// Execute entry on the deployed account.
    function execute(address dest, uint256 value, bytes func);
    /// Sequence number accessor on the deployed account.
    function nonce() returns (uint256);
}

/// Plain EOA-owned account adapter.
pub struct SimpleAccount<R> {
    reader: R,
    owner: PrivateKeySigner,
    entry_point: Address,
    factory: Option<Address>,
    /// Salt distinguishing multiple accounts of the same owner.
    index: U256,
    account_address: OnceCell<Address>,
}

impl<R> std::fmt::Debug for SimpleAccount<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleAccount")
            .field("owner", &self.owner.address())
            .field("entry_point", &self.entry_point)
            .field("factory", &self.factory)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl<R: StateReader> SimpleAccount<R> {
    pub fn new(
        reader: R,
        owner: PrivateKeySigner,
        entry_point: Address,
        factory: Option<Address>,
        index: U256,
    ) -> Self {
        Self {
            reader,
            owner,
            entry_point,
            factory,
            index,
            account_address: OnceCell::new(),
        }
    }

    /// Use a known account address instead of resolving one through the
    /// entry point.
    pub fn with_account_address(mut self, address: Address) -> Self {
        self.account_address = OnceCell::new_with(Some(address));
        self
    }

    fn factory_init_code(&self) -> Result<Bytes, OperationError> {
        let factory = self.factory.ok_or(OperationError::NoFactoryConfigured)?;
        let call = createAccountCall {
            owner: self.owner.address(),
            index: self.index,
        }
        .abi_encode();
        let mut code = Vec::with_capacity(20 + call.len());
        code.extend_from_slice(factory.as_slice());
        code.extend_from_slice(&call);
        Ok(code.into())
    }
}

#[async_trait]
impl<R: StateReader> AccountApi for SimpleAccount<R> {
    async fn get_account_address(&self) -> Result<Address, OperationError> {
        self.account_address
            .get_or_try_init(|| async {
                let init_code = self.factory_init_code()?;
                let sender = self
                    .reader
                    .resolve_sender(self.entry_point, init_code)
                    .await?;
                debug!(sender = %sender, owner = %self.owner.address(), "resolved account address");
                Ok(sender)
            })
            .await
            .copied()
    }

    async fn check_account_phantom(&self) -> Result<bool, OperationError> {
        let address = self.get_account_address().await?;
        Ok(self.reader.code_size(address).await? == 0)
    }

    async fn get_init_code(&self) -> Result<Bytes, OperationError> {
        if self.check_account_phantom().await? {
            self.factory_init_code()
        } else {
            Ok(Bytes::new())
        }
    }

    async fn get_nonce(&self) -> Result<U256, OperationError> {
        if self.check_account_phantom().await? {
            return Ok(U256::ZERO);
        }
        let address = self.get_account_address().await?;
        let ret = self
            .reader
            .eth_call(address, nonceCall {}.abi_encode().into())
            .await?;
        nonceCall::abi_decode_returns(&ret)
            .map_err(|err| OperationError::AccountResolution(err.to_string()))
    }

    async fn encode_execute(
        &self,
        target: Address,
        value: U256,
        data: Bytes,
    ) -> Result<Bytes, OperationError> {
        self.get_account_address().await?;
        Ok(executeCall {
            dest: target,
            value,
            func: data,
        }
        .abi_encode()
        .into())
    }

    async fn sign_op_hash(&self, hash: B256) -> Result<Bytes, OperationError> {
        let signature = self
            .owner
            .sign_message(hash.as_slice())
            .await
            .map_err(|err| OperationError::Signer(err.to_string()))?;
        Ok(signature.as_bytes().to_vec().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MockStateReader;
    use alloy_primitives::address;
    use alloy_signer::SignerSync;

    const ENTRY_POINT: Address = address!("5ff137d4b0fdcd49dca30c7cf57e578a026d2789");
    const FACTORY: Address = address!("9406cc6185a346906296840746125a0e44976454");
    const ACCOUNT: Address = address!("aaaa567890abcdef1234567890abcdef12345678");

    fn phantom_reader() -> MockStateReader {
        let mut reader = MockStateReader::new();
        reader.expect_code_size().returning(|_| Ok(0));
        reader
    }

    #[tokio::test]
    async fn phantom_account_without_factory_cannot_build_init_code() {
        let account = SimpleAccount::new(
            phantom_reader(),
            PrivateKeySigner::random(),
            ENTRY_POINT,
            None,
            U256::ZERO,
        )
        .with_account_address(ACCOUNT);

        match account.get_init_code().await {
            Err(OperationError::NoFactoryConfigured) => {}
            other => panic!("expected NoFactoryConfigured, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn phantom_init_code_starts_with_factory_and_create_selector() {
        let owner = PrivateKeySigner::random();
        let account = SimpleAccount::new(
            phantom_reader(),
            owner.clone(),
            ENTRY_POINT,
            Some(FACTORY),
            U256::from(1),
        )
        .with_account_address(ACCOUNT);

        let init_code = account.get_init_code().await.unwrap();
        assert_eq!(&init_code[..20], FACTORY.as_slice());
        assert_eq!(&init_code[20..24], &createAccountCall::SELECTOR);
        // owner is the first argument word
        assert_eq!(&init_code[24 + 12..24 + 32], owner.address().as_slice());
    }

    #[tokio::test]
    async fn deployed_account_has_empty_init_code_and_live_nonce() {
        let mut reader = MockStateReader::new();
        reader.expect_code_size().returning(|_| Ok(512));
        reader.expect_eth_call().returning(|_, _| {
            Ok(U256::from(5).to_be_bytes::<32>().to_vec().into())
        });

        let account = SimpleAccount::new(
            reader,
            PrivateKeySigner::random(),
            ENTRY_POINT,
            Some(FACTORY),
            U256::ZERO,
        )
        .with_account_address(ACCOUNT);

        assert!(account.get_init_code().await.unwrap().is_empty());
        assert_eq!(account.get_nonce().await.unwrap(), U256::from(5));
    }

    #[tokio::test]
    async fn phantom_nonce_is_zero_without_a_call() {
        let account = SimpleAccount::new(
            phantom_reader(),
            PrivateKeySigner::random(),
            ENTRY_POINT,
            Some(FACTORY),
            U256::ZERO,
        )
        .with_account_address(ACCOUNT);
        // no eth_call expectation set: a call would panic the mock
        assert_eq!(account.get_nonce().await.unwrap(), U256::ZERO);
    }

    #[tokio::test]
    async fn account_address_resolves_through_entry_point_once() {
        let mut reader = MockStateReader::new();
        reader
            .expect_resolve_sender()
            .times(1)
            .returning(|_, _| Ok(ACCOUNT));

        let account = SimpleAccount::new(
            reader,
            PrivateKeySigner::random(),
            ENTRY_POINT,
            Some(FACTORY),
            U256::ZERO,
        );

        assert_eq!(account.get_account_address().await.unwrap(), ACCOUNT);
        // second lookup is served from the cache; times(1) enforces it
        assert_eq!(account.get_account_address().await.unwrap(), ACCOUNT);
    }

    #[tokio::test]
    async fn execute_encoding_wraps_target_value_and_data() {
        let account = SimpleAccount::new(
            phantom_reader(),
            PrivateKeySigner::random(),
            ENTRY_POINT,
            Some(FACTORY),
            U256::ZERO,
        )
        .with_account_address(ACCOUNT);

        let target = address!("bbbb567890abcdef1234567890abcdef12345678");
        let data = Bytes::from(vec![0x01, 0x02, 0x03]);
        let encoded = account
            .encode_execute(target, U256::from(42), data.clone())
            .await
            .unwrap();

        let decoded = executeCall::abi_decode(&encoded).unwrap();
        assert_eq!(decoded.dest, target);
        assert_eq!(decoded.value, U256::from(42));
        assert_eq!(decoded.func, data);
    }

    #[tokio::test]
    async fn op_hash_signature_matches_owner_personal_sign() {
        let owner = PrivateKeySigner::random();
        let account = SimpleAccount::new(
            phantom_reader(),
            owner.clone(),
            ENTRY_POINT,
            Some(FACTORY),
            U256::ZERO,
        )
        .with_account_address(ACCOUNT);

        let hash = B256::repeat_byte(0x42);
        let signature = account.sign_op_hash(hash).await.unwrap();
        assert_eq!(signature.len(), 65);

        let expected = owner.sign_message_sync(hash.as_slice()).unwrap();
        assert_eq!(signature, Bytes::from(expected.as_bytes().to_vec()));
    }
}
