//! Adapter for the token-funded account variant.
//!
//! Identical contract surface to the plain account, except the factory
//! create call also pins the fee token and the designated fee payer.

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
    /// Factory deployer for token-funded accounts.
    function createAccount(address owner, address token, address feePayer, uint256 index);
    /// Execute entry on the deployed account.
    function execute(address dest, uint256 value, bytes func);
    /// Sequence number accessor on the deployed account.
    function nonce() returns (uint256);
}

/// Account whose gas is funded in an ERC-20 token through a designated
/// fee payer, both fixed at deployment.
pub struct TokenAccount<R> {
    reader: R,
    owner: PrivateKeySigner,
    entry_point: Address,
    factory: Option<Address>,
    token: Address,
    fee_payer: Address,
    index: U256,
    account_address: OnceCell<Address>,
}

impl<R> std::fmt::Debug for TokenAccount<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAccount")
            .field("owner", &self.owner.address())
            .field("entry_point", &self.entry_point)
            .field("factory", &self.factory)
            .field("token", &self.token)
            .field("fee_payer", &self.fee_payer)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl<R: StateReader> TokenAccount<R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: R,
        owner: PrivateKeySigner,
        entry_point: Address,
        factory: Option<Address>,
        token: Address,
        fee_payer: Address,
        index: U256,
    ) -> Self {
        Self {
            reader,
            owner,
            entry_point,
            factory,
            token,
            fee_payer,
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
            token: self.token,
            feePayer: self.fee_payer,
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
impl<R: StateReader> AccountApi for TokenAccount<R> {
    async fn get_account_address(&self) -> Result<Address, OperationError> {
        self.account_address
            .get_or_try_init(|| async {
                let init_code = self.factory_init_code()?;
                let sender = self
                    .reader
                    .resolve_sender(self.entry_point, init_code)
                    .await?;
                debug!(sender = %sender, token = %self.token, "resolved token account address");
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

    const ENTRY_POINT: Address = address!("5ff137d4b0fdcd49dca30c7cf57e578a026d2789");
    const FACTORY: Address = address!("9406cc6185a346906296840746125a0e44976454");
    const ACCOUNT: Address = address!("cccc567890abcdef1234567890abcdef12345678");
    const TOKEN: Address = address!("dddd567890abcdef1234567890abcdef12345678");
    const FEE_PAYER: Address = address!("eeee567890abcdef1234567890abcdef12345678");

    fn phantom_reader() -> MockStateReader {
        let mut reader = MockStateReader::new();
        reader.expect_code_size().returning(|_| Ok(0));
        reader
    }

    #[tokio::test]
    async fn init_code_pins_owner_token_and_fee_payer() {
        let owner = PrivateKeySigner::random();
        let account = TokenAccount::new(
            phantom_reader(),
            owner.clone(),
            ENTRY_POINT,
            Some(FACTORY),
            TOKEN,
            FEE_PAYER,
            U256::from(2),
        )
        .with_account_address(ACCOUNT);

        let init_code = account.get_init_code().await.unwrap();
        assert_eq!(&init_code[..20], FACTORY.as_slice());

        let decoded = createAccountCall::abi_decode(&init_code[20..]).unwrap();
        assert_eq!(decoded.owner, owner.address());
        assert_eq!(decoded.token, TOKEN);
        assert_eq!(decoded.feePayer, FEE_PAYER);
        assert_eq!(decoded.index, U256::from(2));
    }

    #[tokio::test]
    async fn phantom_without_factory_fails_like_the_plain_variant() {
        let account = TokenAccount::new(
            phantom_reader(),
            PrivateKeySigner::random(),
            ENTRY_POINT,
            None,
            TOKEN,
            FEE_PAYER,
            U256::ZERO,
        )
        .with_account_address(ACCOUNT);

        assert!(matches!(
            account.get_init_code().await,
            Err(OperationError::NoFactoryConfigured)
        ));
    }
}
