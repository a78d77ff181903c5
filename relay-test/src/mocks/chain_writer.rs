#![allow(non_snake_case)]

use async_trait::async_trait;
use mockall::*;

use relay_core::*;

/// Address every `MockChainWriter` signs as
pub const MOCK_SIGNER_ADDRESS: &str = "relayer";

mock! {
    pub ChainWriter {
        pub fn _build_unsigned_transaction(
            &self,
            messages: &[Message],
            account: &AccountInfo,
        ) -> ChainResult<UnsignedTransaction> {}

        pub fn _sign(
            &self,
            tx: UnsignedTransaction,
            account: &AccountInfo,
        ) -> ChainResult<SignedTransaction> {}

        pub fn _broadcast(&self, tx: SignedTransaction) -> ChainResult<TxOutcome> {}

        pub fn _query_account(&self, address: &str) -> ChainResult<AccountInfo> {}
    }
}

impl std::fmt::Debug for MockChainWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockChainWriter")
    }
}

#[async_trait]
impl ChainWriter for MockChainWriter {
    fn signer_address(&self) -> &str {
        MOCK_SIGNER_ADDRESS
    }

    async fn build_unsigned_transaction(
        &self,
        messages: &[Message],
        account: &AccountInfo,
    ) -> ChainResult<UnsignedTransaction> {
        self._build_unsigned_transaction(messages, account)
    }

    async fn sign(
        &self,
        tx: UnsignedTransaction,
        account: &AccountInfo,
    ) -> ChainResult<SignedTransaction> {
        self._sign(tx, account)
    }

    async fn broadcast(&self, tx: SignedTransaction) -> ChainResult<TxOutcome> {
        self._broadcast(tx)
    }

    async fn query_account(&self, address: &str) -> ChainResult<AccountInfo> {
        self._query_account(address)
    }
}
