use std::fmt::Debug;

use async_trait::async_trait;
use auto_impl::auto_impl;

use crate::{
    AccountInfo, ChainResult, Message, SignedTransaction, TxOutcome, UnsignedTransaction,
};

/// Interface for delivering messages to a destination chain.
///
/// Encoding, signing and broadcasting are chain specific; the relay only
/// decides which nonce goes into a transaction and when it may be sent.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait ChainWriter: Send + Sync + Debug {
    /// Address of the account this writer signs with
    fn signer_address(&self) -> &str;

    /// Encode `messages` into a transaction that will use `account`'s
    /// sequence as its nonce.
    async fn build_unsigned_transaction(
        &self,
        messages: &[Message],
        account: &AccountInfo,
    ) -> ChainResult<UnsignedTransaction>;

    /// Sign a transaction on behalf of `account`.
    async fn sign(
        &self,
        tx: UnsignedTransaction,
        account: &AccountInfo,
    ) -> ChainResult<SignedTransaction>;

    /// Broadcast a signed transaction.
    async fn broadcast(&self, tx: SignedTransaction) -> ChainResult<TxOutcome>;

    /// Current on-chain account state of `address`.
    async fn query_account(&self, address: &str) -> ChainResult<AccountInfo>;
}
