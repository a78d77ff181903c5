//! A ChainReader provides a common interface for bubbling up chain-specific
//! block data to the scanning pipeline. Each chain implements it on top of its
//! own client (JSON-RPC, gRPC, ...) and event decoding.

use std::fmt::Debug;

use async_trait::async_trait;
use auto_impl::auto_impl;

use crate::{ChainResult, Message};

/// Interface for reading cross-chain messages out of a chain's blocks.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait ChainReader: Send + Sync + Debug {
    /// The latest height that is safe to scan.
    async fn latest_height(&self) -> ChainResult<u64>;

    /// All cross-chain messages emitted at `height`, in the order the chain
    /// emitted them. An empty vector means the block holds no messages.
    async fn messages_at(&self, height: u64) -> ChainResult<Vec<Message>>;
}
