use std::fmt::Debug;

use async_trait::async_trait;
use auto_impl::auto_impl;

use crate::ChainResult;

/// Persists the last height that was fully scanned and handed downstream.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait CheckpointStore: Send + Sync + Debug {
    /// The last saved height, or `0` if nothing has been saved yet.
    async fn load_last_height(&self) -> ChainResult<u64>;

    /// Record that every height up to and including `height` was delivered.
    async fn save_last_height(&self, height: u64) -> ChainResult<()>;
}
