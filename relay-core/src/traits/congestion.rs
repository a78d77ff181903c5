use std::fmt::Debug;

use async_trait::async_trait;
use auto_impl::auto_impl;

use crate::ChainResult;

/// Reports whether a destination chain's mempool is too full to accept more
/// transactions.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait CongestionMonitor: Send + Sync + Debug {
    /// `true` while submission should be paused.
    async fn is_congested(&self) -> ChainResult<bool>;
}
