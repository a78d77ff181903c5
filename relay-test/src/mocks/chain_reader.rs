#![allow(non_snake_case)]

use async_trait::async_trait;
use mockall::*;

use relay_core::*;

mock! {
    pub ChainReader {
        pub fn _latest_height(&self) -> ChainResult<u64> {}

        pub fn _messages_at(&self, height: u64) -> ChainResult<Vec<Message>> {}
    }
}

impl std::fmt::Debug for MockChainReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockChainReader")
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn latest_height(&self) -> ChainResult<u64> {
        self._latest_height()
    }

    async fn messages_at(&self, height: u64) -> ChainResult<Vec<Message>> {
        self._messages_at(height)
    }
}
