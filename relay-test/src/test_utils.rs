use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use relay_core::*;

/// A chain held in memory. Heights without messages return an empty block.
#[derive(Debug, Default)]
pub struct InMemoryChain {
    latest_height: AtomicU64,
    latest_height_failures: AtomicUsize,
    messages: Mutex<HashMap<u64, Vec<Message>>>,
    /// height -> number of upcoming `messages_at` calls that fail
    failures: Mutex<HashMap<u64, usize>>,
    delays: Mutex<HashMap<u64, Duration>>,
    calls: Mutex<Vec<u64>>,
}

impl InMemoryChain {
    pub fn new(latest_height: u64) -> Self {
        Self {
            latest_height: AtomicU64::new(latest_height),
            ..Default::default()
        }
    }

    pub fn with_message(self, height: u64, message: Message) -> Self {
        self.messages
            .lock()
            .entry(height)
            .or_default()
            .push(message);
        self
    }

    /// Fail the next `times` scans of `height`. `usize::MAX` fails forever.
    pub fn failing_at(self, height: u64, times: usize) -> Self {
        self.failures.lock().insert(height, times);
        self
    }

    /// Delay every scan of `height` by `delay`.
    pub fn slow_at(self, height: u64, delay: Duration) -> Self {
        self.delays.lock().insert(height, delay);
        self
    }

    /// Fail the next `times` calls to `latest_height`.
    pub fn failing_latest_height(self, times: usize) -> Self {
        self.latest_height_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn set_latest_height(&self, height: u64) {
        self.latest_height.store(height, Ordering::SeqCst);
    }

    /// Every height `messages_at` was called with, in call order.
    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().clone()
    }

    pub fn calls_at(&self, height: u64) -> usize {
        self.calls.lock().iter().filter(|h| **h == height).count()
    }
}

#[async_trait]
impl ChainReader for InMemoryChain {
    async fn latest_height(&self) -> ChainResult<u64> {
        let failing = self
            .latest_height_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ChainCommunicationError::from_other_str(
                "latest height unavailable",
            ));
        }
        Ok(self.latest_height.load(Ordering::SeqCst))
    }

    async fn messages_at(&self, height: u64) -> ChainResult<Vec<Message>> {
        self.calls.lock().push(height);

        let delay = self.delays.lock().get(&height).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut failures = self.failures.lock();
            if let Some(remaining) = failures.get_mut(&height) {
                if *remaining > 0 {
                    if *remaining != usize::MAX {
                        *remaining -= 1;
                    }
                    return Err(ChainCommunicationError::from_other_str("block unavailable"));
                }
            }
        }

        Ok(self
            .messages
            .lock()
            .get(&height)
            .cloned()
            .unwrap_or_default())
    }
}

/// Checkpoint store that remembers every save.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    saved: Mutex<Vec<u64>>,
}

impl InMemoryCheckpointStore {
    pub fn new(last_height: u64) -> Self {
        Self {
            saved: Mutex::new(vec![last_height]),
        }
    }

    /// Every height saved so far, oldest first.
    pub fn history(&self) -> Vec<u64> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load_last_height(&self) -> ChainResult<u64> {
        Ok(self.saved.lock().last().copied().unwrap_or_default())
    }

    async fn save_last_height(&self, height: u64) -> ChainResult<()> {
        self.saved.lock().push(height);
        Ok(())
    }
}

/// Congestion monitor whose answer is flipped by the test.
#[derive(Debug, Default)]
pub struct ToggleCongestionMonitor {
    congested: AtomicBool,
}

impl ToggleCongestionMonitor {
    pub fn set_congested(&self, congested: bool) {
        self.congested.store(congested, Ordering::SeqCst);
    }
}

#[async_trait]
impl CongestionMonitor for ToggleCongestionMonitor {
    async fn is_congested(&self) -> ChainResult<bool> {
        Ok(self.congested.load(Ordering::SeqCst))
    }
}

pub fn test_message(sequence_number: u64) -> Message {
    Message::new(
        "icon".to_owned(),
        "btc".to_owned(),
        sequence_number,
        sequence_number.to_be_bytes().to_vec(),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn in_memory_chain_fails_requested_number_of_times() {
        let chain = InMemoryChain::new(10)
            .with_message(4, test_message(1))
            .failing_at(4, 2);

        assert!(chain.messages_at(4).await.is_err());
        assert!(chain.messages_at(4).await.is_err());
        assert_eq!(chain.messages_at(4).await.unwrap(), vec![test_message(1)]);
        assert_eq!(chain.calls_at(4), 3);
        assert!(chain.messages_at(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkpoint_store_returns_latest_save() {
        let store = InMemoryCheckpointStore::new(3);
        store.save_last_height(8).await.unwrap();
        assert_eq!(store.load_last_height().await.unwrap(), 8);
        assert_eq!(store.history(), vec![3, 8]);
    }
}
