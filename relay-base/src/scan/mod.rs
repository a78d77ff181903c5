use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use derive_new::new;
use tokio::sync::mpsc::Receiver;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use relay_core::{fan_in, BlockScanResult, ChainReader};

pub use height_stream::height_stream;
pub use reorder::ReorderBuffer;

mod height_stream;
mod reorder;
mod worker;

/// Fans a stream of heights out over a pool of workers that query a
/// `ChainReader`, and fans their results back into a single stream.
///
/// Exactly one `BlockScanResult` is produced per height taken from the input.
/// Results come back in no particular order.
#[derive(Debug, Clone, new)]
pub struct ScanPipeline {
    reader: Arc<dyn ChainReader>,
    workers: usize,
    request_timeout: Duration,
}

impl ScanPipeline {
    /// The chain this pipeline scans
    pub fn reader(&self) -> &Arc<dyn ChainReader> {
        &self.reader
    }

    /// Deadline applied to each call made to the chain
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Scan every height received on `heights`.
    ///
    /// The returned channel closes once every worker has drained the input, or
    /// soon after `cancel` fires.
    pub fn scan(&self, heights: Receiver<u64>, cancel: CancellationToken) -> Receiver<BlockScanResult> {
        let heights = Arc::new(Mutex::new(heights));
        let outputs = (0..self.workers.max(1))
            .map(|worker| {
                worker::spawn_scan_worker(
                    worker,
                    self.reader.clone(),
                    heights.clone(),
                    self.request_timeout,
                    cancel.clone(),
                )
            })
            .collect();
        fan_in(outputs, cancel)
    }

    /// Scan the inclusive height `range`.
    pub fn scan_range(
        &self,
        range: RangeInclusive<u64>,
        cancel: CancellationToken,
    ) -> Receiver<BlockScanResult> {
        self.scan(height_stream(range, cancel.clone()), cancel)
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use relay_core::{ChainCommunicationError, Message};
    use relay_test::mocks::MockChainReader;
    use relay_test::test_utils::{test_message, InMemoryChain};
    use tokio::time::timeout;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn collect(mut rx: Receiver<BlockScanResult>) -> Vec<BlockScanResult> {
        let mut results = vec![];
        while let Some(result) = timeout(TIMEOUT, rx.recv())
            .await
            .expect("scan output did not close")
        {
            results.push(result);
        }
        results
    }

    fn pipeline(chain: InMemoryChain, workers: usize) -> ScanPipeline {
        ScanPipeline::new(Arc::new(chain), workers, TIMEOUT)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_height_scanned_exactly_once() {
        for workers in [1, 2, 3, 8, 32] {
            for (from, to) in [(0, 0), (7, 9), (100, 163), (1_000, 1_499)] {
                let results = collect(
                    pipeline(InMemoryChain::new(to), workers)
                        .scan_range(from..=to, CancellationToken::new()),
                )
                .await;

                let mut heights: Vec<_> = results.iter().map(|r| r.height).collect();
                heights.sort_unstable();
                assert_eq!(
                    heights,
                    (from..=to).collect::<Vec<_>>(),
                    "workers: {workers}, range: {from}..={to}"
                );
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn extracts_message_at_its_height() {
        let message = Message::new("icon".into(), "btc".into(), 7, vec![0x01, 0x02]);
        let chain = InMemoryChain::new(103).with_message(102, message.clone());

        let results = collect(pipeline(chain, 2).scan_range(100..=103, CancellationToken::new())).await;

        assert_eq!(results.len(), 4);
        let by_height: HashMap<_, _> = results
            .into_iter()
            .map(|r| (r.height, r.messages.unwrap()))
            .collect();
        assert_eq!(by_height[&102], vec![message]);
        for height in [100, 101, 103] {
            assert!(by_height[&height].is_empty());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failed_height_does_not_affect_siblings() {
        let chain = InMemoryChain::new(120)
            .with_message(115, test_message(3))
            .failing_at(110, usize::MAX);

        let results = collect(pipeline(chain, 4).scan_range(100..=120, CancellationToken::new())).await;

        assert_eq!(results.len(), 21);
        for result in results {
            if result.height == 110 {
                assert!(result.is_err());
            } else {
                assert!(result.error().is_none(), "height {} failed", result.height);
            }
        }
    }

    #[tokio::test]
    async fn slow_reader_times_out_per_height() {
        let chain = InMemoryChain::new(2).slow_at(1, Duration::from_secs(30));
        let pipeline = ScanPipeline::new(Arc::new(chain), 3, Duration::from_millis(50));

        let results = collect(pipeline.scan_range(0..=2, CancellationToken::new())).await;

        assert_eq!(results.len(), 3);
        let timed_out = results.iter().find(|r| r.height == 1).unwrap();
        assert!(matches!(
            timed_out.error(),
            Some(ChainCommunicationError::Timeout(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancellation_stops_scan_and_closes_output() {
        let chain = Arc::new(InMemoryChain::new(u64::MAX));
        let cancel = CancellationToken::new();
        let pipeline = ScanPipeline::new(chain.clone(), 4, TIMEOUT);
        let mut rx = pipeline.scan_range(0..=100_000, cancel.clone());

        for _ in 0..5 {
            rx.recv().await.unwrap();
        }
        cancel.cancel();
        let remaining = collect(rx).await;

        assert!(remaining.len() < 100, "{} results after cancel", remaining.len());
        // give in-flight workers a moment, then make sure nothing keeps scanning
        tokio::time::sleep(Duration::from_millis(50)).await;
        let scanned = chain.calls().len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(chain.calls().len(), scanned);
        assert!(scanned < 100_000);
    }

    #[tokio::test]
    async fn scans_through_mocked_reader() {
        let mut reader = MockChainReader::new();
        reader
            .expect__messages_at()
            .times(3)
            .returning(|height| Ok(vec![test_message(height)]));
        let pipeline = ScanPipeline::new(Arc::new(reader), 2, TIMEOUT);

        let mut results = collect(pipeline.scan_range(1..=3, CancellationToken::new())).await;
        results.sort_by_key(|r| r.height);

        let messages: Vec<_> = results
            .into_iter()
            .flat_map(|r| r.messages.unwrap())
            .collect();
        assert_eq!(messages, vec![test_message(1), test_message(2), test_message(3)]);
    }
}
