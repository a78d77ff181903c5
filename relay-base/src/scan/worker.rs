use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, Receiver};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug_span, trace, Instrument};

use relay_core::{BlockScanResult, ChainCommunicationError, ChainReader, HANDOFF_CAPACITY};

/// The height stream shared by every worker of a pool. Whoever holds the lock
/// takes the next height.
pub(crate) type SharedHeights = Arc<Mutex<Receiver<u64>>>;

/// Spawns a worker that turns heights taken from `heights` into one
/// `BlockScanResult` each.
///
/// A reader call that is already running when `cancel` fires is allowed to
/// finish (bounded by `request_timeout`); the worker just stops taking new
/// heights.
pub(crate) fn spawn_scan_worker(
    worker: usize,
    reader: Arc<dyn ChainReader>,
    heights: SharedHeights,
    request_timeout: Duration,
    cancel: CancellationToken,
) -> Receiver<BlockScanResult> {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    tokio::spawn(
        async move {
            loop {
                let height = {
                    let mut heights = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        heights = heights.lock() => heights,
                    };
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        height = heights.recv() => height,
                    }
                };
                let Some(height) = height else {
                    break;
                };

                let result = scan_height(reader.as_ref(), height, request_timeout).await;
                trace!(height, failed = result.is_err(), "Scanned height");
                if tx.send(result).await.is_err() {
                    break;
                }
            }
        }
        .instrument(debug_span!("scan_worker", worker)),
    );
    rx
}

async fn scan_height(
    reader: &dyn ChainReader,
    height: u64,
    request_timeout: Duration,
) -> BlockScanResult {
    let messages = match tokio::time::timeout(request_timeout, reader.messages_at(height)).await {
        Ok(messages) => messages,
        Err(_) => Err(ChainCommunicationError::Timeout(request_timeout)),
    };
    BlockScanResult::new(height, messages)
}
