use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use relay_core::{
    take, BlockInfo, BlockScanResult, ChainCommunicationError, ChainReader, CheckpointStore,
};

use crate::settings::ScannerSettings;
use crate::{height_stream, ReorderBuffer, ScanMetrics, ScanPipeline};

/// Errors that end a single listener tick.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The chain did not report its latest height
    #[error("Failed to fetch latest height")]
    LatestHeight(#[source] ChainCommunicationError),
    /// Nobody is listening for scanned blocks anymore
    #[error("Downstream block receiver was dropped")]
    OutputClosed,
    /// Shutdown was requested while a block waited for the downstream
    /// receiver
    #[error("Listener shut down before a block was delivered")]
    ShuttingDown,
}

/// Where a tick left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Progress {
    /// First height the next tick scans
    next_height: u64,
    /// `next_height` kept failing after every retry
    stalled: bool,
}

/// Periodically scans a chain for new blocks and streams the messages found in
/// them downstream.
///
/// Every tick scans `[next_height, latest_height]` through a fresh
/// `ScanPipeline`, retries heights that failed, forwards the results and then
/// advances (and persists) the checkpoint to the highest height below which
/// every block was delivered.
#[derive(Debug)]
pub struct HeightListener {
    chain: String,
    pipeline: ScanPipeline,
    block_interval: Duration,
    start_height: Option<u64>,
    max_heights_per_tick: u64,
    max_height_retries: u32,
    ordered_delivery: bool,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    metrics: ScanMetrics,
    shutdown: CancellationToken,
}

impl HeightListener {
    /// Build a listener for `reader` from its settings.
    ///
    /// Fails if any configured duration does not parse; the listener cannot
    /// start without a tick interval.
    pub fn from_settings(
        settings: &ScannerSettings,
        reader: Arc<dyn ChainReader>,
        metrics: ScanMetrics,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let block_interval = settings.block_interval()?;
        let request_timeout = settings.request_timeout()?;
        Ok(Self {
            chain: settings.chain.clone(),
            pipeline: ScanPipeline::new(reader, settings.workers(), request_timeout),
            block_interval,
            start_height: settings.start_height,
            max_heights_per_tick: settings.max_heights_per_tick,
            max_height_retries: settings.max_height_retries,
            ordered_delivery: settings.ordered_delivery,
            checkpoints: None,
            metrics,
            shutdown,
        })
    }

    /// Persist progress to `store` after every tick.
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// The chain this listener scans
    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Load the last saved height from the checkpoint store and run from
    /// there. Without a store, scanning starts from the configured start
    /// height (or genesis).
    pub async fn run_from_checkpoint(self, output: Sender<BlockInfo>) -> Result<()> {
        let last_saved_height = match &self.checkpoints {
            Some(store) => store.load_last_height().await?,
            None => 0,
        };
        self.run(last_saved_height, output).await
    }

    /// Scan blocks after `last_saved_height` and stream them on `output` until
    /// the shutdown token is cancelled.
    ///
    /// A tick that fails (for instance because the latest height could not be
    /// fetched) is logged and retried on the next tick. The loop only returns
    /// an error once `output` has been dropped.
    #[instrument(name = "HeightListener", skip_all, fields(chain = %self.chain))]
    pub async fn run(self, last_saved_height: u64, output: Sender<BlockInfo>) -> Result<()> {
        let mut progress = Progress {
            next_height: self
                .start_height
                .unwrap_or_else(|| last_saved_height.saturating_add(1)),
            stalled: false,
        };
        info!(
            next_height = progress.next_height,
            block_interval = ?self.block_interval,
            "Starting height listener"
        );

        let mut ticker = tokio::time::interval(self.block_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!(next_height = progress.next_height, "Height listener shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            match self.tick(progress, &output).await {
                Ok(next) => progress = next,
                Err(ListenerError::OutputClosed) if !self.shutdown.is_cancelled() => {
                    return Err(ListenerError::OutputClosed.into());
                }
                Err(ListenerError::OutputClosed | ListenerError::ShuttingDown) => {
                    info!(next_height = progress.next_height, "Height listener shutting down");
                    return Ok(());
                }
                Err(err) => warn!(
                    error = ?err,
                    next_height = progress.next_height,
                    "Listener tick failed, retrying next tick"
                ),
            }
        }
    }

    /// One round of scanning, extracted from the work loop for testing
    /// purposes.
    ///
    /// While the previous tick stalled on `next_height`, only that height is
    /// scanned, so the blocks behind it are not fetched again on every tick.
    #[instrument(skip(self, output), fields(chain = %self.chain))]
    async fn tick(
        &self,
        progress: Progress,
        output: &Sender<BlockInfo>,
    ) -> Result<Progress, ListenerError> {
        let start = progress.next_height;
        let latest = self.latest_height().await?;
        self.metrics
            .latest_height
            .with_label_values(&[self.chain.as_str()])
            .set(latest as i64);
        if start > latest {
            debug!(start, latest, "No new blocks to scan");
            return Ok(progress);
        }

        let cap = if progress.stalled {
            1
        } else {
            self.max_heights_per_tick.max(1)
        };
        let window = (latest - start + 1).min(cap);
        let window_end = start + window - 1;
        debug!(start, window_end, latest, "Scanning height window");

        let mut buffer = ReorderBuffer::new(start);
        let mut failed = BTreeSet::new();
        for attempt in 0..=self.max_height_retries {
            let scope = self.shutdown.child_token();
            let heights = if attempt == 0 {
                take(
                    height_stream(start..=latest, scope.clone()),
                    usize::try_from(window).unwrap_or(usize::MAX),
                    scope.clone(),
                )
            } else {
                debug!(attempt, heights = ?failed, "Retrying failed heights");
                height_stream(std::mem::take(&mut failed), scope.clone())
            };

            let drained = self
                .drain(self.pipeline.scan(heights, scope.clone()), &mut buffer, output, attempt)
                .await;
            scope.cancel();
            failed = drained?;

            if failed.is_empty() || self.shutdown.is_cancelled() {
                break;
            }
        }
        if !failed.is_empty() {
            warn!(
                heights = ?failed,
                retries = self.max_height_retries,
                "Heights still failing after retries, they will be rescanned next tick"
            );
        }

        let next = buffer.next_height();
        if next > start {
            self.save_checkpoint(next - 1).await;
        }
        Ok(Progress {
            next_height: next,
            stalled: !failed.is_empty(),
        })
    }

    /// Forward every successful result of one pipeline run and return the
    /// heights that failed.
    async fn drain(
        &self,
        mut results: Receiver<BlockScanResult>,
        buffer: &mut ReorderBuffer<Option<BlockInfo>>,
        output: &Sender<BlockInfo>,
        attempt: u32,
    ) -> Result<BTreeSet<u64>, ListenerError> {
        let mut failed = BTreeSet::new();
        while let Some(result) = results.recv().await {
            self.metrics
                .blocks_scanned
                .with_label_values(&[self.chain.as_str()])
                .inc();

            let height = result.height;
            let block = match result.into_block_info() {
                Ok(block) => block,
                Err(err) => {
                    warn!(height, attempt, error = ?err, "Failed to scan height");
                    self.metrics
                        .failed_heights
                        .with_label_values(&[self.chain.as_str()])
                        .inc();
                    failed.insert(height);
                    continue;
                }
            };

            if self.ordered_delivery {
                for (_, block) in buffer.push(height, Some(block)) {
                    if let Some(block) = block {
                        self.forward(block, output).await?;
                    }
                }
            } else {
                self.forward(block, output).await?;
                buffer.push(height, None);
            }
        }
        Ok(failed)
    }

    async fn forward(
        &self,
        block: BlockInfo,
        output: &Sender<BlockInfo>,
    ) -> Result<(), ListenerError> {
        if !block.messages.is_empty() {
            debug!(
                height = block.height,
                messages = block.messages.len(),
                "Forwarding messages"
            );
            self.metrics
                .messages_forwarded
                .with_label_values(&[self.chain.as_str()])
                .inc_by(block.messages.len() as u64);
        }
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(ListenerError::ShuttingDown),
            sent = output.send(block) => sent.map_err(|_| ListenerError::OutputClosed),
        }
    }

    async fn latest_height(&self) -> Result<u64, ListenerError> {
        let request_timeout = self.pipeline.request_timeout();
        match tokio::time::timeout(request_timeout, self.pipeline.reader().latest_height()).await {
            Ok(latest) => latest,
            Err(_) => Err(ChainCommunicationError::Timeout(request_timeout)),
        }
        .map_err(ListenerError::LatestHeight)
    }

    async fn save_checkpoint(&self, height: u64) {
        self.metrics
            .checkpoint_height
            .with_label_values(&[self.chain.as_str()])
            .set(height as i64);
        let Some(store) = &self.checkpoints else {
            return;
        };
        if let Err(err) = store.save_last_height(height).await {
            warn!(height, error = ?err, "Failed to save checkpoint");
        }
    }
}
