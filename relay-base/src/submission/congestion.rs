use std::sync::Arc;
use std::time::Duration;

use derive_new::new;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, instrument, instrument::Instrumented, warn, Instrument};

use relay_core::CongestionMonitor;

use crate::settings::ScannerSettings;
use crate::{MemPoolInfo, SubmissionMetrics};

/// Polls a `CongestionMonitor` and mirrors its answer into the shared
/// `MemPoolInfo` of a destination chain.
#[derive(Debug, new)]
pub struct CongestionWatcher {
    chain: String,
    monitor: Arc<dyn CongestionMonitor>,
    mempool: Arc<MemPoolInfo>,
    poll_interval: Duration,
    metrics: SubmissionMetrics,
    shutdown: CancellationToken,
}

impl CongestionWatcher {
    /// Build a watcher polling every `congestion_poll_interval`.
    pub fn from_settings(
        settings: &ScannerSettings,
        monitor: Arc<dyn CongestionMonitor>,
        mempool: Arc<MemPoolInfo>,
        metrics: SubmissionMetrics,
        shutdown: CancellationToken,
    ) -> eyre::Result<Self> {
        Ok(Self::new(
            settings.chain.clone(),
            monitor,
            mempool,
            settings.congestion_poll_interval()?,
            metrics,
            shutdown,
        ))
    }

    /// Run the watcher until the shutdown token is cancelled.
    pub fn spawn(self) -> Instrumented<JoinHandle<()>> {
        let span = info_span!("CongestionWatcher", chain = %self.chain);
        tokio::spawn(async move { self.main_loop().await }).instrument(span)
    }

    async fn main_loop(self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Congestion watcher shutting down");
                    return;
                }
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    /// One poll of the monitor. On error the previous status is kept.
    #[instrument(level = "trace", skip(self))]
    async fn tick(&self) {
        let congested = match self.monitor.is_congested().await {
            Ok(congested) => congested,
            Err(err) => {
                warn!(error = ?err, "Failed to query mempool congestion, keeping previous status");
                return;
            }
        };

        let was_congested = self.mempool.set_blocked_status_with_lock(congested);
        if was_congested != congested {
            info!(congested, "Mempool congestion status changed");
        }
        self.metrics
            .mempool_blocked
            .with_label_values(&[self.chain.as_str()])
            .set(congested.into());
    }
}
