//! Prometheus metrics reported by the relay engine.

use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

/// The metrics namespace prefix. All metric names will start with `{NAMESPACE}_`.
pub const NAMESPACE: &str = "relay";

/// Metrics reported by the `HeightListener`.
///
/// Every metric carries a `chain` label naming the scanned chain.
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    /// Latest height reported by the chain at the start of a tick.
    pub latest_height: IntGaugeVec,
    /// Highest height up to which every block has been delivered.
    pub checkpoint_height: IntGaugeVec,
    /// Number of heights scanned, successfully or not.
    pub blocks_scanned: IntCounterVec,
    /// Number of failed height scans, retries included.
    pub failed_heights: IntCounterVec,
    /// Number of messages handed to the downstream consumer.
    pub messages_forwarded: IntCounterVec,
}

impl ScanMetrics {
    /// Create the scan metrics and register them with `registry`.
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            latest_height: int_gauge_vec(
                registry,
                "scan_latest_height",
                "Latest height reported by the chain",
            )?,
            checkpoint_height: int_gauge_vec(
                registry,
                "scan_checkpoint_height",
                "Highest height up to which every block was delivered",
            )?,
            blocks_scanned: int_counter_vec(
                registry,
                "scan_blocks_scanned",
                "Number of block heights scanned",
            )?,
            failed_heights: int_counter_vec(
                registry,
                "scan_failed_heights",
                "Number of block height scans that failed",
            )?,
            messages_forwarded: int_counter_vec(
                registry,
                "scan_messages_forwarded",
                "Number of messages forwarded downstream",
            )?,
        })
    }
}

/// Metrics reported by the submission path.
#[derive(Debug, Clone)]
pub struct SubmissionMetrics {
    /// `1` while submission to the chain is paused for congestion.
    pub mempool_blocked: IntGaugeVec,
    /// Number of transactions broadcast successfully.
    pub transactions_submitted: IntCounterVec,
    /// Number of submissions that failed at any stage.
    pub submission_failures: IntCounterVec,
}

impl SubmissionMetrics {
    /// Create the submission metrics and register them with `registry`.
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            mempool_blocked: int_gauge_vec(
                registry,
                "mempool_blocked",
                "Whether submission is paused because of mempool congestion",
            )?,
            transactions_submitted: int_counter_vec(
                registry,
                "transactions_submitted",
                "Number of transactions broadcast",
            )?,
            submission_failures: int_counter_vec(
                registry,
                "submission_failures",
                "Number of failed transaction submissions",
            )?,
        })
    }
}

fn int_gauge_vec(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntGaugeVec> {
    let gauge = IntGaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), &["chain"])?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn int_counter_vec(
    registry: &Registry,
    name: &str,
    help: &str,
) -> prometheus::Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), &["chain"])?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}
