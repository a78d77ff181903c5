use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use relay_core::{
    AccountInfo, ChainCommunicationError, ChainResult, ChainWriter, Message, SignedTransaction,
    TxOutcome,
};

use crate::{MemPoolInfo, SequenceTracker, SequenceTrackerError, SubmissionMetrics};

/// Errors returned while submitting messages to a destination chain.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Building, signing or broadcasting failed
    #[error(transparent)]
    Chain(#[from] ChainCommunicationError),
    /// The signer's sequence could not be reserved
    #[error(transparent)]
    Sequence(#[from] SequenceTrackerError),
}

/// Delivers batches of messages to a destination chain.
///
/// Every transaction takes its nonce from the shared `SequenceTracker`, and no
/// transaction is sent while the shared `MemPoolInfo` reports congestion.
#[derive(Debug)]
pub struct MessageSubmitter {
    chain: String,
    writer: Arc<dyn ChainWriter>,
    sequences: Arc<SequenceTracker>,
    mempool: Arc<MemPoolInfo>,
    metrics: SubmissionMetrics,
}

impl MessageSubmitter {
    /// Build a submitter, registering the writer's signer with `sequences`
    /// from on-chain state if it is not tracked yet.
    pub async fn init(
        chain: impl Into<String>,
        writer: Arc<dyn ChainWriter>,
        sequences: Arc<SequenceTracker>,
        mempool: Arc<MemPoolInfo>,
        metrics: SubmissionMetrics,
    ) -> Result<Self, SubmitError> {
        let signer = writer.signer_address();
        if !sequences.contains(signer) {
            let account = writer.query_account(signer).await?;
            debug!(signer, ?account, "Registering signer");
            sequences.register(signer, account);
        }
        Ok(Self {
            chain: chain.into(),
            writer,
            sequences,
            mempool,
            metrics,
        })
    }

    /// Submit `messages` in a single transaction.
    ///
    /// Waits for the mempool to clear first. If the chain rejects the nonce,
    /// the signer's sequence is resynced from chain state before the error is
    /// returned so the next submission can succeed. A nonce reserved for a
    /// transaction that failed to build or sign is handed back, leaving no gap.
    #[instrument(skip_all, fields(chain = %self.chain, messages = messages.len()))]
    pub async fn submit(&self, messages: &[Message]) -> Result<TxOutcome, SubmitError> {
        if self.mempool.is_blocked() {
            info!("Mempool congested, waiting before submitting");
            self.mempool.wait_until_unblocked().await;
        }

        let result = self.try_submit(messages).await;
        match &result {
            Ok(outcome) => {
                self.metrics
                    .transactions_submitted
                    .with_label_values(&[self.chain.as_str()])
                    .inc();
                info!(?outcome, "Submitted transaction");
            }
            Err(err) => {
                self.metrics
                    .submission_failures
                    .with_label_values(&[self.chain.as_str()])
                    .inc();
                warn!(error = ?err, "Failed to submit transaction");
            }
        }
        result
    }

    async fn try_submit(&self, messages: &[Message]) -> Result<TxOutcome, SubmitError> {
        let signer = self.writer.signer_address();
        let account = self.sequences.get_with_lock(signer)?;
        debug!(sequence = account.sequence, "Reserved nonce");

        let signed = match self.build_and_sign(messages, &account).await {
            Ok(signed) => signed,
            Err(err) => {
                self.release(signer, account).await;
                return Err(err.into());
            }
        };
        match self.writer.broadcast(signed).await {
            Err(err @ ChainCommunicationError::SequenceMismatch { .. }) => {
                self.resync(signer).await;
                Err(err.into())
            }
            result => Ok(result?),
        }
    }

    async fn build_and_sign(
        &self,
        messages: &[Message],
        account: &AccountInfo,
    ) -> ChainResult<SignedTransaction> {
        let unsigned = self
            .writer
            .build_unsigned_transaction(messages, account)
            .await?;
        self.writer.sign(unsigned, account).await
    }

    /// Return an unused nonce. If later nonces were reserved in the meantime
    /// the gap cannot be closed locally and the sequence is resynced instead.
    async fn release(&self, signer: &str, account: AccountInfo) {
        match self.sequences.release(signer, account) {
            Ok(true) => debug!(sequence = account.sequence, "Released unused nonce"),
            Ok(false) => self.resync(signer).await,
            Err(err) => warn!(error = ?err, "Failed to release unused nonce"),
        }
    }

    async fn resync(&self, signer: &str) {
        match self.writer.query_account(signer).await {
            Ok(account) => {
                info!(sequence = account.sequence, "Resynced signer sequence");
                if let Err(err) = self.sequences.set(signer, account) {
                    warn!(error = ?err, "Failed to store resynced sequence");
                }
            }
            Err(err) => warn!(error = ?err, "Failed to resync signer sequence"),
        }
    }
}
