use tokio::sync::mpsc::{self, Receiver};
use tokio_util::sync::CancellationToken;
use tracing::{trace, Instrument};

use relay_core::HANDOFF_CAPACITY;

/// Emits `heights` in order from a single producer task.
///
/// The stream ends when the heights run out, when `cancel` fires, or when the
/// receiving side is dropped, whichever comes first.
pub fn height_stream<I>(heights: I, cancel: CancellationToken) -> Receiver<u64>
where
    I: IntoIterator<Item = u64>,
    I::IntoIter: Send + 'static,
{
    let heights = heights.into_iter();
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    tokio::spawn(
        async move {
            for height in heights {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        trace!(height, "Height stream cancelled");
                        break;
                    }
                    sent = tx.send(height) => if sent.is_err() {
                        break;
                    },
                }
            }
        }
        .in_current_span(),
    );
    rx
}
