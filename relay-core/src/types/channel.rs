use tokio::sync::mpsc::{self, Receiver};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Capacity of every channel built here. A single slot keeps producers in
/// lock-step with their consumer.
pub const HANDOFF_CAPACITY: usize = 1;

/// Merges several channels into one.
///
/// One forwarding task is spawned per input. The returned channel closes once
/// every forwarder has finished, which happens when its input closes or when
/// `cancel` fires. Cancellation only stops forwarding; whatever produces into
/// the inputs is left to observe the token (or the closed channel) itself.
pub fn fan_in<T>(inputs: Vec<Receiver<T>>, cancel: CancellationToken) -> Receiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    for mut input in inputs {
        let tx = tx.clone();
        let cancel = cancel.clone();
        tokio::spawn(
            async move {
                loop {
                    let item = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        item = input.recv() => match item {
                            Some(item) => item,
                            None => break,
                        },
                    };
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        sent = tx.send(item) => if sent.is_err() {
                            break;
                        },
                    }
                }
            }
            .in_current_span(),
        );
    }
    rx
}

/// Forwards at most `n` items from `input`, then closes the returned channel.
///
/// `input` is dropped as soon as the bound is reached, so its producer sees a
/// closed channel instead of blocking forever.
pub fn take<T>(mut input: Receiver<T>, n: usize, cancel: CancellationToken) -> Receiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    tokio::spawn(
        async move {
            for _ in 0..n {
                let item = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    item = input.recv() => match item {
                        Some(item) => item,
                        None => break,
                    },
                };
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        }
        .in_current_span(),
    );
    rx
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    fn producer(items: Vec<u64>) -> Receiver<u64> {
        let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
        tokio::spawn(async move {
            for item in items {
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });
        rx
    }

    async fn drain<T>(mut rx: Receiver<T>) -> Vec<T> {
        let mut out = vec![];
        while let Some(item) = rx.recv().await {
            out.push(item);
        }
        out
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fan_in_forwards_every_item_once() {
        let inputs = vec![
            producer((0..10).collect()),
            producer((10..25).collect()),
            producer(vec![]),
            producer((25..30).collect()),
        ];
        let merged = drain(fan_in(inputs, CancellationToken::new())).await;

        assert_eq!(merged.len(), 30);
        let unique: HashSet<_> = merged.into_iter().collect();
        assert_eq!(unique, (0..30).collect());
    }

    #[tokio::test]
    async fn fan_in_with_no_inputs_closes_immediately() {
        let merged = drain(fan_in::<u64>(vec![], CancellationToken::new())).await;
        assert!(merged.is_empty());
    }

    #[tokio::test]
    async fn fan_in_closes_after_cancellation_even_if_inputs_stay_open() {
        let (_held_tx, held_rx) = mpsc::channel::<u64>(HANDOFF_CAPACITY);
        let cancel = CancellationToken::new();
        let mut merged = fan_in(vec![held_rx], cancel.clone());

        cancel.cancel();
        let closed = timeout(Duration::from_secs(5), merged.recv())
            .await
            .expect("fan-in output did not close after cancellation");
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn take_stops_after_bound() {
        let taken = drain(take(producer((0..100).collect()), 3, CancellationToken::new())).await;
        assert_eq!(taken, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn take_passes_through_shorter_input() {
        let taken = drain(take(producer(vec![7, 8]), 5, CancellationToken::new())).await;
        assert_eq!(taken, vec![7, 8]);
    }

    #[tokio::test]
    async fn take_zero_yields_nothing() {
        let taken = drain(take(producer(vec![1, 2, 3]), 0, CancellationToken::new())).await;
        assert!(taken.is_empty());
    }
}
