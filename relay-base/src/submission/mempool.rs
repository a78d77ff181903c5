use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Shared flag telling transaction submitters whether the destination
/// mempool is congested.
///
/// The flag itself is a plain atomic: reads are lock-free and every write is
/// immediately visible. The writer mutex does not protect the flag. It makes
/// the swap and the wake-up of `set_blocked_status_with_lock` one step, so
/// locked writers observe previous values and wake waiters in the same order.
#[derive(Debug, Default)]
pub struct MemPoolInfo {
    is_blocked: AtomicBool,
    /// Orders swap + notify of locked writers
    writer: Mutex<()>,
    unblocked: Notify,
}

impl MemPoolInfo {
    /// A mempool flag starting in the given state
    pub fn new(is_blocked: bool) -> Self {
        Self {
            is_blocked: AtomicBool::new(is_blocked),
            ..Default::default()
        }
    }

    /// Store the flag without taking the writer lock.
    pub fn set_blocked_status(&self, value: bool) {
        self.is_blocked.store(value, Ordering::Release);
        if !value {
            self.unblocked.notify_waiters();
        }
    }

    /// Store the flag under the writer lock. Returns the previous value.
    pub fn set_blocked_status_with_lock(&self, value: bool) -> bool {
        let _guard = self.writer.lock();
        let previous = self.is_blocked.swap(value, Ordering::AcqRel);
        if !value {
            self.unblocked.notify_waiters();
        }
        previous
    }

    /// Whether the mempool was last reported congested
    pub fn is_blocked(&self) -> bool {
        self.is_blocked.load(Ordering::Acquire)
    }

    /// Resolve once the flag is clear. Returns immediately when it already is.
    pub async fn wait_until_unblocked(&self) {
        loop {
            let notified = self.unblocked.notified();
            tokio::pin!(notified);
            // register before checking the flag so a concurrent clear is not lost
            notified.as_mut().enable();
            if !self.is_blocked() {
                return;
            }
            notified.await;
        }
    }
}
