use std::collections::BTreeMap;

/// Buffers items that arrive out of height order and releases them as a
/// contiguous, ascending run.
///
/// `next_height` is always one past the last released height, so it doubles as
/// the listener's "everything below here was delivered" marker.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next_height: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> ReorderBuffer<T> {
    /// An empty buffer waiting for `first_height`.
    pub fn new(first_height: u64) -> Self {
        Self {
            next_height: first_height,
            pending: BTreeMap::new(),
        }
    }

    /// The lowest height not released yet.
    pub fn next_height(&self) -> u64 {
        self.next_height
    }

    /// Number of items held back waiting for a lower height.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is held back.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Insert the item for `height` and return every item that is now
    /// releasable, lowest height first. Heights that were already released are
    /// ignored.
    pub fn push(&mut self, height: u64, item: T) -> Vec<(u64, T)> {
        if height < self.next_height {
            return vec![];
        }
        self.pending.insert(height, item);

        let mut ready = vec![];
        while let Some(item) = self.pending.remove(&self.next_height) {
            ready.push((self.next_height, item));
            self.next_height += 1;
        }
        ready
    }
}
