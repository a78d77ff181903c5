use dashmap::DashMap;
use tracing::trace;

use relay_core::AccountInfo;

/// Errors returned by the `SequenceTracker`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceTrackerError {
    /// The address was never registered. Not retryable: accounts must be
    /// registered before they are used.
    #[error("Account {0} is not registered with the sequence tracker")]
    NotFound(String),
}

/// Per-account sequence (nonce) cache of one chain provider.
///
/// Accounts are kept in a sharded map and every accessor goes through the lock
/// of the shard holding the address. `get_with_lock` reads and advances a
/// sequence under a single lock acquisition, so concurrent callers reserving
/// nonces for the same address always receive distinct, increasing values.
/// Callers on different addresses only contend when the addresses share a
/// shard.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    accounts: DashMap<String, AccountInfo>,
}

impl SequenceTracker {
    /// A tracker seeded with `accounts`. The set may be empty and filled
    /// later through `register`.
    pub fn new(accounts: impl IntoIterator<Item = (String, AccountInfo)>) -> Self {
        Self {
            accounts: accounts.into_iter().collect(),
        }
    }

    /// Start tracking `address`, replacing any previous state. Returns the
    /// replaced state.
    pub fn register(&self, address: impl Into<String>, info: AccountInfo) -> Option<AccountInfo> {
        self.accounts.insert(address.into(), info)
    }

    /// Overwrite the stored state of an already registered address.
    pub fn set(&self, address: &str, info: AccountInfo) -> Result<(), SequenceTrackerError> {
        let mut account = self.entry(address)?;
        *account = info;
        Ok(())
    }

    /// Reserve the next sequence of `address`.
    ///
    /// Returns the stored state and leaves the sequence advanced by one. This
    /// is the only call transaction builders should use to pick a nonce.
    pub fn get_with_lock(&self, address: &str) -> Result<AccountInfo, SequenceTrackerError> {
        let mut account = self.entry(address)?;
        let reserved = *account;
        *account = reserved.next();
        trace!(address, sequence = reserved.sequence, "Reserved sequence");
        Ok(reserved)
    }

    /// Hand back a sequence reserved with `get_with_lock` that was never
    /// broadcast.
    ///
    /// Succeeds only while `reserved` is still the latest reservation, so a
    /// nonce is never reissued after a later one was handed out. Returns
    /// whether the sequence was rolled back.
    pub fn release(
        &self,
        address: &str,
        reserved: AccountInfo,
    ) -> Result<bool, SequenceTrackerError> {
        let mut account = self.entry(address)?;
        if *account != reserved.next() {
            return Ok(false);
        }
        *account = reserved;
        trace!(address, sequence = reserved.sequence, "Released sequence");
        Ok(true)
    }

    /// Current state of `address`, without reserving anything.
    pub fn get(&self, address: &str) -> Result<AccountInfo, SequenceTrackerError> {
        self.accounts
            .get(address)
            .map(|account| *account)
            .ok_or_else(|| SequenceTrackerError::NotFound(address.to_owned()))
    }

    /// Advance the sequence of `address` by one.
    pub fn increment_sequence(&self, address: &str) -> Result<(), SequenceTrackerError> {
        let mut account = self.entry(address)?;
        *account = account.next();
        Ok(())
    }

    /// Whether `address` is registered
    pub fn contains(&self, address: &str) -> bool {
        self.accounts.contains_key(address)
    }

    /// Number of registered accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether no account is registered
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn entry(
        &self,
        address: &str,
    ) -> Result<dashmap::mapref::one::RefMut<'_, String, AccountInfo>, SequenceTrackerError> {
        self.accounts
            .get_mut(address)
            .ok_or_else(|| SequenceTrackerError::NotFound(address.to_owned()))
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;

    fn tracker_with(address: &str, account_number: u64, sequence: u64) -> SequenceTracker {
        SequenceTracker::new([(
            address.to_owned(),
            AccountInfo::new(account_number, sequence),
        )])
    }

    #[test]
    fn sequential_reservations_count_up() {
        let tracker = tracker_with("addr1", 5, 10);

        let sequences: Vec<_> = (0..3)
            .map(|_| tracker.get_with_lock("addr1").unwrap())
            .collect();

        assert_eq!(
            sequences,
            vec![
                AccountInfo::new(5, 10),
                AccountInfo::new(5, 11),
                AccountInfo::new(5, 12)
            ]
        );
        assert_eq!(tracker.get("addr1").unwrap(), AccountInfo::new(5, 13));
    }

    #[test]
    fn unknown_address_is_not_found() {
        let tracker = SequenceTracker::default();
        let not_found = Err(SequenceTrackerError::NotFound("ghost".to_owned()));

        assert_eq!(tracker.get_with_lock("ghost"), not_found.clone());
        assert_eq!(tracker.get("ghost"), not_found.clone());
        assert_eq!(tracker.increment_sequence("ghost"), not_found.clone().map(|_| ()));
        assert!(tracker.is_empty());
    }

    #[test]
    fn set_only_updates_registered_accounts() {
        let tracker = tracker_with("addr1", 1, 1);

        assert!(tracker.set("addr2", AccountInfo::new(2, 2)).is_err());
        assert!(!tracker.contains("addr2"));

        tracker.set("addr1", AccountInfo::new(1, 40)).unwrap();
        assert_eq!(tracker.get_with_lock("addr1").unwrap().sequence, 40);
    }

    #[test]
    fn release_only_rolls_back_latest_reservation() {
        let tracker = tracker_with("addr1", 5, 10);

        let first = tracker.get_with_lock("addr1").unwrap();
        assert!(tracker.release("addr1", first).unwrap());
        assert_eq!(tracker.get("addr1").unwrap(), AccountInfo::new(5, 10));

        let first = tracker.get_with_lock("addr1").unwrap();
        let second = tracker.get_with_lock("addr1").unwrap();
        assert!(!tracker.release("addr1", first).unwrap());
        assert_eq!(tracker.get("addr1").unwrap().sequence, 12);
        assert!(tracker.release("addr1", second).unwrap());
        assert_eq!(tracker.get("addr1").unwrap().sequence, 11);
    }

    #[test]
    fn register_populates_lazily() {
        let tracker = SequenceTracker::default();
        assert_eq!(tracker.register("addr1", AccountInfo::new(3, 0)), None);
        assert_eq!(
            tracker.register("addr1", AccountInfo::new(3, 9)),
            Some(AccountInfo::new(3, 0))
        );
        assert_eq!(tracker.len(), 1);
        tracker.increment_sequence("addr1").unwrap();
        assert_eq!(tracker.get("addr1").unwrap().sequence, 10);
    }

    #[test]
    fn concurrent_reservations_form_contiguous_run() {
        const CALLS: u64 = 500;
        let tracker = Arc::new(tracker_with("addr1", 5, 10));

        let mut sequences: Vec<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let tracker = tracker.clone();
                    scope.spawn(move || {
                        (0..CALLS / 8 + 1)
                            .map(|_| tracker.get_with_lock("addr1").unwrap().sequence)
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });

        let issued = sequences.len() as u64;
        sequences.sort_unstable();
        assert_eq!(sequences, (10..10 + issued).collect::<Vec<_>>());
        assert_eq!(tracker.get("addr1").unwrap().sequence, 10 + issued);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_on_many_addresses_stay_isolated() {
        const ADDRESSES: u64 = 16;
        const CALLS: u64 = 200;
        let tracker = Arc::new(SequenceTracker::new((0..ADDRESSES).map(|i| {
            (format!("addr{i}"), AccountInfo::new(i, i * 1_000))
        })));

        let tasks: Vec<_> = (0..ADDRESSES)
            .flat_map(|i| {
                let tracker = tracker.clone();
                (0..4).map(move |_| {
                    let tracker = tracker.clone();
                    tokio::spawn(async move {
                        let address = format!("addr{i}");
                        let mut seen = vec![];
                        for _ in 0..CALLS / 4 {
                            seen.push(tracker.get_with_lock(&address).unwrap().sequence);
                            tokio::task::yield_now().await;
                        }
                        (i, seen)
                    })
                })
            })
            .collect();

        let mut issued: HashMap<u64, Vec<u64>> = HashMap::new();
        for task in tasks {
            let (i, seen) = task.await.unwrap();
            issued.entry(i).or_default().extend(seen);
        }

        for i in 0..ADDRESSES {
            let account = tracker.get(&format!("addr{i}")).unwrap();
            assert_eq!(account, AccountInfo::new(i, i * 1_000 + CALLS));

            let sequences = issued.get_mut(&i).unwrap();
            sequences.sort_unstable();
            assert_eq!(
                *sequences,
                (i * 1_000..i * 1_000 + CALLS).collect::<Vec<_>>()
            );
        }
    }
}
