//! In-memory transactional store.

use crate::error::{StoreError, StoreResult};
use crate::store::{KvStore, KvTransaction};
use crate::types::{SequenceNumber, TransactionId};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// A committed key slot. A deleted key keeps its slot as a tombstone while
/// some open transaction began before the delete, so that its version still
/// takes part in conflict detection. Older tombstones are dropped at commit.
#[derive(Debug, Clone)]
struct Slot {
    value: Option<Vec<u8>>,
    version: SequenceNumber,
}

/// What a transaction saw when it first read a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReadMark {
    version: SequenceNumber,
    live: bool,
}

/// Represents a pending write in a transaction.
#[derive(Debug, Clone)]
enum PendingWrite {
    Put(Vec<u8>),
    Delete,
}

#[derive(Debug, Default)]
struct Faults {
    /// Number of upcoming commits that fail with a conflict.
    conflicts: u32,
    /// When set, every store access fails with this message.
    unavailable: Option<String>,
}

#[derive(Debug, Default)]
struct Shared {
    data: RwLock<BTreeMap<Vec<u8>, Slot>>,
    next_txid: AtomicU64,
    committed_seq: AtomicU64,
    /// Serializes validation and apply of commits.
    commit_lock: Mutex<()>,
    /// Open transactions and the sequence number each one began at.
    open: Mutex<BTreeMap<TransactionId, SequenceNumber>>,
    /// Tombstones in commit order, waiting to be dropped.
    tombstones: Mutex<VecDeque<(SequenceNumber, Vec<u8>)>>,
    faults: Mutex<Faults>,
    commits: AtomicU64,
    conflicts: AtomicU64,
    aborts: AtomicU64,
}

impl Shared {
    fn check_available(&self) -> StoreResult<()> {
        match &self.faults.lock().unavailable {
            Some(message) => Err(StoreError::unavailable(message.clone())),
            None => Ok(()),
        }
    }

    fn read_committed(&self, key: &[u8]) -> (Option<Vec<u8>>, SequenceNumber) {
        match self.data.read().get(key) {
            Some(slot) => (slot.value.clone(), slot.version),
            None => (None, SequenceNumber::ZERO),
        }
    }

    /// Returns true if `key` changed after the transaction read it.
    ///
    /// A missing key that was read as a tombstone was pruned, not rewritten:
    /// a rewrite after the read would still be present at a newer version.
    fn changed_since(data: &BTreeMap<Vec<u8>, Slot>, key: &[u8], mark: ReadMark) -> bool {
        match data.get(key) {
            Some(slot) => slot.version != mark.version,
            None => mark.live,
        }
    }

    fn register(&self, id: TransactionId) {
        let mut open = self.open.lock();
        let begun = SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst));
        open.insert(id, begun);
    }

    /// Oldest sequence number any other open transaction began at.
    fn horizon(&self, committing: TransactionId, latest: SequenceNumber) -> SequenceNumber {
        self.open
            .lock()
            .iter()
            .filter(|(id, _)| **id != committing)
            .map(|(_, begun)| *begun)
            .min()
            .unwrap_or(latest)
    }

    fn prune_tombstones(&self, data: &mut BTreeMap<Vec<u8>, Slot>, horizon: SequenceNumber) {
        let mut tombstones = self.tombstones.lock();
        while let Some((version, _)) = tombstones.front() {
            if *version > horizon {
                break;
            }
            let Some((version, key)) = tombstones.pop_front() else {
                break;
            };
            if data
                .get(&key)
                .is_some_and(|slot| slot.value.is_none() && slot.version == version)
            {
                data.remove(&key);
            }
        }
    }
}

/// Counters describing store activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    /// Commits that succeeded.
    pub commits: u64,
    /// Commits rejected with a conflict.
    pub conflicts: u64,
    /// Transactions discarded without commit.
    pub aborts: u64,
    /// Sequence number of the latest commit that wrote data.
    pub committed_seq: u64,
}

/// An in-memory store with optimistic concurrency control.
///
/// Every transaction records the version of each key it reads. At commit,
/// under a single commit lock, the store checks that none of those versions
/// changed; if one did, the commit fails with a retryable
/// [`StoreError::Conflict`]. Otherwise the writes are applied atomically and
/// stamped with a new sequence number. This makes committed transactions
/// serializable for point reads.
///
/// A deleted key is kept as a tombstone until no open transaction began
/// before the delete, then dropped at the next commit that writes.
///
/// Cloning a `MemoryStore` yields another handle to the same data.
///
/// # Fault Injection
///
/// Tests can force commit conflicts with [`MemoryStore::inject_conflicts`] and
/// simulate lost connectivity with [`MemoryStore::set_unavailable`].
///
/// # Example
///
/// ```rust
/// use uniquename_store::{KvStore, KvTransaction, MemoryStore};
///
/// let store = MemoryStore::new();
/// let mut txn = store.begin().unwrap();
/// txn.set(b"k", b"v").unwrap();
/// store.commit(txn).unwrap();
///
/// let mut reader = store.begin().unwrap();
/// assert_eq!(reader.get(b"k").unwrap(), Some(b"v".to_vec()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with a conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.shared.faults.lock().conflicts = count;
    }

    /// Makes every access fail with [`StoreError::Unavailable`], or restores
    /// access when `message` is `None`.
    pub fn set_unavailable(&self, message: Option<&str>) {
        self.shared.faults.lock().unavailable = message.map(str::to_string);
    }

    /// Returns activity counters.
    #[must_use]
    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            commits: self.shared.commits.load(Ordering::SeqCst),
            conflicts: self.shared.conflicts.load(Ordering::SeqCst),
            aborts: self.shared.aborts.load(Ordering::SeqCst),
            committed_seq: self.shared.committed_seq.load(Ordering::SeqCst),
        }
    }

    /// Returns the number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared
            .data
            .read()
            .values()
            .filter(|slot| slot.value.is_some())
            .count()
    }

    /// Returns the number of deleted keys still kept for conflict detection.
    #[must_use]
    pub fn tombstones(&self) -> usize {
        self.shared
            .data
            .read()
            .values()
            .filter(|slot| slot.value.is_none())
            .count()
    }

    /// Returns true if no live keys exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    type Transaction = MemoryTransaction;

    fn begin(&self) -> StoreResult<MemoryTransaction> {
        self.shared.check_available()?;
        let id = TransactionId::new(self.shared.next_txid.fetch_add(1, Ordering::SeqCst) + 1);
        self.shared.register(id);
        trace!(txid = %id, "begin");
        Ok(MemoryTransaction {
            id,
            shared: Arc::clone(&self.shared),
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        })
    }

    fn commit(&self, mut txn: MemoryTransaction) -> StoreResult<SequenceNumber> {
        let shared = &self.shared;
        shared.check_available()?;

        let _commit_guard = shared.commit_lock.lock();

        {
            let mut faults = shared.faults.lock();
            if faults.conflicts > 0 {
                faults.conflicts -= 1;
                shared.conflicts.fetch_add(1, Ordering::SeqCst);
                let key = txn.writes.keys().next().cloned().unwrap_or_default();
                return Err(StoreError::conflict(&key));
            }
        }

        let mut data = shared.data.write();

        for (key, mark) in &txn.reads {
            if Shared::changed_since(&data, key, *mark) {
                shared.conflicts.fetch_add(1, Ordering::SeqCst);
                trace!(txid = %txn.id, "conflict");
                return Err(StoreError::conflict(key));
            }
        }

        if txn.writes.is_empty() {
            shared.commits.fetch_add(1, Ordering::SeqCst);
            return Ok(SequenceNumber::new(
                shared.committed_seq.load(Ordering::SeqCst),
            ));
        }

        let sequence = SequenceNumber::new(shared.committed_seq.load(Ordering::SeqCst)).next();
        let mut deleted = Vec::new();
        for (key, write) in std::mem::take(&mut txn.writes) {
            let value = match write {
                PendingWrite::Put(value) => Some(value),
                PendingWrite::Delete => {
                    deleted.push((sequence, key.clone()));
                    None
                }
            };
            data.insert(
                key,
                Slot {
                    value,
                    version: sequence,
                },
            );
        }
        shared
            .committed_seq
            .store(sequence.as_u64(), Ordering::SeqCst);
        shared.tombstones.lock().extend(deleted);
        let horizon = shared.horizon(txn.id, sequence);
        shared.prune_tombstones(&mut data, horizon);
        shared.commits.fetch_add(1, Ordering::SeqCst);
        trace!(txid = %txn.id, %sequence, "commit");

        Ok(sequence)
    }

    fn abort(&self, txn: MemoryTransaction) {
        self.shared.aborts.fetch_add(1, Ordering::SeqCst);
        trace!(txid = %txn.id, "abort");
    }
}

/// A transaction against a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTransaction {
    id: TransactionId,
    shared: Arc<Shared>,
    /// Read set for conflict detection.
    reads: HashMap<Vec<u8>, ReadMark>,
    /// Pending writes, applied in key order at commit.
    writes: BTreeMap<Vec<u8>, PendingWrite>,
}

impl MemoryTransaction {
    /// Returns the number of pending writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Returns the number of keys in the read set.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.len()
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.shared.open.lock().remove(&self.id);
    }
}

impl KvTransaction for MemoryTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    fn get(&mut self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.shared.check_available()?;

        if let Some(write) = self.writes.get(key) {
            return Ok(match write {
                PendingWrite::Put(value) => Some(value.clone()),
                PendingWrite::Delete => None,
            });
        }

        let (value, version) = self.shared.read_committed(key);
        // Keep the first observed version; a later re-read must not hide a
        // change made between the two reads.
        self.reads.entry(key.to_vec()).or_insert(ReadMark {
            version,
            live: value.is_some(),
        });
        Ok(value)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.writes
            .insert(key.to_vec(), PendingWrite::Put(value.to_vec()));
        Ok(())
    }

    fn clear(&mut self, key: &[u8]) -> StoreResult<()> {
        self.writes.insert(key.to_vec(), PendingWrite::Delete);
        Ok(())
    }

    fn get_range(&mut self, begin: &[u8], end: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.shared.check_available()?;
        if begin >= end {
            return Ok(Vec::new());
        }

        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .shared
            .data
            .read()
            .range(begin.to_vec()..end.to_vec())
            .filter_map(|(key, slot)| slot.value.clone().map(|value| (key.clone(), value)))
            .collect();

        for (key, write) in self.writes.range(begin.to_vec()..end.to_vec()) {
            match write {
                PendingWrite::Put(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                PendingWrite::Delete => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    fn clear_range(&mut self, begin: &[u8], end: &[u8]) -> StoreResult<()> {
        for (key, _) in self.get_range(begin, end)? {
            self.writes.insert(key, PendingWrite::Delete);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use std::sync::atomic::AtomicU32;

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts).with_jitter(false)
    }

    #[test]
    fn committed_data_visible_to_new_transaction() {
        let store = MemoryStore::new();

        let mut txn = store.begin().unwrap();
        txn.set(b"a", b"1").unwrap();
        let seq = store.commit(txn).unwrap();
        assert_eq!(seq.as_u64(), 1);

        let mut reader = store.begin().unwrap();
        assert_eq!(reader.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn aborted_data_not_visible() {
        let store = MemoryStore::new();

        let mut txn = store.begin().unwrap();
        txn.set(b"a", b"1").unwrap();
        store.abort(txn);

        let mut reader = store.begin().unwrap();
        assert!(reader.get(b"a").unwrap().is_none());
        assert_eq!(store.stats().aborts, 1);
    }

    #[test]
    fn reads_see_own_writes() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();

        txn.set(b"a", b"1").unwrap();
        assert_eq!(txn.get(b"a").unwrap(), Some(b"1".to_vec()));

        txn.clear(b"a").unwrap();
        assert!(txn.get(b"a").unwrap().is_none());
        assert_eq!(txn.write_count(), 1);
        assert_eq!(txn.read_count(), 0);
    }

    #[test]
    fn concurrent_writer_after_read_conflicts() {
        let store = MemoryStore::new();

        let mut first = store.begin().unwrap();
        let mut second = store.begin().unwrap();

        assert!(first.get(b"name").unwrap().is_none());
        assert!(second.get(b"name").unwrap().is_none());

        first.set(b"name", b"first").unwrap();
        second.set(b"name", b"second").unwrap();

        store.commit(first).unwrap();
        let err = store.commit(second).unwrap_err();
        assert!(err.is_retryable());

        let mut reader = store.begin().unwrap();
        assert_eq!(reader.get(b"name").unwrap(), Some(b"first".to_vec()));
        assert_eq!(store.stats().conflicts, 1);
    }

    #[test]
    fn blind_writes_do_not_conflict() {
        let store = MemoryStore::new();

        let mut first = store.begin().unwrap();
        let mut second = store.begin().unwrap();
        first.set(b"k", b"1").unwrap();
        second.clear(b"k").unwrap();

        store.commit(first).unwrap();
        store.commit(second).unwrap();

        let mut reader = store.begin().unwrap();
        assert!(reader.get(b"k").unwrap().is_none());
    }

    #[test]
    fn delete_then_recreate_is_detected() {
        let store = MemoryStore::new();
        let mut seed = store.begin().unwrap();
        seed.set(b"k", b"1").unwrap();
        store.commit(seed).unwrap();

        let mut reader = store.begin().unwrap();
        assert!(reader.get(b"k").unwrap().is_some());

        let mut deleter = store.begin().unwrap();
        deleter.clear(b"k").unwrap();
        store.commit(deleter).unwrap();

        reader.set(b"other", b"x").unwrap();
        assert!(matches!(
            store.commit(reader),
            Err(StoreError::Conflict { .. })
        ));
    }

    #[test]
    fn released_keys_are_dropped_once_no_reader_needs_them() {
        let store = MemoryStore::new();
        let mut seed = store.begin().unwrap();
        seed.set(b"k", b"1").unwrap();
        store.commit(seed).unwrap();

        let mut deleter = store.begin().unwrap();
        deleter.clear(b"k").unwrap();
        store.commit(deleter).unwrap();

        assert_eq!(store.tombstones(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn tombstone_outlives_older_open_transaction() {
        let store = MemoryStore::new();
        let mut seed = store.begin().unwrap();
        seed.set(b"k", b"1").unwrap();
        store.commit(seed).unwrap();

        let mut reader = store.begin().unwrap();
        assert!(reader.get(b"k").unwrap().is_some());

        let mut deleter = store.begin().unwrap();
        deleter.clear(b"k").unwrap();
        store.commit(deleter).unwrap();
        assert_eq!(store.tombstones(), 1);

        reader.set(b"other", b"x").unwrap();
        assert!(store.commit(reader).is_err());

        let mut later = store.begin().unwrap();
        later.set(b"other", b"y").unwrap();
        store.commit(later).unwrap();
        assert_eq!(store.tombstones(), 0);
    }

    #[test]
    fn pruned_tombstone_does_not_fail_its_reader() {
        let store = MemoryStore::new();
        let mut seed = store.begin().unwrap();
        seed.set(b"k", b"1").unwrap();
        store.commit(seed).unwrap();

        let holder = store.begin().unwrap();
        let mut deleter = store.begin().unwrap();
        deleter.clear(b"k").unwrap();
        store.commit(deleter).unwrap();

        let mut reader = store.begin().unwrap();
        assert!(reader.get(b"k").unwrap().is_none());
        store.abort(holder);

        let mut unrelated = store.begin().unwrap();
        unrelated.set(b"other", b"x").unwrap();
        store.commit(unrelated).unwrap();
        assert_eq!(store.tombstones(), 0);

        reader.set(b"k", b"2").unwrap();
        store.commit(reader).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn recreated_and_released_key_still_conflicts() {
        let store = MemoryStore::new();
        let mut reader = store.begin().unwrap();
        assert!(reader.get(b"k").unwrap().is_none());

        let mut creator = store.begin().unwrap();
        creator.set(b"k", b"1").unwrap();
        store.commit(creator).unwrap();
        let mut deleter = store.begin().unwrap();
        deleter.clear(b"k").unwrap();
        store.commit(deleter).unwrap();

        reader.set(b"k", b"2").unwrap();
        assert!(matches!(
            store.commit(reader),
            Err(StoreError::Conflict { .. })
        ));
    }

    #[test]
    fn range_reads_merge_pending_writes() {
        let store = MemoryStore::new();
        let mut seed = store.begin().unwrap();
        seed.set(b"a1", b"x").unwrap();
        seed.set(b"a2", b"y").unwrap();
        seed.set(b"b1", b"z").unwrap();
        store.commit(seed).unwrap();

        let mut txn = store.begin().unwrap();
        txn.clear(b"a1").unwrap();
        txn.set(b"a3", b"w").unwrap();

        let keys: Vec<_> = txn
            .get_range(b"a", b"b")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"a2".to_vec(), b"a3".to_vec()]);
    }

    #[test]
    fn clear_range_removes_keys() {
        let store = MemoryStore::new();
        let mut seed = store.begin().unwrap();
        seed.set(b"a1", b"x").unwrap();
        seed.set(b"a2", b"y").unwrap();
        seed.set(b"b1", b"z").unwrap();
        store.commit(seed).unwrap();

        let mut txn = store.begin().unwrap();
        txn.clear_range(b"a", b"b").unwrap();
        store.commit(txn).unwrap();

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unavailable_store_rejects_access() {
        let store = MemoryStore::new();
        store.set_unavailable(Some("network partition"));

        let err = store.begin().unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));

        store.set_unavailable(None);
        assert!(store.begin().is_ok());
    }

    #[test]
    fn transact_retries_injected_conflicts() {
        let store = MemoryStore::new();
        store.inject_conflicts(2);
        let runs = AtomicU32::new(0);

        store
            .transact(&fast_policy(5), |txn| -> StoreResult<()> {
                runs.fetch_add(1, Ordering::SeqCst);
                txn.set(b"k", b"v")
            })
            .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(store.stats().commits, 1);
    }

    #[test]
    fn transact_gives_up_after_max_attempts() {
        let store = MemoryStore::new();
        store.inject_conflicts(10);

        let err = store
            .transact(&fast_policy(3), |txn| -> StoreResult<()> { txn.set(b"k", b"v") })
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::RetryLimitExceeded { attempts: 3, .. }
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn transact_does_not_retry_body_errors() {
        let store = MemoryStore::new();
        let runs = AtomicU32::new(0);

        let err = store
            .transact(&fast_policy(5), |txn| -> StoreResult<()> {
                runs.fetch_add(1, Ordering::SeqCst);
                txn.set(b"k", b"v")?;
                Err(StoreError::invalid_operation("rejected by body"))
            })
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidOperation { .. }));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(store.is_empty());
        assert_eq!(store.stats().aborts, 1);
    }

    #[test]
    fn concurrent_increments_are_serializable() {
        let store = MemoryStore::new();
        let policy = RetryPolicy::new(1_000).with_jitter(true);
        let threads = 8;
        let per_thread = 25;

        std::thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| {
                    for _ in 0..per_thread {
                        store
                            .transact(&policy, |txn| -> StoreResult<()> {
                                let current = txn
                                    .get(b"counter")?
                                    .map(|b| u64::from_be_bytes(b.try_into().unwrap()))
                                    .unwrap_or(0);
                                txn.set(b"counter", &(current + 1).to_be_bytes())
                            })
                            .unwrap();
                    }
                });
            }
        });

        let mut reader = store.begin().unwrap();
        let bytes = reader.get(b"counter").unwrap().unwrap();
        assert_eq!(
            u64::from_be_bytes(bytes.try_into().unwrap()),
            threads * per_thread
        );
    }
}
