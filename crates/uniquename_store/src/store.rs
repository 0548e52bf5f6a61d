//! Store and transaction traits.

use crate::error::StoreError;
use crate::error::StoreResult;
use crate::retry::RetryPolicy;
use crate::types::{SequenceNumber, TransactionId};
use std::time::Instant;
use tracing::debug;

/// Operations available inside a single transaction.
///
/// # Invariants
///
/// - Reads observe the transaction's own pending writes
/// - Nothing written through a transaction is visible to other transactions
///   until the owning [`KvStore`] commits it
/// - Point reads ([`KvTransaction::get`]) take part in conflict detection;
///   range reads do not
pub trait KvTransaction {
    /// Returns the transaction ID.
    fn id(&self) -> TransactionId;

    /// Reads a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn get(&mut self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Writes a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be buffered.
    fn set(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Deletes a key. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete cannot be buffered.
    fn clear(&mut self, key: &[u8]) -> StoreResult<()>;

    /// Reads every live key in `[begin, end)`, in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn get_range(&mut self, begin: &[u8], end: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Deletes every key in `[begin, end)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn clear_range(&mut self, begin: &[u8], end: &[u8]) -> StoreResult<()>;
}

/// A transactional key-value store with serializable transactions.
///
/// Implementations must be `Send + Sync`: one handle is shared by every
/// caller and every key.
pub trait KvStore: Send + Sync {
    /// Transaction type handed to callers.
    type Transaction: KvTransaction;

    /// Begins a new transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn begin(&self) -> StoreResult<Self::Transaction>;

    /// Commits a transaction.
    ///
    /// # Errors
    ///
    /// Returns a retryable [`StoreError::Conflict`] if a key read by the
    /// transaction was changed by a transaction that committed first.
    fn commit(&self, txn: Self::Transaction) -> StoreResult<SequenceNumber>;

    /// Discards a transaction and all of its pending writes.
    fn abort(&self, txn: Self::Transaction);

    /// Runs `body` in a transaction, retrying on conflicts.
    ///
    /// The body may run several times: it is re-executed from scratch in a
    /// fresh transaction after every retryable commit failure, so it must not
    /// have side effects outside the transaction. An error returned by the
    /// body aborts the transaction and is returned unchanged, without retry.
    ///
    /// # Errors
    ///
    /// Returns the body's error, a non-retryable store error, or
    /// [`StoreError::RetryLimitExceeded`] once `policy.max_attempts` attempts
    /// have conflicted or the next backoff would overrun `policy.timeout`.
    fn transact<T, E, F>(&self, policy: &RetryPolicy, mut body: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<StoreError>,
        F: FnMut(&mut Self::Transaction) -> Result<T, E>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            let mut txn = self.begin()?;
            let txid = txn.id();
            let value = match body(&mut txn) {
                Ok(value) => value,
                Err(err) => {
                    self.abort(txn);
                    return Err(err);
                }
            };

            match self.commit(txn) {
                Ok(_) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    attempt += 1;
                    let delay = policy.backoff(attempt);
                    if !policy.permits(attempt, started.elapsed() + delay) {
                        return Err(StoreError::RetryLimitExceeded {
                            attempts: attempt,
                            last_error: err.to_string(),
                        }
                        .into());
                    }
                    debug!(%txid, attempt, ?delay, error = %err, "retrying transaction");
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
