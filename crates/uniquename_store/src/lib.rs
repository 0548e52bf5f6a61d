//! # uniquename store
//!
//! Transactional key-value store contract consumed by the unique-name
//! registry, plus an in-memory implementation.
//!
//! This crate provides:
//! - The [`KvStore`] / [`KvTransaction`] traits (get, set, clear, range reads)
//! - A retrying transaction runner ([`KvStore::transact`], [`RetryPolicy`])
//! - Order-preserving tuple keys ([`Element`], [`pack`], [`unpack`])
//! - A directory layer that hands out short, isolated key prefixes
//!   ([`DirectoryLayer`], [`Subspace`])
//! - [`MemoryStore`], an optimistic-concurrency store for tests and tools
//!
//! ## Design Principles
//!
//! - Stores are opaque byte maps; they never interpret values
//! - A transaction either commits all of its writes or none of them
//! - Conflicting commits fail with a retryable error; the runner re-executes
//!   the whole transaction body, so bodies must be side-effect free
//!
//! ## Example
//!
//! ```rust
//! use uniquename_store::{KvStore, KvTransaction, MemoryStore, RetryPolicy, StoreError};
//!
//! let store = MemoryStore::new();
//! let policy = RetryPolicy::default();
//!
//! store
//!     .transact(&policy, |txn| -> Result<(), StoreError> {
//!         txn.set(b"greeting", b"hello")
//!     })
//!     .unwrap();
//!
//! let value = store
//!     .transact(&policy, |txn| -> Result<_, StoreError> { txn.get(b"greeting") })
//!     .unwrap();
//! assert_eq!(value.as_deref(), Some(&b"hello"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod error;
mod memory;
mod retry;
mod store;
mod tuple;
mod types;

pub use directory::{DirectoryLayer, Subspace, DEFAULT_NODE_PREFIX};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, MemoryStoreStats, MemoryTransaction};
pub use retry::RetryPolicy;
pub use store::{KvStore, KvTransaction};
pub use tuple::{pack, printable, unpack, Element};
pub use types::{SequenceNumber, TransactionId};
