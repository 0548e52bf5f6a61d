//! # uniquename_core
//!
//! A registry of uniquely owned, optionally expiring names on top of a
//! transactional key-value store.
//!
//! Owners contend for human-chosen names. A claim succeeds when the name is
//! free, when the previous claim has expired, or when the caller already
//! holds it. Claims can be transferred between owners and released.
//!
//! ## Key layout
//!
//! ```text
//! <directory prefix> ("nm", <canonical name>) -> { id, raw, end? }
//! ```
//!
//! Names are canonicalized (case-folded by default) before being turned into
//! keys; the name as submitted is kept in the record.
//!
//! ## Concurrency
//!
//! Correctness under contention comes entirely from the store's serializable
//! transactions. Each operation is a read-decide-write unit that the store's
//! transaction runner retries on conflict.
//!
//! ## Example
//!
//! ```rust
//! use uniquename_core::{RegistryConfig, UniqueNames};
//! use uniquename_store::MemoryStore;
//!
//! let names = UniqueNames::open(MemoryStore::new(), RegistryConfig::default()).unwrap();
//!
//! assert!(names.take("djMax", "user1", None).unwrap());
//! assert!(!names.take("DJMAX", "user2", None).unwrap());
//!
//! let record = names.entity_for_name("djmax").unwrap().unwrap();
//! assert_eq!(record.owner_id, "user1");
//! assert_eq!(record.raw_name, "djMax");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod asynchronous;
mod canonical;
mod claim;
mod clock;
mod config;
mod error;
mod keyspace;
mod lifecycle;
mod record;
mod registry;

pub use asynchronous::AsyncUniqueNames;
pub use canonical::Canonicalizer;
pub use claim::{decide_take, decide_transfer, Decision};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RegistryConfig, DEFAULT_DIRECTORY};
pub use error::{RegistryError, RegistryResult};
pub use keyspace::{NameKeySpace, NAME_TAG};
pub use lifecycle::ConnectionState;
pub use record::OwnershipRecord;
pub use registry::UniqueNames;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
