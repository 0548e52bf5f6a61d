//! # uniquename testkit
//!
//! Test utilities for the unique-name registry.
//!
//! This crate provides:
//! - Registry fixtures on a manual clock
//! - Property-based generators and a reference model of the claim rules
//! - Multi-threaded contention harnesses
//!
//! ## Usage
//!
//! ```rust
//! use uniquename_testkit::prelude::*;
//!
//! let registry = TestRegistry::new();
//! assert!(registry.take("djMax", "user1", Some(FIXTURE_EPOCH + 10)).unwrap());
//!
//! registry.advance_millis(10);
//! assert!(registry.take("djMax", "user2", None).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
