//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Another transaction committed a write to a key this transaction read.
    #[error("transaction conflict on key {key}")]
    Conflict {
        /// Printable form of the conflicting key.
        key: String,
    },

    /// The store cannot be reached.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The transaction runner gave up after repeated conflicts.
    #[error("transaction not committed after {attempts} attempts: {last_error}")]
    RetryLimitExceeded {
        /// Number of attempts made.
        attempts: u32,
        /// The error that caused the final attempt to fail.
        last_error: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// A key could not be decoded as a tuple or does not belong to a subspace.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of the problem.
        message: String,
    },

    /// The requested directory has never been created.
    #[error("directory not found: {path}")]
    DirectoryNotFound {
        /// Slash-joined directory path.
        path: String,
    },
}

impl StoreError {
    /// Creates a conflict error for the given key.
    pub fn conflict(key: &[u8]) -> Self {
        Self::Conflict {
            key: crate::tuple::printable(key),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns true if re-running the transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(StoreError::conflict(b"k").is_retryable());
        assert!(!StoreError::unavailable("down").is_retryable());
        assert!(!StoreError::invalid_operation("nope").is_retryable());
        assert!(!StoreError::RetryLimitExceeded {
            attempts: 3,
            last_error: "conflict".into(),
        }
        .is_retryable());
    }

    #[test]
    fn conflict_key_is_printable() {
        let err = StoreError::conflict(&[0x02, b'n', b'm', 0x00]);
        assert_eq!(err.to_string(), "transaction conflict on key \\x02nm\\x00");
    }
}
