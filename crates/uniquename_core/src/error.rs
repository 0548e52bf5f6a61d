//! Error types for registry operations.

use crate::lifecycle::ConnectionState;
use thiserror::Error;
use uniquename_store::StoreError;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur in registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The namespace directory could not be opened. Fatal for that connect
    /// attempt.
    #[error("cannot open namespace directory {directory:?}: {source}")]
    Connection {
        /// Slash-joined directory path.
        directory: String,
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },

    /// A transaction, read or write failed in the store, including retry
    /// exhaustion.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A stored value is not a valid ownership record.
    #[error("invalid ownership record: {message}")]
    Decode {
        /// Description of the decoding error.
        message: String,
    },

    /// An ownership record could not be serialized.
    #[error("cannot encode ownership record: {message}")]
    Encode {
        /// Description of the encoding error.
        message: String,
    },

    /// The registry is not in the `connected` state.
    #[error("registry is not connected (state: {state})")]
    NotConnected {
        /// State at the time of the call.
        state: ConnectionState,
    },

    /// `connect` was called a second time.
    #[error("connect may only be attempted once")]
    ConnectAlreadyAttempted,

    /// No store handle has been supplied.
    #[error("no store handle has been supplied")]
    MissingStore,

    /// A store handle was supplied twice.
    #[error("a store handle is already attached")]
    StoreAlreadyAttached,

    /// A blocking registry task could not be joined.
    #[error("registry task failed: {message}")]
    Task {
        /// Description of the failure.
        message: String,
    },
}

impl RegistryError {
    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Returns true if this error came from the store, as opposed to the
    /// registry's own state or record format.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            RegistryError::Store(_) | RegistryError::Connection { .. }
        )
    }
}
