//! Connection state machine.
//!
//! ```text
//! Uninitialized ──connect──► Connecting ──ok──► Connected
//!       │                        │
//!       │ (no store)             └──error──► Disconnected
//!       ▼
//! Disconnected ──attach store, connect──► Connecting ...
//! ```
//!
//! `connect` may run once per registry. Every transition is published on a
//! single-consumer channel.

use crate::error::{RegistryError, RegistryResult};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::debug;

/// Connection state of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Created, connect not yet started.
    Uninitialized,
    /// Directory setup in progress.
    Connecting,
    /// Ready for name operations.
    Connected,
    /// Setup failed, or no store has been supplied.
    Disconnected,
}

impl ConnectionState {
    /// Returns true if name operations may run.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Lowercase state name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the current state and publishes transitions.
pub(crate) struct Lifecycle {
    state: RwLock<ConnectionState>,
    events: Sender<ConnectionState>,
    receiver: Mutex<Option<Receiver<ConnectionState>>>,
    connect_attempted: AtomicBool,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (events, receiver) = mpsc::channel();
        Self {
            state: RwLock::new(ConnectionState::Uninitialized),
            events,
            receiver: Mutex::new(Some(receiver)),
            connect_attempted: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Moves to `next` and publishes it.
    pub(crate) fn transition(&self, next: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        debug!(from = %previous, to = %next, "registry state changed");
        // Nobody listening is fine.
        let _ = self.events.send(next);
    }

    /// Hands out the event receiver. Returns `None` after the first call.
    pub(crate) fn take_events(&self) -> Option<Receiver<ConnectionState>> {
        self.receiver.lock().take()
    }

    /// Claims the single connect attempt.
    pub(crate) fn begin_connect(&self) -> RegistryResult<()> {
        if self.connect_attempted.swap(true, Ordering::SeqCst) {
            return Err(RegistryError::ConnectAlreadyAttempted);
        }
        self.transition(ConnectionState::Connecting);
        Ok(())
    }

    /// Fails with [`RegistryError::NotConnected`] unless connected.
    pub(crate) fn ensure_connected(&self) -> RegistryResult<()> {
        let state = self.state();
        if state.is_usable() {
            Ok(())
        } else {
            Err(RegistryError::NotConnected { state })
        }
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.state())
            .field(
                "connect_attempted",
                &self.connect_attempted.load(Ordering::SeqCst),
            )
            .finish()
    }
}
