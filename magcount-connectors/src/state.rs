//! Broker connection state shared between threads
//!
//! Written only by the network task, read by the polling thread. Stores use
//! release ordering and loads use acquire ordering, so a reader that sees
//! `Connected` also sees everything the network task did before setting it.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use log::info;

/// Lifecycle of the broker connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// No connection and no attempt in flight
    Disconnected = 0,
    /// Connection attempt in flight
    Connecting = 1,
    /// Broker acknowledged the connection
    Connected = 2,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Atomically readable connection state cell
#[derive(Debug, Clone)]
pub struct SharedConnectionState {
    inner: Arc<AtomicU8>,
}

impl Default for SharedConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}

impl SharedConnectionState {
    pub fn new(initial: ConnectionState) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(initial as u8)),
        }
    }

    /// Current state
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    /// Replace the state, returning the previous one
    ///
    /// Transitions are logged at `info`.
    pub fn set(&self, state: ConnectionState) -> ConnectionState {
        let previous = ConnectionState::from_u8(self.inner.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            info!("Broker connection {} -> {}", previous, state);
        }
        previous
    }
}
