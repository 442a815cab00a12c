//! Broker connectors for magcount
//!
//! ## Overview
//!
//! The polling loop hands every counter change to a
//! [`CounterPublisher`](publisher::CounterPublisher), which frames it and
//! passes it to a [`Connector`]. The connector owns the transport; the
//! publisher owns the drop policy.
//!
//! ```text
//!  polling thread                         network task
//! ┌──────────────────┐                  ┌──────────────────────┐
//! │ CounterPublisher │── send() ───────►│ broker connection    │
//! │   is_connected() │◄── state cell ───│ ConnAck / Disconnect │
//! │   reconnect req. │──── notify ─────►│ reconnect loop       │
//! └──────────────────┘                  └──────────────────────┘
//! ```
//!
//! The [`SharedConnectionState`](state::SharedConnectionState) cell is the
//! only mutable state shared between the two sides.
//!
//! ## Drop Policy
//!
//! Reports are at-most-once. When the broker is not connected a report is
//! dropped, logged and a reconnect is requested; nothing is queued. The
//! durable counter holds the authoritative total, so the next report that
//! gets through carries the correct value.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use magcount_connectors::mqtt::{self, MqttConfig};
//! use magcount_connectors::publisher::CounterPublisher;
//! use magcount_core::time::SystemTime;
//!
//! let config = MqttConfig::new("broker.local").credentials("mosquitto", "secret");
//! let (connector, network) = mqtt::connect(&config)?;
//! std::thread::spawn(move || runtime.block_on(network.run()));
//!
//! let mut publisher = CounterPublisher::new(connector, SystemTime, &config.topic);
//! publisher.publish(2650.37)?;
//! ```

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub mod publisher;
pub mod state;

// Re-export common types
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttConfig, MqttConnector, MqttError, MqttNetwork, QoS};
pub use publisher::{CounterPublisher, DebugTopics, ValueReport};
pub use state::{ConnectionState, SharedConnectionState};

use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Not connected")]
    NotConnected,

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Trait for all broker connectors
pub trait Connector {
    type Error: std::fmt::Display;

    /// Send one message, at most once
    fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Ask the transport to reconnect as soon as possible
    ///
    /// Never blocks.
    fn request_reconnect(&mut self);

    /// Get connection statistics
    fn stats(&self) -> ConnectionStats;
}

/// Connection statistics common to all connectors
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConnectionStats {
    /// Total messages sent successfully
    pub messages_sent: u64,
    /// Total messages dropped or failed to send
    pub messages_failed: u64,
    /// Total payload bytes sent
    pub bytes_sent: u64,
    /// Number of reconnect requests
    pub reconnections: u32,
    /// Last error message
    pub last_error: Option<String>,
}
