//! MQTT connector
//!
//! ## Overview
//!
//! Built on `rumqttc`. [`connect`] splits the client into two halves:
//!
//! - [`MqttConnector`]: the publishing side, used from the polling thread.
//!   Publishing never blocks; it hands the message to the client queue only
//!   while the broker connection is up.
//! - [`MqttNetwork`]: the network task. It drives the `rumqttc` event loop on
//!   a `tokio` runtime and is the only writer of the connection state.
//!
//! ## Reconnect Loop
//!
//! ```text
//!           ┌─────────────── ConnAck ───────────────┐
//!           │                                       ▼
//!     CONNECTING ◄── request / delay ── DISCONNECTED   CONNECTED
//!           ▲                                 ▲         │
//!           │                                 └─ error ─┘
//!           └──── poll error: wait for request or reconnect_delay
//! ```
//!
//! A reconnect request from the publisher cuts the wait short. Without one
//! the task retries after `reconnect_delay_ms` anyway.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Notify;

pub use rumqttc::QoS;

use crate::state::{ConnectionState, SharedConnectionState};
use crate::{ConnectionStats, Connector};

/// Shortest keep-alive `rumqttc` accepts
const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// MQTT-specific errors
#[derive(Debug, Error)]
pub enum MqttError {
    /// Broker connection is not up
    #[error("Not connected to broker")]
    NotConnected,

    /// Client request queue rejected the message
    #[error("Client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// MQTT configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or address
    pub host: String,
    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Client identifier
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Topic for counter reports
    #[serde(default = "default_topic")]
    pub topic: String,
    /// User name
    #[serde(default = "default_username")]
    pub username: String,
    /// Password, resolved by the caller before connecting
    #[serde(default)]
    pub password: Option<String>,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Start with a clean session
    #[serde(default)]
    pub clean_session: bool,
    /// Pause before an unrequested reconnect attempt (milliseconds)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Topic prefix for the per-sample debug values
    #[serde(default = "default_debug_topic_prefix")]
    pub debug_topic_prefix: String,
    /// Capacity of the client request queue
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "gasometer".into()
}

fn default_topic() -> String {
    "gas/value".into()
}

fn default_username() -> String {
    "mosquitto".into()
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_debug_topic_prefix() -> String {
    "gas".into()
}

fn default_request_capacity() -> usize {
    16
}

impl MqttConfig {
    /// Create new configuration for `host` with default settings
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            client_id: default_client_id(),
            topic: default_topic(),
            username: default_username(),
            password: None,
            keep_alive_secs: default_keep_alive_secs(),
            clean_session: false,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            debug_topic_prefix: default_debug_topic_prefix(),
            request_capacity: default_request_capacity(),
        }
    }

    /// Set user name and password
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = Some(password.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Set the unrequested reconnect delay in milliseconds
    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.reconnect_delay_ms = ms;
        self
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Check the settings `rumqttc` would otherwise reject at runtime
    pub fn validate(&self) -> Result<(), MqttError> {
        if self.host.trim().is_empty() {
            return Err(MqttError::Config("broker host is empty".into()));
        }
        if self.topic.trim().is_empty() {
            return Err(MqttError::Config("topic is empty".into()));
        }
        if self.client_id.is_empty() && !self.clean_session {
            return Err(MqttError::Config(
                "a persistent session needs a client id".into(),
            ));
        }
        if self.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            return Err(MqttError::Config(format!(
                "keep alive must be at least {} s",
                MIN_KEEP_ALIVE_SECS
            )));
        }
        if self.request_capacity == 0 {
            return Err(MqttError::Config("request capacity must be positive".into()));
        }
        Ok(())
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options
            .set_keep_alive(Duration::from_secs(self.keep_alive_secs))
            .set_clean_session(self.clean_session);
        if let Some(password) = &self.password {
            options.set_credentials(&self.username, password);
        }
        options
    }
}

/// Build the connector and its network task
///
/// Nothing touches the network until [`MqttNetwork::run`] is polled.
pub fn connect(config: &MqttConfig) -> Result<(MqttConnector, MqttNetwork), MqttError> {
    config.validate()?;

    let (client, eventloop) = AsyncClient::new(config.options(), config.request_capacity);
    let state = SharedConnectionState::default();
    let notify = Arc::new(Notify::new());
    let stats = Arc::new(Mutex::new(ConnectionStats::default()));

    info!(
        "MQTT client {} for {}:{}",
        config.client_id, config.host, config.port
    );

    let connector = MqttConnector {
        client,
        state: state.clone(),
        notify: notify.clone(),
        stats: stats.clone(),
    };
    let network = MqttNetwork {
        eventloop,
        state,
        notify,
        stats,
        reconnect_delay: config.reconnect_delay(),
    };

    Ok((connector, network))
}

fn update_stats(stats: &Mutex<ConnectionStats>, f: impl FnOnce(&mut ConnectionStats)) {
    match stats.lock() {
        Ok(mut guard) => f(&mut guard),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}

/// Publishing half of the MQTT client
pub struct MqttConnector {
    client: AsyncClient,
    state: SharedConnectionState,
    notify: Arc<Notify>,
    stats: Arc<Mutex<ConnectionStats>>,
}

impl MqttConnector {
    /// Connection state cell shared with the network task
    pub fn state(&self) -> &SharedConnectionState {
        &self.state
    }
}

impl Connector for MqttConnector {
    type Error = MqttError;

    fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error> {
        if !self.state.is_connected() {
            update_stats(&self.stats, |s| {
                s.messages_failed += 1;
                s.last_error = Some("not connected".into());
            });
            return Err(MqttError::NotConnected);
        }

        match self.client.try_publish(topic, QoS::AtMostOnce, false, data.to_vec()) {
            Ok(()) => {
                update_stats(&self.stats, |s| {
                    s.messages_sent += 1;
                    s.bytes_sent += data.len() as u64;
                });
                Ok(())
            }
            Err(e) => {
                update_stats(&self.stats, |s| {
                    s.messages_failed += 1;
                    s.last_error = Some(e.to_string());
                });
                Err(e.into())
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn request_reconnect(&mut self) {
        update_stats(&self.stats, |s| s.reconnections += 1);
        self.notify.notify_one();
    }

    fn stats(&self) -> ConnectionStats {
        match self.stats.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Network half of the MQTT client
pub struct MqttNetwork {
    eventloop: EventLoop,
    state: SharedConnectionState,
    notify: Arc<Notify>,
    stats: Arc<Mutex<ConnectionStats>>,
    reconnect_delay: Duration,
}

impl MqttNetwork {
    /// Drive the connection forever
    pub async fn run(mut self) {
        self.state.set(ConnectionState::Connecting);
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    debug!("ConnAck {:?}", ack.code);
                    self.state.set(ConnectionState::Connected);
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("Broker closed the session");
                    self.state.set(ConnectionState::Disconnected);
                }
                Ok(_) => {}
                Err(e) => {
                    self.on_error(e);
                    Self::wait_for_retry(self.reconnect_delay, &self.notify).await;
                    self.state.set(ConnectionState::Connecting);
                }
            }
        }
    }

    fn on_error(&self, e: ConnectionError) {
        match &e {
            ConnectionError::ConnectionRefused(code) => {
                error!("Broker refused connection: {:?}", code);
            }
            other => warn!("Broker connection lost: {}", other),
        }
        update_stats(&self.stats, |s| s.last_error = Some(e.to_string()));
        self.state.set(ConnectionState::Disconnected);
    }

    // Borrows only the Sync fields so the `run` future stays Send
    async fn wait_for_retry(reconnect_delay: Duration, notify: &Notify) {
        if tokio::time::timeout(reconnect_delay, notify.notified())
            .await
            .is_ok()
        {
            debug!("Reconnect requested");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config: MqttConfig =
            serde_json::from_str(r#"{"host": "broker.local", "password": "pw"}"#).unwrap();

        assert_eq!(config.port, 1883);
        assert_eq!(config.client_id, "gasometer");
        assert_eq!(config.topic, "gas/value");
        assert_eq!(config.username, "mosquitto");
        assert_eq!(config.keep_alive_secs, 60);
        assert!(!config.clean_session);
        assert_eq!(config.reconnect_delay(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn host_is_required() {
        assert!(serde_json::from_str::<MqttConfig>("{}").is_err());
        assert!(matches!(MqttConfig::new(" ").validate(), Err(MqttError::Config(_))));
    }

    #[test]
    fn short_keep_alive_rejected() {
        let mut config = MqttConfig::new("broker.local");
        config.keep_alive_secs = 1;
        assert!(matches!(config.validate(), Err(MqttError::Config(_))));
    }

    #[test]
    fn send_refused_while_disconnected() {
        let (mut connector, _network) = connect(&MqttConfig::new("broker.local")).unwrap();

        assert!(matches!(connector.send("gas/value", b"1"), Err(MqttError::NotConnected)));

        let stats = connector.stats();
        assert_eq!(stats.messages_sent, 0);
        assert_eq!(stats.messages_failed, 1);
    }

    #[test]
    fn reconnect_requests_are_counted() {
        let (mut connector, _network) = connect(&MqttConfig::new("broker.local")).unwrap();

        connector.request_reconnect();
        connector.request_reconnect();

        assert_eq!(connector.stats().reconnections, 2);
    }
}
