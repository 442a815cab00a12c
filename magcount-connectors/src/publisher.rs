//! Counter publisher
//!
//! Frames counter values as JSON and applies the at-most-once drop policy:
//!
//! ```text
//! publish(value)
//!   ├── connected     → send {"time": "<epoch secs>", "value": <2 dp>}
//!   │                    └── send fails → warn, drop the report
//!   └── not connected → warn, request reconnect, drop the report
//! ```
//!
//! The debug firehose sends each sample's axes and magnitude as bare numbers
//! to four topics. It is skipped silently while disconnected.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use magcount_core::constants::REPORT_DECIMALS;
use magcount_core::counter::round_to;
use magcount_core::time::TimeSource;
use magcount_core::{Reporter, Sample};
use serde::Serialize;

use crate::{Connector, ConnectorError};

/// Poll interval while waiting for the first connection
const READY_POLL: Duration = Duration::from_millis(100);

/// Counter report payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueReport {
    /// Seconds since the Unix epoch, as decimal text
    pub time: String,
    /// Counter value rounded for display
    pub value: f64,
}

impl ValueReport {
    pub fn new(epoch_secs: f64, value: f64) -> Self {
        Self {
            time: format!("{:.6}", epoch_secs),
            value: round_to(value, REPORT_DECIMALS),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ConnectorError> {
        serde_json::to_vec(self).map_err(|e| ConnectorError::Serialization(e.to_string()))
    }
}

/// Topics of the per-sample debug values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugTopics {
    pub x: String,
    pub y: String,
    pub z: String,
    pub magnitude: String,
}

impl DebugTopics {
    /// `<prefix>/x`, `<prefix>/y`, `<prefix>/z` and `<prefix>/B`
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            x: format!("{}/x", prefix),
            y: format!("{}/y", prefix),
            z: format!("{}/z", prefix),
            magnitude: format!("{}/B", prefix),
        }
    }
}

/// Publishes counter values through a [`Connector`]
pub struct CounterPublisher<C: Connector, T> {
    connector: C,
    time: T,
    topic: String,
    debug_topics: Option<DebugTopics>,
    dropped: u64,
}

impl<C: Connector, T: TimeSource> CounterPublisher<C, T> {
    pub fn new(connector: C, time: T, topic: impl Into<String>) -> Self {
        Self {
            connector,
            time,
            topic: topic.into(),
            debug_topics: None,
            dropped: 0,
        }
    }

    /// Enable the debug firehose under `prefix`
    pub fn with_debug_topics(mut self, prefix: &str) -> Self {
        self.debug_topics = Some(DebugTopics::with_prefix(prefix));
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Reports dropped because the broker was not connected or the send failed
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Publish one counter value
    ///
    /// Never blocks and never queues. While disconnected the report is
    /// dropped and a reconnect is requested. A failed send is dropped too.
    pub fn publish(&mut self, value: f64) -> Result<(), ConnectorError> {
        if !self.connector.is_connected() {
            self.dropped += 1;
            warn!(
                "Not connected, dropping report of {} ({} dropped so far)",
                value, self.dropped
            );
            self.connector.request_reconnect();
            return Err(ConnectorError::NotConnected);
        }

        let report = ValueReport::new(self.time.now_secs(), value);
        let payload = report.to_json()?;

        if let Err(e) = self.connector.send(&self.topic, &payload) {
            self.dropped += 1;
            warn!(
                "Report of {} to {} not sent: {} ({} dropped so far)",
                report.value, self.topic, e, self.dropped
            );
            return Err(ConnectorError::ProtocolError(e.to_string()));
        }
        debug!("Published {} to {}", report.value, self.topic);
        Ok(())
    }

    /// Send one sample to the debug topics, if enabled and connected
    pub fn publish_sample(&mut self, sample: &Sample) {
        let topics = match &self.debug_topics {
            Some(topics) => topics,
            None => return,
        };
        if !self.connector.is_connected() {
            return;
        }

        let values = [
            (&topics.x, sample.x().to_string()),
            (&topics.y, sample.y().to_string()),
            (&topics.z, sample.z().to_string()),
            (&topics.magnitude, sample.magnitude().to_string()),
        ];
        for (topic, text) in values {
            if let Err(e) = self.connector.send(topic, text.as_bytes()) {
                debug!("Debug value to {} not sent: {}", topic, e);
            }
        }
    }

    /// Wait up to `grace` for the connection, polling the state
    pub fn wait_connected(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            if self.connector.is_connected() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(READY_POLL.min(deadline - now));
        }
    }
}

impl<C: Connector, T: TimeSource> Reporter for CounterPublisher<C, T> {
    fn report_value(&mut self, value: f64) {
        // publish logs every drop; the next report carries the current total
        let _ = self.publish(value);
    }

    fn report_sample(&mut self, sample: &Sample) {
        self.publish_sample(sample);
    }

    fn await_ready(&mut self, grace_ms: u32) -> bool {
        self.wait_connected(Duration::from_millis(grace_ms as u64))
    }
}

impl<C: Connector, T> Drop for CounterPublisher<C, T> {
    fn drop(&mut self) {
        let stats = self.connector.stats();
        info!(
            "Publisher closing: {} sent, {} failed, {} dropped, {} bytes, {} reconnect requests",
            stats.messages_sent, stats.messages_failed, self.dropped, stats.bytes_sent, stats.reconnections
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_rounds_to_two_decimals() {
        let report = ValueReport::new(1_700_000_000.25, 2650.3700000000003);
        let json = String::from_utf8(report.to_json().unwrap()).unwrap();

        assert_eq!(json, r#"{"time":"1700000000.250000","value":2650.37}"#);
    }

    #[test]
    fn debug_topics_from_prefix() {
        let topics = DebugTopics::with_prefix("gas/");
        assert_eq!(topics.x, "gas/x");
        assert_eq!(topics.magnitude, "gas/B");
    }
}
