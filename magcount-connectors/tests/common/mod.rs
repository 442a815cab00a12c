//! Shared fakes for connector integration tests

#![allow(dead_code)]

use magcount_connectors::{ConnectionStats, Connector, SharedConnectionState};

/// Error raised by [`FakeConnector`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeError(pub &'static str);

impl std::fmt::Display for FakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// In-memory connector driven by a shared state cell
pub struct FakeConnector {
    pub state: SharedConnectionState,
    pub sent: Vec<(String, String)>,
    pub reconnect_requests: u32,
    pub fail_sends: bool,
}

impl FakeConnector {
    pub fn new(state: SharedConnectionState) -> Self {
        Self {
            state,
            sent: Vec::new(),
            reconnect_requests: 0,
            fail_sends: false,
        }
    }

    pub fn topics(&self) -> Vec<&str> {
        self.sent.iter().map(|(topic, _)| topic.as_str()).collect()
    }
}

impl Connector for FakeConnector {
    type Error = FakeError;

    fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail_sends {
            return Err(FakeError("queue full"));
        }
        self.sent
            .push((topic.to_string(), String::from_utf8_lossy(data).into_owned()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn request_reconnect(&mut self) {
        self.reconnect_requests += 1;
    }

    fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            messages_sent: self.sent.len() as u64,
            reconnections: self.reconnect_requests,
            ..Default::default()
        }
    }
}
