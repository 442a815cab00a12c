//! Daemon configuration
//!
//! One JSON file, e.g.
//!
//! ```json
//! {
//!   "mqtt":    { "host": "broker.local", "password": "-" },
//!   "storage": { "path": "/var/lib/magcount/gas.value", "initial_value": 2650.36 },
//!   "sensor":  { "variant": "qmc5883" },
//!   "debug_all_values": false
//! }
//! ```
//!
//! Everything except the broker host, the password and the storage path has
//! a default. A password of `"-"` is read from standard input; the
//! `MAGCOUNT_MQTT_PASSWORD` environment variable overrides both.

use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use magcount_connectors::{MqttConfig, MqttError};
use magcount_core::constants::{
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_STARTUP_GRACE_MS, DEFAULT_TRIGGER_LEVEL,
    MAX_COUNTER_DECIMALS,
};
use magcount_core::counter::round_to;
use magcount_core::{
    CounterConfig, ReadyPolicy, RetryPolicy, SensorVariant, SupervisorConfig, TriggerConfig,
};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides the configured broker password
pub const PASSWORD_ENV: &str = "MAGCOUNT_MQTT_PASSWORD";

/// Password value meaning "read from standard input"
const PASSWORD_FROM_STDIN: &str = "-";

/// Configuration errors (all fatal at start-up)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No broker password configured (set mqtt.password or {})", PASSWORD_ENV)]
    MissingPassword,

    #[error("Invalid broker settings: {0}")]
    Mqtt(#[from] MqttError),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

/// Counter storage section
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Counter file
    pub path: PathBuf,
    /// Initial value, increment and precision
    #[serde(flatten)]
    pub counter: CounterConfig,
}

/// Trigger section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriggerSection {
    pub level: f32,
    /// Defaults to the sensor variant's hysteresis
    pub hysteresis: Option<f32>,
}

impl Default for TriggerSection {
    fn default() -> Self {
        Self {
            level: DEFAULT_TRIGGER_LEVEL,
            hysteresis: None,
        }
    }
}

/// Sensor section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensorSection {
    pub variant: SensorVariant,
    /// I2C character device
    pub i2c_bus: PathBuf,
    /// Defaults to the variant's factory address
    pub address: Option<u8>,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            variant: SensorVariant::Qmc5883,
            i2c_bus: PathBuf::from("/dev/i2c-1"),
            address: None,
        }
    }
}

impl SensorSection {
    pub fn address(&self) -> u8 {
        self.address.unwrap_or_else(|| self.variant.default_address())
    }
}

fn default_poll_interval_ms() -> u32 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_startup_grace_ms() -> u32 {
    DEFAULT_STARTUP_GRACE_MS
}

/// Complete daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub mqtt: MqttConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub trigger: TriggerSection,
    #[serde(default)]
    pub sensor: SensorSection,
    #[serde(default)]
    pub bus_retry: RetryPolicy,
    #[serde(default)]
    pub ready: ReadyPolicy,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u32,
    #[serde(default)]
    pub debug_all_values: bool,
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u32,
}

impl DaemonConfig {
    /// Read and parse the configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Settle the broker password
    ///
    /// `env_override` wins; otherwise `"-"` reads one line from `stdin`.
    pub fn resolve_password<R: BufRead>(
        &mut self,
        env_override: Option<String>,
        mut stdin: R,
    ) -> Result<(), ConfigError> {
        if let Some(password) = env_override.filter(|p| !p.is_empty()) {
            self.mqtt.password = Some(password);
            return Ok(());
        }

        if self.mqtt.password.as_deref() == Some(PASSWORD_FROM_STDIN) {
            let mut line = String::new();
            stdin.read_line(&mut line).map_err(|source| ConfigError::Io {
                path: PathBuf::from("<stdin>"),
                source,
            })?;
            let password = line.trim_end_matches(['\r', '\n']).to_string();
            self.mqtt.password = Some(password);
        }

        match self.mqtt.password.as_deref() {
            Some(p) if !p.is_empty() => Ok(()),
            _ => Err(ConfigError::MissingPassword),
        }
    }

    /// Check everything the pipeline would otherwise trip over later
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mqtt.validate()?;

        if self.mqtt.password.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingPassword);
        }
        if self.storage.path.as_os_str().is_empty() {
            return Err(invalid("storage.path", "empty"));
        }

        let counter = &self.storage.counter;
        if !counter.initial_value.is_finite() || counter.initial_value < 0.0 {
            return Err(invalid(
                "storage.initial_value",
                format!("{} is not a finite non-negative number", counter.initial_value),
            ));
        }
        if !counter.increment.is_finite() || counter.increment <= 0.0 {
            return Err(invalid(
                "storage.increment",
                format!("{} is not a positive number", counter.increment),
            ));
        }
        if counter.decimals > MAX_COUNTER_DECIMALS {
            return Err(invalid(
                "storage.decimals",
                format!("{} exceeds {}", counter.decimals, MAX_COUNTER_DECIMALS),
            ));
        }
        if round_to(counter.increment, counter.decimals) != counter.increment {
            return Err(invalid(
                "storage.increment",
                format!(
                    "{} is lost when rounding to {} decimals",
                    counter.increment, counter.decimals
                ),
            ));
        }

        if !self.trigger.level.is_finite() {
            return Err(invalid("trigger.level", "not a finite number"));
        }
        if let Some(h) = self.trigger.hysteresis {
            if !h.is_finite() || h < 0.0 {
                return Err(invalid("trigger.hysteresis", format!("{} is negative", h)));
            }
        }

        Ok(())
    }

    pub fn trigger_config(&self) -> TriggerConfig {
        let hysteresis = self
            .trigger
            .hysteresis
            .unwrap_or_else(|| self.sensor.variant.default_hysteresis());
        TriggerConfig::new(self.trigger.level, hysteresis)
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            increment: self.storage.counter.increment,
            poll_interval_ms: self.poll_interval_ms,
            debug_all_values: self.debug_all_values,
            startup_grace_ms: self.startup_grace_ms,
        }
    }
}
