//! Constants for magcount Core
//!
//! Centralised defaults used throughout the crate. Configuration layers start
//! from these values; nothing else should hard-code them.
//!
//! ## Organization
//!
//! - **Sensors**: register maps, addresses and per-model trigger defaults
//! - **Time**: poll intervals, retry delays and settle times
//! - **Counter**: persistence defaults

/// Register maps, device addresses and per-model trigger defaults.
pub mod sensors;

/// Poll intervals, retry delays and device settle times.
pub mod time;

// Re-export commonly used constants for convenience
pub use sensors::{DEFAULT_TRIGGER_LEVEL, HMC5883_DEFAULT_HYSTERESIS, QMC5883_DEFAULT_HYSTERESIS};

pub use time::{
    DEFAULT_BUS_RETRY_DELAY_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_READY_POLL_MS,
    DEFAULT_STARTUP_GRACE_MS,
};

// ===== COUNTER DEFAULTS =====

/// Counter value used when the storage file does not exist yet.
pub const DEFAULT_INITIAL_VALUE: f64 = 0.0;

/// Counter increment per detected trigger.
///
/// One dial revolution of a typical domestic gas meter is 0.01 m³.
pub const DEFAULT_INCREMENT: f64 = 0.01;

/// Decimal places kept in memory and on disk.
///
/// Rounding after every increment stops binary float error from
/// accumulating over millions of pulses.
pub const DEFAULT_COUNTER_DECIMALS: u32 = 6;

/// Most decimal places a counter may keep.
///
/// An `f64` holds 15 significant decimal digits; finer rounding is
/// meaningless and `10^decimals` overflows well before 400.
pub const MAX_COUNTER_DECIMALS: u32 = 15;

/// Decimal places in published value reports.
pub const REPORT_DECIMALS: u32 = 2;
