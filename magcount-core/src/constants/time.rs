//! Time-Related Constants
//!
//! Intervals and delays for the polling loop and the drivers. All values are
//! milliseconds unless the name says otherwise.

// ===== TIME UNIT CONVERSIONS =====

/// Milliseconds per second.
pub const MS_PER_SECOND: u64 = 1000;

// ===== POLLING =====

/// Pause between polls when no trigger fired (milliseconds).
///
/// Deliberate rate limiting: a dial magnet passes the sensor over
/// several seconds, so 2 Hz sampling never misses a revolution.
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 500;

/// Longest wait for the broker before the start-up report (milliseconds).
pub const DEFAULT_STARTUP_GRACE_MS: u32 = 2000;

/// Pause between data-ready status polls (milliseconds).
pub const DEFAULT_READY_POLL_MS: u32 = 100;

// ===== BUS =====

/// Pause before retrying a failed block read (milliseconds).
pub const DEFAULT_BUS_RETRY_DELAY_MS: u32 = 100;

// ===== DEVICE SETTLE TIMES =====

/// Wait after the QMC5883 set/reset write before configuring it.
pub const QMC5883_RESET_SETTLE_MS: u32 = 1000;

/// Wait after switching the HMC5883 to continuous mode.
///
/// Datasheet: first measurement is available 6 ms after the mode write.
pub const HMC5883_MODE_SETTLE_MS: u32 = 6;
