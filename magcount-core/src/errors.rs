//! Error Types for Sensor Access and Counter Persistence
//!
//! ## Error Categories
//!
//! Errors fall into two groups with very different consequences:
//!
//! ### Driver Errors (`DriverError`)
//! - `Bus`: a register access failed and was not (or could no longer be) retried
//! - `MalformedBlock`: a data block was shorter than the sample layout needs
//! - `UnexpectedId`: the device at the address is not the configured model
//! - `NotReady`: the data-ready wait hit its configured attempt bound
//!
//! Transient block-read failures never show up here: the bus retries them
//! (see [`crate::bus::RetryPolicy`]). Whatever does surface is fatal to the
//! polling loop.
//!
//! ### Persistence Errors (`CounterError`, `std` only)
//! - `Io`: reading or replacing the storage file failed
//! - `Parse`: the stored text is not a number
//! - `InvalidValue`: the stored number is negative, NaN or infinite
//! - `InvalidPrecision`, `UnrepresentableIncrement`: the configured rounding
//!   would stall or corrupt the counter
//!
//! A persistence error stops the process. Carrying on would let the in-memory
//! total drift away from what survives a restart.
//!
//! ## Handling Strategy
//!
//! ```rust
//! use magcount_core::DriverError;
//!
//! fn describe<E: core::fmt::Debug>(err: &DriverError<E>) -> &'static str {
//!     match err {
//!         DriverError::Bus(_) => "check wiring and pull-ups",
//!         DriverError::UnexpectedId { .. } => "wrong sensor variant configured",
//!         DriverError::MalformedBlock { .. } => "driver bug",
//!         DriverError::NotReady { .. } => "sensor stopped sampling",
//!     }
//! }
//! ```

use core::fmt;

/// Errors raised by bus and sensor drivers
///
/// Generic over the bus error so the HAL's own error type is preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverError<E> {
    /// Register access failed
    Bus(E),

    /// Raw block shorter than the decode layout requires
    MalformedBlock {
        /// Bytes the layout needs
        expected: usize,
        /// Bytes actually provided
        actual: usize,
    },

    /// Identification registers did not match the configured model
    UnexpectedId {
        /// Identification bytes the model must report
        expected: [u8; 3],
        /// Identification bytes read from the device
        found: [u8; 3],
    },

    /// Device never reported data-ready within the attempt bound
    NotReady {
        /// Number of polls performed before giving up
        attempts: u32,
    },
}

impl<E> From<E> for DriverError<E> {
    fn from(err: E) -> Self {
        Self::Bus(err)
    }
}

impl<E: fmt::Debug> fmt::Display for DriverError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "Bus error: {:?}", e),
            Self::MalformedBlock { expected, actual } => {
                write!(f, "Malformed data block: need {} bytes, got {}", expected, actual)
            }
            Self::UnexpectedId { expected, found } => {
                write!(f, "Unexpected device id {:02x?}, expected {:02x?}", found, expected)
            }
            Self::NotReady { attempts } => {
                write!(f, "Data not ready after {} polls", attempts)
            }
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for DriverError<E> {}

/// Errors raised by the durable counter
#[cfg(feature = "std")]
#[derive(thiserror_no_std::Error, Debug)]
pub enum CounterError {
    /// Storage could not be read, created or replaced
    #[error("Counter storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Storage content is not a decimal number
    #[error("Counter storage holds {content:?}, not a number")]
    Parse {
        /// Offending storage content (trimmed)
        content: String,
    },

    /// Stored or configured value is negative or not finite
    #[error("Counter value {value} is not a finite non-negative number")]
    InvalidValue {
        /// Rejected value
        value: f64,
    },

    /// Requested precision is beyond what the counter can keep
    #[error("Counter precision of {decimals} decimals exceeds {max}")]
    InvalidPrecision {
        /// Requested decimal places
        decimals: u32,
        /// Largest supported value
        max: u32,
    },

    /// Increment would be rounded away at the configured precision
    #[error("Increment {increment} is not representable with {decimals} decimals")]
    UnrepresentableIncrement {
        /// Rejected increment
        increment: f64,
        /// Configured decimal places
        decimals: u32,
    },
}
