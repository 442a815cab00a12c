//! Core counting engine for magcount
//!
//! Turns a magnetometer sitting next to a rotating meter dial into a durable
//! event counter: poll the sensor, derive the field magnitude, classify it
//! with hysteresis and bump a persisted counter once per rising edge.
//!
//! Data flow:
//!
//! ```text
//! RegisterBus → Magnetometer → SampleReader → TriggerDetector
//!                                                   │ (rising edge)
//!                                                   ▼
//!                                DurableCounter → Reporter
//! ```
//!
//! Key constraints:
//! - Bus, drivers and the detector are `no_std` and allocation free
//! - The counter and the polling loop need `std` (files, threads)
//! - A trigger fires at most once per physical crossing
//!
//! ```no_run
//! use magcount_core::{TriggerConfig, TriggerDetector};
//!
//! let mut detector = TriggerDetector::new(TriggerConfig::new(600.0, 2000.0));
//!
//! for magnitude in [100.0, 3000.0, 3100.0] {
//!     if detector.classify(magnitude) {
//!         // One pulse of the meter
//!     }
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bus;
pub mod constants;
pub mod detector;
pub mod errors;
pub mod sample;
pub mod sensor;
pub mod time;
pub mod traits;

#[cfg(feature = "std")]
pub mod counter;

#[cfg(feature = "std")]
pub mod supervisor;

// Public API
pub use bus::{I2cBus, RegisterBus, RetryPolicy};
pub use detector::{Level, TriggerConfig, TriggerDetector, TriggerState};
pub use errors::DriverError;
pub use sample::{ByteOrder, Sample, SampleLayout};
pub use sensor::{AnyMagnetometer, Magnetometer, ReadyPolicy, SampleReader, SensorVariant};
pub use traits::{Reporter, SampleSource};

#[cfg(feature = "std")]
pub use counter::{CounterConfig, DurableCounter};

#[cfg(feature = "std")]
pub use errors::CounterError;

#[cfg(feature = "std")]
pub use supervisor::{StepOutcome, Supervisor, SupervisorConfig, SupervisorError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
