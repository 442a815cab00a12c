//! Magnetometer drivers
//!
//! ## Overview
//!
//! Every supported model exposes the same capability set through
//! [`Magnetometer`]:
//!
//! | Capability      | QMC5883                      | HMC5883                     |
//! |-----------------|------------------------------|-----------------------------|
//! | `initialize`    | set/reset + control register | id check + CRA/CRB/mode     |
//! | `poll_ready`    | status register DRDY bit     | always ready                |
//! | `read_raw`      | 6 bytes from 0x00            | 6 bytes from 0x03           |
//! | `decode_sample` | LE, X/Y/Z                    | BE, X/Z/Y                   |
//!
//! The HMC5883 refreshes its output registers continuously, so it relies on
//! the bus's retried block read instead of a status poll.
//!
//! Model selection at runtime goes through the tagged [`AnyMagnetometer`].
//! The data-ready wait loop lives in [`SampleReader`], outside any model.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use magcount_core::{I2cBus, AnyMagnetometer, SampleReader, SensorVariant, ReadyPolicy};
//!
//! let variant = SensorVariant::Qmc5883;
//! let bus = I2cBus::new(i2c, variant.default_address(), Delay);
//! let mut reader = SampleReader::new(AnyMagnetometer::new(variant, bus, Delay), Delay)
//!     .with_policy(ReadyPolicy::default());
//!
//! reader.initialize()?;
//! let sample = reader.read_sample()?;
//! ```

use core::fmt;
use core::str::FromStr;

use embedded_hal::delay::DelayNs;
use log::trace;

use crate::bus::RegisterBus;
use crate::constants::sensors::{
    HMC5883_ADDRESS, HMC5883_DEFAULT_HYSTERESIS, QMC5883_ADDRESS, QMC5883_DEFAULT_HYSTERESIS,
    RAW_BLOCK_LEN,
};
use crate::constants::DEFAULT_READY_POLL_MS;
use crate::errors::DriverError;
use crate::sample::Sample;
use crate::traits::SampleSource;

pub mod hmc5883;
pub mod qmc5883;

pub use hmc5883::Hmc5883;
pub use qmc5883::Qmc5883;

/// One raw x/y/z data block
pub type RawBlock = [u8; RAW_BLOCK_LEN];

/// Capability set shared by all magnetometer models
pub trait Magnetometer {
    /// Error type of the underlying bus
    type BusError: fmt::Debug;

    /// Reset and configure the device for continuous sampling
    ///
    /// Safe to call more than once.
    fn initialize(&mut self) -> Result<(), DriverError<Self::BusError>>;

    /// Check whether a new sample is available
    ///
    /// Returns `WouldBlock` while the device has nothing new.
    fn poll_ready(&mut self) -> nb::Result<(), DriverError<Self::BusError>>;

    /// Read one raw data block
    fn read_raw(&mut self, raw: &mut RawBlock) -> Result<(), DriverError<Self::BusError>>;

    /// Decode a raw block using this model's layout
    fn decode_sample(&self, raw: &[u8]) -> Result<Sample, DriverError<Self::BusError>>;

    /// Model implemented by this driver
    fn variant(&self) -> SensorVariant;
}

/// Supported magnetometer models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SensorVariant {
    /// QST QMC5883L
    Qmc5883,
    /// Honeywell HMC5883L
    Hmc5883,
}

impl SensorVariant {
    /// Human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            SensorVariant::Qmc5883 => "qmc5883",
            SensorVariant::Hmc5883 => "hmc5883",
        }
    }

    /// Factory 7-bit I2C address
    pub const fn default_address(&self) -> u8 {
        match self {
            SensorVariant::Qmc5883 => QMC5883_ADDRESS,
            SensorVariant::Hmc5883 => HMC5883_ADDRESS,
        }
    }

    /// Hysteresis margin suited to the model's default gain
    pub const fn default_hysteresis(&self) -> f32 {
        match self {
            SensorVariant::Qmc5883 => QMC5883_DEFAULT_HYSTERESIS,
            SensorVariant::Hmc5883 => HMC5883_DEFAULT_HYSTERESIS,
        }
    }
}

impl fmt::Display for SensorVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a variant name is not recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownVariant;

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown sensor variant (expected qmc5883 or hmc5883)")
    }
}

impl FromStr for SensorVariant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("qmc5883") {
            Ok(SensorVariant::Qmc5883)
        } else if s.eq_ignore_ascii_case("hmc5883") {
            Ok(SensorVariant::Hmc5883)
        } else {
            Err(UnknownVariant)
        }
    }
}

/// Tagged union over the supported models
pub enum AnyMagnetometer<B, D> {
    /// QMC5883 driver
    Qmc5883(Qmc5883<B, D>),
    /// HMC5883 driver
    Hmc5883(Hmc5883<B, D>),
}

impl<B: RegisterBus, D: DelayNs> AnyMagnetometer<B, D> {
    /// Build the driver for `variant` with default register settings
    pub fn new(variant: SensorVariant, bus: B, delay: D) -> Self {
        match variant {
            SensorVariant::Qmc5883 => AnyMagnetometer::Qmc5883(Qmc5883::new(bus, delay)),
            SensorVariant::Hmc5883 => AnyMagnetometer::Hmc5883(Hmc5883::new(bus, delay)),
        }
    }
}

impl<B: RegisterBus, D: DelayNs> Magnetometer for AnyMagnetometer<B, D> {
    type BusError = B::Error;

    fn initialize(&mut self) -> Result<(), DriverError<Self::BusError>> {
        match self {
            AnyMagnetometer::Qmc5883(m) => m.initialize(),
            AnyMagnetometer::Hmc5883(m) => m.initialize(),
        }
    }

    fn poll_ready(&mut self) -> nb::Result<(), DriverError<Self::BusError>> {
        match self {
            AnyMagnetometer::Qmc5883(m) => m.poll_ready(),
            AnyMagnetometer::Hmc5883(m) => m.poll_ready(),
        }
    }

    fn read_raw(&mut self, raw: &mut RawBlock) -> Result<(), DriverError<Self::BusError>> {
        match self {
            AnyMagnetometer::Qmc5883(m) => m.read_raw(raw),
            AnyMagnetometer::Hmc5883(m) => m.read_raw(raw),
        }
    }

    fn decode_sample(&self, raw: &[u8]) -> Result<Sample, DriverError<Self::BusError>> {
        match self {
            AnyMagnetometer::Qmc5883(m) => m.decode_sample(raw),
            AnyMagnetometer::Hmc5883(m) => m.decode_sample(raw),
        }
    }

    fn variant(&self) -> SensorVariant {
        match self {
            AnyMagnetometer::Qmc5883(m) => m.variant(),
            AnyMagnetometer::Hmc5883(m) => m.variant(),
        }
    }
}

/// Data-ready wait policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReadyPolicy {
    /// Pause between data-ready polls in milliseconds
    pub poll_interval_ms: u32,

    /// Polls before giving up with `NotReady`, `None` waits forever
    pub max_attempts: Option<u32>,
}

impl Default for ReadyPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_READY_POLL_MS,
            max_attempts: None,
        }
    }
}

/// Blocking sample reader
///
/// Waits for data-ready with a sleep between polls, then reads and decodes
/// one block.
pub struct SampleReader<M, D> {
    sensor: M,
    delay: D,
    policy: ReadyPolicy,
}

impl<M: Magnetometer, D: DelayNs> SampleReader<M, D> {
    /// Reader with the default ready policy
    pub fn new(sensor: M, delay: D) -> Self {
        Self {
            sensor,
            delay,
            policy: ReadyPolicy::default(),
        }
    }

    /// Replace the ready policy
    pub fn with_policy(mut self, policy: ReadyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Initialise the wrapped sensor
    pub fn initialize(&mut self) -> Result<(), DriverError<M::BusError>> {
        self.sensor.initialize()
    }

    /// Wrapped driver
    pub fn sensor(&self) -> &M {
        &self.sensor
    }

    /// Block until data-ready, then read and decode one sample
    pub fn read_sample(&mut self) -> Result<Sample, DriverError<M::BusError>> {
        self.wait_ready()?;

        let mut raw: RawBlock = [0; RAW_BLOCK_LEN];
        self.sensor.read_raw(&mut raw)?;
        self.sensor.decode_sample(&raw)
    }

    fn wait_ready(&mut self) -> Result<(), DriverError<M::BusError>> {
        let mut attempts = 0u32;
        loop {
            match self.sensor.poll_ready() {
                Ok(()) => return Ok(()),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) => {
                    attempts = attempts.saturating_add(1);
                    if matches!(self.policy.max_attempts, Some(max) if attempts >= max) {
                        return Err(DriverError::NotReady { attempts });
                    }
                    trace!("Waiting for {} data ready", self.sensor.variant());
                    self.delay.delay_ms(self.policy.poll_interval_ms);
                }
            }
        }
    }
}

impl<M: Magnetometer, D: DelayNs> SampleSource for SampleReader<M, D> {
    type Error = DriverError<M::BusError>;

    fn read_sample(&mut self) -> Result<Sample, Self::Error> {
        SampleReader::read_sample(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sensor that becomes ready after a fixed number of polls
    struct SlowSensor {
        polls_until_ready: u32,
        polls: u32,
    }

    impl Magnetometer for SlowSensor {
        type BusError = ();

        fn initialize(&mut self) -> Result<(), DriverError<()>> {
            Ok(())
        }

        fn poll_ready(&mut self) -> nb::Result<(), DriverError<()>> {
            self.polls += 1;
            if self.polls > self.polls_until_ready {
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        }

        fn read_raw(&mut self, raw: &mut RawBlock) -> Result<(), DriverError<()>> {
            *raw = [3, 0, 4, 0, 0, 0];
            Ok(())
        }

        fn decode_sample(&self, raw: &[u8]) -> Result<Sample, DriverError<()>> {
            qmc5883::LAYOUT.decode(raw)
        }

        fn variant(&self) -> SensorVariant {
            SensorVariant::Qmc5883
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        calls: u32,
        total_ms: u32,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, _ns: u32) {}
        fn delay_ms(&mut self, ms: u32) {
            self.calls += 1;
            self.total_ms += ms;
        }
    }

    #[test]
    fn waits_for_data_ready() {
        let sensor = SlowSensor { polls_until_ready: 3, polls: 0 };
        let mut reader = SampleReader::new(sensor, CountingDelay::default());

        let sample = reader.read_sample().unwrap();

        assert_eq!(sample.magnitude(), 5.0);
        assert_eq!(reader.delay.calls, 3);
        assert_eq!(reader.delay.total_ms, 3 * DEFAULT_READY_POLL_MS);
    }

    #[test]
    fn bounded_wait_gives_up() {
        let sensor = SlowSensor { polls_until_ready: u32::MAX, polls: 0 };
        let mut reader = SampleReader::new(sensor, CountingDelay::default())
            .with_policy(ReadyPolicy { poll_interval_ms: 1, max_attempts: Some(4) });

        assert_eq!(reader.read_sample(), Err(DriverError::NotReady { attempts: 4 }));
        assert_eq!(reader.delay.calls, 3);
    }

    #[test]
    fn variant_names_parse() {
        assert_eq!("qmc5883".parse(), Ok(SensorVariant::Qmc5883));
        assert_eq!("HMC5883".parse(), Ok(SensorVariant::Hmc5883));
        assert_eq!("bmm150".parse::<SensorVariant>(), Err(UnknownVariant));
    }

    #[test]
    fn variant_defaults() {
        assert_eq!(SensorVariant::Qmc5883.default_address(), 0x0D);
        assert_eq!(SensorVariant::Hmc5883.default_address(), 0x1E);
        assert_eq!(SensorVariant::Qmc5883.default_hysteresis(), 2000.0);
    }
}
