//! QST QMC5883L driver
//!
//! Control register 1 packs four fields:
//!
//! ```text
//!  7   6   5   4   3   2   1   0
//! ┌───────┬───────┬───────┬───────┐
//! │  OSR  │  RNG  │  ODR  │ MODE  │
//! └───────┴───────┴───────┴───────┘
//! ```
//!
//! Data-ready is signalled by bit 0 of the status register and cleared when
//! the data registers are read.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use super::{Magnetometer, RawBlock, SensorVariant};
use crate::bus::RegisterBus;
use crate::constants::sensors::{
    QMC5883_CHIP_ID, QMC5883_REG_CHIP_ID, QMC5883_REG_CONTROL, QMC5883_REG_DATA,
    QMC5883_REG_SET_RESET, QMC5883_REG_STATUS, QMC5883_STATUS_DOR, QMC5883_STATUS_DRDY,
    QMC5883_STATUS_OVL,
};
use crate::constants::time::QMC5883_RESET_SETTLE_MS;
use crate::errors::DriverError;
use crate::sample::{ByteOrder, Sample, SampleLayout};

/// Raw block layout: little endian, X/Y/Z
pub const LAYOUT: SampleLayout = SampleLayout {
    byte_order: ByteOrder::LittleEndian,
    x_offset: 0,
    y_offset: 2,
    z_offset: 4,
};

/// Output data rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputRate {
    /// 10 Hz
    Hz10 = 0b00,
    /// 50 Hz
    Hz50 = 0b01,
    /// 100 Hz
    Hz100 = 0b10,
    /// 200 Hz
    Hz200 = 0b11,
}

/// Full-scale field range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Range {
    /// ±2 G
    Gauss2 = 0b00,
    /// ±8 G
    Gauss8 = 0b01,
}

/// Over-sampling ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Oversampling {
    /// 512 samples
    Os512 = 0b00,
    /// 256 samples
    Os256 = 0b01,
    /// 128 samples
    Os128 = 0b10,
    /// 64 samples
    Os64 = 0b11,
}

/// Continuous measurement mode
const MODE_CONTINUOUS: u8 = 0b01;

/// Recommended set/reset period value
const SET_RESET_PERIOD: u8 = 0x01;

/// Register settings applied by `initialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QmcConfig {
    /// Output data rate
    pub rate: OutputRate,
    /// Full-scale range
    pub range: Range,
    /// Over-sampling ratio
    pub oversampling: Oversampling,
}

impl Default for QmcConfig {
    fn default() -> Self {
        Self {
            rate: OutputRate::Hz50,
            range: Range::Gauss8,
            oversampling: Oversampling::Os512,
        }
    }
}

impl QmcConfig {
    /// Encode as control register 1 value (continuous mode)
    pub fn control_byte(&self) -> u8 {
        MODE_CONTINUOUS
            | (self.rate as u8) << 2
            | (self.range as u8) << 4
            | (self.oversampling as u8) << 6
    }
}

/// QMC5883L magnetometer
pub struct Qmc5883<B, D> {
    bus: B,
    delay: D,
    config: QmcConfig,
}

impl<B: RegisterBus, D: DelayNs> Qmc5883<B, D> {
    /// Driver with the default register settings
    pub fn new(bus: B, delay: D) -> Self {
        Self {
            bus,
            delay,
            config: QmcConfig::default(),
        }
    }

    /// Replace the register settings applied by `initialize`
    pub fn with_config(mut self, config: QmcConfig) -> Self {
        self.config = config;
        self
    }

    /// Release the bus
    pub fn release(self) -> B {
        self.bus
    }
}

impl<B: RegisterBus, D: DelayNs> Magnetometer for Qmc5883<B, D> {
    type BusError = B::Error;

    fn initialize(&mut self) -> Result<(), DriverError<Self::BusError>> {
        let chip_id = self.bus.read_register(QMC5883_REG_CHIP_ID)?;
        if chip_id != QMC5883_CHIP_ID {
            return Err(DriverError::UnexpectedId {
                expected: [QMC5883_CHIP_ID, 0, 0],
                found: [chip_id, 0, 0],
            });
        }

        self.bus.write_register(QMC5883_REG_SET_RESET, SET_RESET_PERIOD)?;
        self.delay.delay_ms(QMC5883_RESET_SETTLE_MS);

        let control = self.config.control_byte();
        self.bus.write_register(QMC5883_REG_CONTROL, control)?;
        debug!("QMC5883 configured, control register {:#010b}", control);
        Ok(())
    }

    fn poll_ready(&mut self) -> nb::Result<(), DriverError<Self::BusError>> {
        let status = self
            .bus
            .read_register(QMC5883_REG_STATUS)
            .map_err(|e| nb::Error::Other(DriverError::Bus(e)))?;

        if status & QMC5883_STATUS_DRDY == 0 {
            return Err(nb::Error::WouldBlock);
        }
        if status & QMC5883_STATUS_OVL != 0 {
            warn!("QMC5883 field exceeds range {:?}", self.config.range);
        }
        if status & QMC5883_STATUS_DOR != 0 {
            debug!("QMC5883 skipped samples since last read");
        }
        Ok(())
    }

    fn read_raw(&mut self, raw: &mut RawBlock) -> Result<(), DriverError<Self::BusError>> {
        self.bus.read_block(QMC5883_REG_DATA, raw)?;
        Ok(())
    }

    fn decode_sample(&self, raw: &[u8]) -> Result<Sample, DriverError<Self::BusError>> {
        LAYOUT.decode(raw)
    }

    fn variant(&self) -> SensorVariant {
        SensorVariant::Qmc5883
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_control_byte() {
        // Continuous, 50 Hz, 8 Gauss, OSR 512
        assert_eq!(QmcConfig::default().control_byte(), 0x15);
    }

    #[test]
    fn custom_control_byte() {
        let config = QmcConfig {
            rate: OutputRate::Hz200,
            range: Range::Gauss2,
            oversampling: Oversampling::Os64,
        };
        assert_eq!(config.control_byte(), 0b1100_1101);
    }
}
