//! Honeywell HMC5883L driver
//!
//! In continuous mode the device refreshes its output registers at the
//! configured rate. There is no status poll: a sample is whatever the
//! retried block read returns.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use super::{Magnetometer, RawBlock, SensorVariant};
use crate::bus::RegisterBus;
use crate::constants::sensors::{
    HMC5883_ID, HMC5883_OVERFLOW, HMC5883_REG_CONFIG_A, HMC5883_REG_CONFIG_B, HMC5883_REG_DATA,
    HMC5883_REG_ID, HMC5883_REG_MODE,
};
use crate::constants::time::HMC5883_MODE_SETTLE_MS;
use crate::errors::DriverError;
use crate::sample::{ByteOrder, Sample, SampleLayout};

/// Raw block layout: big endian, X/Z/Y
pub const LAYOUT: SampleLayout = SampleLayout {
    byte_order: ByteOrder::BigEndian,
    x_offset: 0,
    y_offset: 4,
    z_offset: 2,
};

/// Samples averaged per output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Averaging {
    /// No averaging
    One = 0b00,
    /// 2 samples
    Two = 0b01,
    /// 4 samples
    Four = 0b10,
    /// 8 samples
    Eight = 0b11,
}

/// Output data rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputRate {
    /// 0.75 Hz
    Hz0_75 = 0b000,
    /// 1.5 Hz
    Hz1_5 = 0b001,
    /// 3 Hz
    Hz3 = 0b010,
    /// 7.5 Hz
    Hz7_5 = 0b011,
    /// 15 Hz
    Hz15 = 0b100,
    /// 30 Hz
    Hz30 = 0b101,
    /// 75 Hz
    Hz75 = 0b110,
}

/// Gain (full-scale range in Gauss)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Gain {
    /// ±0.88 G
    Gauss0_88 = 0b000,
    /// ±1.3 G
    Gauss1_3 = 0b001,
    /// ±1.9 G
    Gauss1_9 = 0b010,
    /// ±2.5 G
    Gauss2_5 = 0b011,
    /// ±4.0 G
    Gauss4_0 = 0b100,
    /// ±4.7 G
    Gauss4_7 = 0b101,
    /// ±5.6 G
    Gauss5_6 = 0b110,
    /// ±8.1 G
    Gauss8_1 = 0b111,
}

/// Continuous measurement mode
const MODE_CONTINUOUS: u8 = 0x00;

/// Register settings applied by `initialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HmcConfig {
    /// Samples averaged per output
    pub averaging: Averaging,
    /// Output data rate
    pub rate: OutputRate,
    /// Gain
    pub gain: Gain,
}

impl Default for HmcConfig {
    fn default() -> Self {
        Self {
            averaging: Averaging::Eight,
            rate: OutputRate::Hz15,
            gain: Gain::Gauss1_3,
        }
    }
}

impl HmcConfig {
    /// Configuration register A (normal measurement, no bias)
    pub fn config_a(&self) -> u8 {
        (self.averaging as u8) << 5 | (self.rate as u8) << 2
    }

    /// Configuration register B
    pub fn config_b(&self) -> u8 {
        (self.gain as u8) << 5
    }
}

/// HMC5883L magnetometer
pub struct Hmc5883<B, D> {
    bus: B,
    delay: D,
    config: HmcConfig,
}

impl<B: RegisterBus, D: DelayNs> Hmc5883<B, D> {
    /// Driver with the default register settings
    pub fn new(bus: B, delay: D) -> Self {
        Self {
            bus,
            delay,
            config: HmcConfig::default(),
        }
    }

    /// Replace the register settings applied by `initialize`
    pub fn with_config(mut self, config: HmcConfig) -> Self {
        self.config = config;
        self
    }

    /// Release the bus
    pub fn release(self) -> B {
        self.bus
    }
}

impl<B: RegisterBus, D: DelayNs> Magnetometer for Hmc5883<B, D> {
    type BusError = B::Error;

    fn initialize(&mut self) -> Result<(), DriverError<Self::BusError>> {
        let mut id = [0u8; 3];
        self.bus.read_block(HMC5883_REG_ID, &mut id)?;
        if id != HMC5883_ID {
            return Err(DriverError::UnexpectedId {
                expected: HMC5883_ID,
                found: id,
            });
        }

        self.bus.write_register(HMC5883_REG_CONFIG_A, self.config.config_a())?;
        self.bus.write_register(HMC5883_REG_CONFIG_B, self.config.config_b())?;
        self.bus.write_register(HMC5883_REG_MODE, MODE_CONTINUOUS)?;
        self.delay.delay_ms(HMC5883_MODE_SETTLE_MS);

        debug!(
            "HMC5883 configured, CRA {:#04x} CRB {:#04x}",
            self.config.config_a(),
            self.config.config_b()
        );
        Ok(())
    }

    fn poll_ready(&mut self) -> nb::Result<(), DriverError<Self::BusError>> {
        Ok(())
    }

    fn read_raw(&mut self, raw: &mut RawBlock) -> Result<(), DriverError<Self::BusError>> {
        self.bus.read_block(HMC5883_REG_DATA, raw)?;
        Ok(())
    }

    fn decode_sample(&self, raw: &[u8]) -> Result<Sample, DriverError<Self::BusError>> {
        let sample = LAYOUT.decode::<B::Error>(raw)?;
        if [sample.x(), sample.y(), sample.z()].contains(&HMC5883_OVERFLOW) {
            warn!("HMC5883 overflow at gain {:?}", self.config.gain);
        }
        Ok(sample)
    }

    fn variant(&self) -> SensorVariant {
        SensorVariant::Hmc5883
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_register_values() {
        let config = HmcConfig::default();
        assert_eq!(config.config_a(), 0x70);
        assert_eq!(config.config_b(), 0x20);
    }
}
