//! Sensor Register Maps and Trigger Defaults
//!
//! Register addresses and bit fields for the supported magnetometers, taken
//! from the QST QMC5883L and Honeywell HMC5883L datasheets.

// ===== TRIGGER DEFAULTS =====

/// Default trigger level on the field magnitude (raw LSB units).
pub const DEFAULT_TRIGGER_LEVEL: f32 = 600.0;

/// Default hysteresis margin for the QMC5883 at 8 Gauss range.
pub const QMC5883_DEFAULT_HYSTERESIS: f32 = 2000.0;

/// Default hysteresis margin for the HMC5883 at 1.3 Gauss gain.
///
/// Scaled from the QMC5883 default by the ratio of the two sensitivities
/// (1090 vs 3000 LSB/Gauss).
pub const HMC5883_DEFAULT_HYSTERESIS: f32 = 700.0;

/// Length of one raw x/y/z data block in bytes.
pub const RAW_BLOCK_LEN: usize = 6;

// ===== QMC5883 =====

/// Default 7-bit I2C address.
pub const QMC5883_ADDRESS: u8 = 0x0D;

/// First data register (X LSB).
pub const QMC5883_REG_DATA: u8 = 0x00;

/// Status register.
pub const QMC5883_REG_STATUS: u8 = 0x06;

/// Control register 1 (mode, rate, range, oversampling).
pub const QMC5883_REG_CONTROL: u8 = 0x09;

/// Set/reset period register.
pub const QMC5883_REG_SET_RESET: u8 = 0x0B;

/// Chip identification register.
pub const QMC5883_REG_CHIP_ID: u8 = 0x0D;

/// Value of the chip identification register.
pub const QMC5883_CHIP_ID: u8 = 0xFF;

/// Status bit: new data ready.
pub const QMC5883_STATUS_DRDY: u8 = 0b001;

/// Status bit: field exceeded the selected range.
pub const QMC5883_STATUS_OVL: u8 = 0b010;

/// Status bit: data skipped because the previous sample was not read.
pub const QMC5883_STATUS_DOR: u8 = 0b100;

// ===== HMC5883 =====

/// Default 7-bit I2C address.
pub const HMC5883_ADDRESS: u8 = 0x1E;

/// Configuration register A (averaging, output rate, bias).
pub const HMC5883_REG_CONFIG_A: u8 = 0x00;

/// Configuration register B (gain).
pub const HMC5883_REG_CONFIG_B: u8 = 0x01;

/// Mode register.
pub const HMC5883_REG_MODE: u8 = 0x02;

/// First data register (X MSB).
pub const HMC5883_REG_DATA: u8 = 0x03;

/// First identification register.
pub const HMC5883_REG_ID: u8 = 0x0A;

/// Identification registers A..C read "H43".
pub const HMC5883_ID: [u8; 3] = *b"H43";

/// Raw axis value reported on ADC overflow.
pub const HMC5883_OVERFLOW: i16 = -4096;
