//! Register bus access with retried block reads
//!
//! Sensors sit behind an addressed register interface. [`RegisterBus`] is the
//! contract the drivers need; [`I2cBus`] implements it on top of any
//! `embedded-hal` 1.0 I2C controller.
//!
//! ## Retry Behaviour
//!
//! Single-register reads and writes are attempted once. Block reads, which
//! carry the sample data, are retried after a fixed pause until they succeed:
//!
//! ```text
//! read_block ──► ok ──────────────────────► data
//!      │
//!      └─► bus error ─► warn ─► pause(delay_ms) ─► read_block ...
//! ```
//!
//! With the default [`RetryPolicy`] there is no upper bound. A glitching bus
//! heals on its own; a dead bus hangs the caller forever. Set
//! `max_attempts` to turn that into an error instead.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{error, warn};

use crate::constants::DEFAULT_BUS_RETRY_DELAY_MS;

/// Addressed register access
pub trait RegisterBus {
    /// Error reported by the underlying transport
    type Error: fmt::Debug;

    /// Read one register
    fn read_register(&mut self, register: u8) -> Result<u8, Self::Error>;

    /// Write one register
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Self::Error>;

    /// Read consecutive registers starting at `register` into `buf`
    fn read_block(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Self::Error>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    type Error = B::Error;

    fn read_register(&mut self, register: u8) -> Result<u8, Self::Error> {
        (**self).read_register(register)
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        (**self).write_register(register, value)
    }

    fn read_block(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_block(register, buf)
    }
}

/// Retry policy for block reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryPolicy {
    /// Pause between attempts in milliseconds
    pub delay_ms: u32,

    /// Total attempts before the error is returned, `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_BUS_RETRY_DELAY_MS,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Retry forever with the given pause
    pub fn forever(delay_ms: u32) -> Self {
        Self {
            delay_ms,
            max_attempts: None,
        }
    }

    /// Give up after `attempts` tries
    pub fn bounded(delay_ms: u32, attempts: u32) -> Self {
        Self {
            delay_ms,
            max_attempts: Some(attempts.max(1)),
        }
    }

    fn exhausted(&self, attempts: u32) -> bool {
        matches!(self.max_attempts, Some(max) if attempts >= max)
    }
}

/// Register bus over an I2C controller
///
/// Binds a controller to one 7-bit device address.
pub struct I2cBus<I2C, D> {
    i2c: I2C,
    address: u8,
    delay: D,
    retry: RetryPolicy,
}

impl<I2C: I2c, D: DelayNs> I2cBus<I2C, D> {
    /// Create a bus for the device at `address`
    pub fn new(i2c: I2C, address: u8, delay: D) -> Self {
        Self {
            i2c,
            address,
            delay,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the block-read retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 7-bit device address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Release the controller and delay
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}

impl<I2C: I2c, D: DelayNs> RegisterBus for I2cBus<I2C, D> {
    type Error = I2C::Error;

    fn read_register(&mut self, register: u8) -> Result<u8, Self::Error> {
        let mut value = [0u8; 1];
        self.i2c.write_read(self.address, &[register], &mut value)?;
        Ok(value[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.i2c.write(self.address, &[register, value])
    }

    fn read_block(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        let mut attempts = 0u32;
        loop {
            match self.i2c.write_read(self.address, &[register], buf) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempts = attempts.saturating_add(1);
                    if self.retry.exhausted(attempts) {
                        error!(
                            "Block read at {:#04x}/{:#04x} failed {} times, giving up: {:?}",
                            self.address, register, attempts, e
                        );
                        return Err(e);
                    }
                    warn!(
                        "Block read at {:#04x}/{:#04x} failed (attempt {}): {:?}",
                        self.address, register, attempts, e
                    );
                    self.delay.delay_ms(self.retry.delay_ms);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Nack;

    impl embedded_hal::i2c::Error for Nack {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// Register file behind an I2C front; the first `failures` reads NACK
    struct FlakyI2c {
        registers: [u8; 16],
        pointer: usize,
        failures: u32,
        writes: u32,
    }

    impl FlakyI2c {
        fn new(failures: u32) -> Self {
            let mut registers = [0u8; 16];
            for (i, r) in registers.iter_mut().enumerate() {
                *r = i as u8 * 0x11;
            }
            Self { registers, pointer: 0, failures, writes: 0 }
        }
    }

    impl ErrorType for FlakyI2c {
        type Error = Nack;
    }

    impl I2c for FlakyI2c {
        fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        self.pointer = bytes[0] as usize;
                        for b in &bytes[1..] {
                            self.registers[self.pointer] = *b;
                            self.pointer += 1;
                            self.writes += 1;
                        }
                    }
                    Operation::Read(buf) => {
                        if self.failures > 0 {
                            self.failures -= 1;
                            return Err(Nack);
                        }
                        for b in buf.iter_mut() {
                            *b = self.registers[self.pointer];
                            self.pointer += 1;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        total_ms: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ms += ns as u64 / 1_000_000;
        }
        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += ms as u64;
        }
    }

    #[test]
    fn block_read_retries_until_success() {
        let mut bus = I2cBus::new(FlakyI2c::new(3), 0x0D, CountingDelay::default());

        let mut buf = [0u8; 3];
        bus.read_block(0x02, &mut buf).unwrap();

        assert_eq!(buf, [0x22, 0x33, 0x44]);
        let (_, delay) = bus.release();
        assert_eq!(delay.total_ms, 3 * DEFAULT_BUS_RETRY_DELAY_MS as u64);
    }

    #[test]
    fn bounded_retry_returns_last_error() {
        let mut bus = I2cBus::new(FlakyI2c::new(10), 0x0D, CountingDelay::default())
            .with_retry(RetryPolicy::bounded(5, 4));

        let mut buf = [0u8; 2];
        assert_eq!(bus.read_block(0x00, &mut buf), Err(Nack));

        // Pauses only between attempts
        let (_, delay) = bus.release();
        assert_eq!(delay.total_ms, 3 * 5);
    }

    #[test]
    fn single_register_access() {
        let mut bus = I2cBus::new(FlakyI2c::new(0), 0x1E, CountingDelay::default());

        bus.write_register(0x09, 0x15).unwrap();
        assert_eq!(bus.read_register(0x09), Ok(0x15));
        assert_eq!(bus.address(), 0x1E);
    }

    #[test]
    fn single_register_errors_are_not_retried() {
        let mut bus = I2cBus::new(FlakyI2c::new(1), 0x0D, CountingDelay::default());

        assert_eq!(bus.read_register(0x00), Err(Nack));
        assert_eq!(bus.read_register(0x01), Ok(0x11));
    }
}
