//! Shared fakes for integration tests
//!
//! - `RegisterMap`: in-memory register file implementing `RegisterBus`
//! - `RecordingDelay`: delay that only remembers what it was asked to sleep
//! - `RecordingReporter`: reporter that keeps every report
//! - `ScriptedSource`: sample source replaying fixed magnitudes

#![allow(dead_code)]

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use magcount_core::{RegisterBus, Reporter, Sample, SampleSource};

/// Bus error raised by the fakes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFault;

/// Register file with a write log and scriptable block-read failures
pub struct RegisterMap {
    pub registers: [u8; 256],
    pub writes: Vec<(u8, u8)>,
    pub failing_block_reads: u32,
    pub block_reads: u32,
}

impl RegisterMap {
    pub fn new() -> Self {
        Self {
            registers: [0; 256],
            writes: Vec::new(),
            failing_block_reads: 0,
            block_reads: 0,
        }
    }

    /// QMC5883 with its chip id and data-ready set
    pub fn qmc5883(x: i16, y: i16, z: i16) -> Self {
        let mut map = Self::new();
        map.registers[0x0D] = 0xFF;
        map.registers[0x06] = 0x01;
        map.load(0x00, &[x.to_le_bytes(), y.to_le_bytes(), z.to_le_bytes()].concat());
        map
    }

    /// HMC5883 with its identification registers
    pub fn hmc5883(x: i16, y: i16, z: i16) -> Self {
        let mut map = Self::new();
        map.load(0x0A, b"H43");
        map.load(0x03, &[x.to_be_bytes(), z.to_be_bytes(), y.to_be_bytes()].concat());
        map
    }

    pub fn load(&mut self, start: u8, bytes: &[u8]) {
        let start = start as usize;
        self.registers[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl RegisterBus for RegisterMap {
    type Error = BusFault;

    fn read_register(&mut self, register: u8) -> Result<u8, Self::Error> {
        Ok(self.registers[register as usize])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Self::Error> {
        self.writes.push((register, value));
        self.registers[register as usize] = value;
        Ok(())
    }

    fn read_block(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.block_reads += 1;
        if self.failing_block_reads > 0 {
            self.failing_block_reads -= 1;
            return Err(BusFault);
        }
        let start = register as usize;
        buf.copy_from_slice(&self.registers[start..start + buf.len()]);
        Ok(())
    }
}

/// Delay that records requested sleeps instead of sleeping
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pub sleeps_ms: Vec<u32>,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.sleeps_ms.push(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.sleeps_ms.push(ms);
    }
}

/// Reporter that keeps everything it is given
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub values: Vec<f64>,
    pub samples: Vec<Sample>,
    pub grace_requests: Vec<u32>,
    pub ready: bool,
}

impl Reporter for RecordingReporter {
    fn report_value(&mut self, value: f64) {
        self.values.push(value);
    }

    fn report_sample(&mut self, sample: &Sample) {
        self.samples.push(*sample);
    }

    fn await_ready(&mut self, grace_ms: u32) -> bool {
        self.grace_requests.push(grace_ms);
        self.ready
    }
}

/// Replays magnitudes as samples on the x axis, then fails
pub struct ScriptedSource {
    magnitudes: VecDeque<i16>,
}

impl ScriptedSource {
    pub fn new(magnitudes: &[i16]) -> Self {
        Self {
            magnitudes: magnitudes.iter().copied().collect(),
        }
    }
}

impl SampleSource for ScriptedSource {
    type Error = BusFault;

    fn read_sample(&mut self) -> Result<Sample, Self::Error> {
        self.magnitudes
            .pop_front()
            .map(|m| Sample::new(m, 0, 0))
            .ok_or(BusFault)
    }
}
