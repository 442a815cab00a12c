//! Hysteresis trigger detection
//!
//! ## Overview
//!
//! A magnet on the meter dial sweeps past the sensor once per revolution.
//! The field magnitude rises, peaks and falls, with plenty of noise on top.
//! The detector turns that continuous signal into exactly one event per pass.
//!
//! ## Levels and Thresholds
//!
//! Two logical levels, two thresholds derived from one trigger level and one
//! hysteresis margin:
//!
//! ```text
//! magnitude
//!     ▲
//!     │            ┌── HIGH above level + hysteresis
//!     │ ─ ─ ─ ─ ─ ─│─ ─ ─ ─ ─ ─ ─ ─ ─ ─ upper threshold
//!     │            │    dead zone: level unchanged
//!     │ ─ ─ ─ ─ ─ ─│─ ─ ─ ─ ─ ─ ─ ─ ─ ─ lower threshold
//!     │            └── LOW below level - hysteresis
//!     └──────────────────────────────────────► samples
//! ```
//!
//! Only the LOW → HIGH transition (rising edge) reports a trigger. Falling
//! edges, samples that stay HIGH and dead-zone samples never do.
//!
//! ## Start-up
//!
//! The level before the first sample is unknown. The first classified sample
//! seeds the previous level with its own level, so a detector that starts
//! with the magnet already in front of the sensor does not count a phantom
//! revolution. State is in memory only; after a restart the first sample is
//! again a seed.

use log::warn;

use crate::constants::{DEFAULT_TRIGGER_LEVEL, QMC5883_DEFAULT_HYSTERESIS};

/// Logical level of the classified magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Below the lower threshold (or never seen above the upper one)
    Low,
    /// Above the upper threshold
    High,
}

/// Trigger level and hysteresis margin
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct TriggerConfig {
    /// Centre of the hysteresis band
    pub level: f32,
    /// Half-width of the dead zone
    pub hysteresis: f32,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_TRIGGER_LEVEL,
            hysteresis: QMC5883_DEFAULT_HYSTERESIS,
        }
    }
}

impl TriggerConfig {
    /// Trigger at `level` with the given hysteresis band
    pub fn new(level: f32, hysteresis: f32) -> Self {
        Self {
            level,
            hysteresis: hysteresis.abs(),
        }
    }

    /// Magnitude that must be exceeded to reach HIGH
    pub fn upper_threshold(&self) -> f32 {
        self.level + self.hysteresis
    }

    /// Magnitude that must be undercut to return to LOW
    pub fn lower_threshold(&self) -> f32 {
        self.level - self.hysteresis
    }
}

/// Detector state, mutated only by [`TriggerDetector::classify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerState {
    /// Level after the most recent sample
    pub previous_level: Level,
    /// No sample classified yet
    pub just_started: bool,
}

impl Default for TriggerState {
    fn default() -> Self {
        Self {
            previous_level: Level::Low,
            just_started: true,
        }
    }
}

/// Rising-edge classifier with hysteresis
#[derive(Debug, Clone)]
pub struct TriggerDetector {
    config: TriggerConfig,
    state: TriggerState,
}

impl TriggerDetector {
    /// Create a detector in its start-up state
    pub fn new(config: TriggerConfig) -> Self {
        if config.lower_threshold() <= 0.0 {
            warn!(
                "Lower trigger threshold {} is not positive; the detector can never re-arm",
                config.lower_threshold()
            );
        }

        Self {
            config,
            state: TriggerState::default(),
        }
    }

    /// Threshold settings
    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Level of the last sample and start-up flag
    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Current level (LOW until the first sample crosses the upper threshold)
    pub fn level(&self) -> Level {
        self.state.previous_level
    }

    /// Classify one magnitude, returning `true` on a rising edge
    pub fn classify(&mut self, magnitude: f32) -> bool {
        let previous = self.state.previous_level;

        let current = if magnitude > self.config.upper_threshold() {
            Level::High
        } else if magnitude < self.config.lower_threshold() {
            Level::Low
        } else {
            previous
        };

        self.state.previous_level = current;

        if self.state.just_started {
            // Seed only: the level before start-up is unknown
            self.state.just_started = false;
            return false;
        }

        previous == Level::Low && current == Level::High
    }

    /// Forget all history, as if freshly constructed
    pub fn reset(&mut self) {
        self.state = TriggerState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggers(detector: &mut TriggerDetector, magnitudes: &[f32]) -> [bool; 8] {
        let mut out = [false; 8];
        for (slot, m) in out.iter_mut().zip(magnitudes) {
            *slot = detector.classify(*m);
        }
        out
    }

    #[test]
    fn first_sample_never_triggers() {
        let mut detector = TriggerDetector::new(TriggerConfig::new(600.0, 200.0));

        assert!(!detector.classify(10_000.0));
        assert_eq!(detector.level(), Level::High);
        assert!(!detector.state().just_started);
    }

    #[test]
    fn wide_hysteresis_scenario_counts_once() {
        // Lower threshold is -1400: a magnitude can never drop back to LOW
        let mut detector = TriggerDetector::new(TriggerConfig::new(600.0, 2000.0));
        let fired = triggers(&mut detector, &[100.0, 3000.0, 100.0, 3000.0]);

        assert_eq!(&fired[..4], &[false, true, false, false]);
        assert_eq!(detector.level(), Level::High);
    }

    #[test]
    fn rearms_after_dropping_below_lower_threshold() {
        let mut detector = TriggerDetector::new(TriggerConfig::new(600.0, 400.0));
        let fired = triggers(&mut detector, &[100.0, 3000.0, 100.0, 3000.0]);

        assert_eq!(&fired[..4], &[false, true, false, true]);
    }

    #[test]
    fn dead_zone_holds_level() {
        let mut detector = TriggerDetector::new(TriggerConfig::new(600.0, 400.0));
        // LOW seed, chatter inside [200, 1000], rise, chatter, rise again
        let fired = triggers(
            &mut detector,
            &[100.0, 900.0, 300.0, 999.0, 1001.0, 250.0, 950.0, 1200.0],
        );

        assert_eq!(fired, [false, false, false, false, true, false, false, false]);
    }

    #[test]
    fn threshold_values_are_exclusive() {
        let mut detector = TriggerDetector::new(TriggerConfig::new(600.0, 400.0));
        detector.classify(0.0);

        // Exactly on the upper threshold stays LOW
        assert!(!detector.classify(1000.0));
        assert_eq!(detector.level(), Level::Low);
        assert!(detector.classify(1000.5));

        // Exactly on the lower threshold stays HIGH
        assert!(!detector.classify(200.0));
        assert_eq!(detector.level(), Level::High);
    }

    #[test]
    fn reset_restores_seeding() {
        let mut detector = TriggerDetector::new(TriggerConfig::new(600.0, 400.0));
        detector.classify(0.0);
        detector.reset();

        assert!(!detector.classify(5000.0));
        assert!(!detector.classify(5000.0));
    }

    #[test]
    fn negative_hysteresis_is_normalised() {
        let config = TriggerConfig::new(600.0, -400.0);
        assert_eq!(config.upper_threshold(), 1000.0);
        assert_eq!(config.lower_threshold(), 200.0);
    }
}
