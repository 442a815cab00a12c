//! Polling loop
//!
//! Drives the pipeline forever:
//!
//! ```text
//! loop {
//!     sample    = source.read_sample()        // blocks on data-ready
//!     debug?    → reporter.report_sample()
//!     triggered = detector.classify(|B|)
//!     if triggered { counter.increment(); reporter.report_value() }
//!     else         { sleep(poll_interval) }
//! }
//! ```
//!
//! There is no cancellation; the loop ends only when the process does, or
//! when a sensor or persistence error makes continuing unsafe.

use core::convert::Infallible;
use core::fmt;

use embedded_hal::delay::DelayNs;
use log::{debug, info};

use crate::constants::{DEFAULT_INCREMENT, DEFAULT_POLL_INTERVAL_MS, DEFAULT_STARTUP_GRACE_MS};
use crate::counter::DurableCounter;
use crate::detector::TriggerDetector;
use crate::errors::CounterError;
use crate::sample::Sample;
use crate::traits::{Reporter, SampleSource};

/// Polling loop settings
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    /// Counter increment per trigger
    pub increment: f64,
    /// Sleep after a sample that did not trigger (milliseconds)
    pub poll_interval_ms: u32,
    /// Forward every sample to the reporter
    pub debug_all_values: bool,
    /// Wait for the reporter before the start-up report (milliseconds)
    pub startup_grace_ms: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            increment: DEFAULT_INCREMENT,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            debug_all_values: false,
            startup_grace_ms: DEFAULT_STARTUP_GRACE_MS,
        }
    }
}

/// Fatal polling loop errors
#[derive(Debug)]
pub enum SupervisorError<E> {
    /// Sensor could not deliver a sample
    Sensor(E),
    /// Counter could not be persisted
    Counter(CounterError),
}

impl<E: fmt::Display> fmt::Display for SupervisorError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "Sensor failure: {}", e),
            Self::Counter(e) => write!(f, "Counter failure: {}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for SupervisorError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sensor(_) => None,
            Self::Counter(e) => Some(e),
        }
    }
}

/// Result of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// Rising edge detected; counter advanced to `value`
    Triggered {
        /// Persisted total after the increment
        value: f64,
    },
    /// No trigger; the loop slept one poll interval
    Idle,
}

/// Sensor → detector → counter → reporter pipeline
pub struct Supervisor<S, R, D> {
    source: S,
    detector: TriggerDetector,
    counter: DurableCounter,
    reporter: R,
    delay: D,
    config: SupervisorConfig,
}

impl<S, R, D> Supervisor<S, R, D>
where
    S: SampleSource,
    R: Reporter,
    D: DelayNs,
{
    /// Assemble the loop; nothing runs until [`Supervisor::run`] or [`Supervisor::step`]
    pub fn new(
        source: S,
        detector: TriggerDetector,
        counter: DurableCounter,
        reporter: R,
        delay: D,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            source,
            detector,
            counter,
            reporter,
            delay,
            config,
        }
    }

    /// Durable counter
    pub fn counter(&self) -> &DurableCounter {
        &self.counter
    }

    /// Trigger detector
    pub fn detector(&self) -> &TriggerDetector {
        &self.detector
    }

    /// Reporter receiving values and samples
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Publish the loaded total once the reporter is up (or the grace expired)
    pub fn announce(&mut self) {
        if !self.reporter.await_ready(self.config.startup_grace_ms) {
            info!("Reporter not ready after {} ms", self.config.startup_grace_ms);
        }
        self.reporter.report_value(self.counter.value());
    }

    /// Run one iteration of the loop
    pub fn step(&mut self) -> Result<StepOutcome, SupervisorError<S::Error>> {
        let sample = self.source.read_sample().map_err(SupervisorError::Sensor)?;
        log_sample(&sample);

        if self.config.debug_all_values {
            self.reporter.report_sample(&sample);
        }

        if self.detector.classify(sample.magnitude()) {
            let value = self
                .counter
                .increment(self.config.increment)
                .map_err(SupervisorError::Counter)?;
            info!("Trigger at |B| = {:.1}, counter now {}", sample.magnitude(), value);
            self.reporter.report_value(value);
            Ok(StepOutcome::Triggered { value })
        } else {
            self.delay.delay_ms(self.config.poll_interval_ms);
            Ok(StepOutcome::Idle)
        }
    }

    /// Announce, then loop until a fatal error
    pub fn run(&mut self) -> Result<Infallible, SupervisorError<S::Error>> {
        self.announce();
        loop {
            self.step()?;
        }
    }
}

fn log_sample(sample: &Sample) {
    debug!(
        "x={} y={} z={} |B|={:.1}",
        sample.x(),
        sample.y(),
        sample.z(),
        sample.magnitude()
    );
}
