//! End-to-end tests of the polling loop
//!
//! Scripted magnitudes go in, persisted totals and reports come out.

mod common;

use magcount_core::{
    AnyMagnetometer, DurableCounter, SampleReader, SensorVariant, StepOutcome, Supervisor,
    SupervisorConfig, SupervisorError, TriggerConfig, TriggerDetector,
};
use tempfile::tempdir;

use common::{BusFault, RecordingDelay, RecordingReporter, RegisterMap, ScriptedSource};

fn run_script(
    magnitudes: &[i16],
    trigger: TriggerConfig,
    config: SupervisorConfig,
) -> (Vec<StepOutcome>, RecordingReporter, RecordingDelay, f64) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("counter");
    let counter = DurableCounter::open(&path, 100.0, 6).unwrap();

    let mut reporter = RecordingReporter::default();
    let mut delay = RecordingDelay::default();
    let mut outcomes = Vec::new();

    {
        let mut supervisor = Supervisor::new(
            ScriptedSource::new(magnitudes),
            TriggerDetector::new(trigger),
            counter,
            &mut reporter,
            &mut delay,
            config,
        );
        supervisor.announce();
        for _ in magnitudes {
            outcomes.push(supervisor.step().unwrap());
        }
    }

    let stored = DurableCounter::open(&path, 0.0, 6).unwrap().value();
    (outcomes, reporter, delay, stored)
}

#[test]
fn test_wide_hysteresis_counts_single_revolution() {
    let (outcomes, reporter, _, stored) = run_script(
        &[100, 3000, 100, 3000],
        TriggerConfig::new(600.0, 2000.0),
        SupervisorConfig::default(),
    );

    assert_eq!(
        outcomes,
        vec![
            StepOutcome::Idle,
            StepOutcome::Triggered { value: 100.01 },
            StepOutcome::Idle,
            StepOutcome::Idle,
        ]
    );
    assert_eq!(reporter.values, vec![100.0, 100.01]);
    assert_eq!(stored, 100.01);
}

#[test]
fn test_narrow_hysteresis_counts_every_revolution() {
    let (_, reporter, _, stored) = run_script(
        &[100, 3000, 100, 3000, 3000, 100, 3000],
        TriggerConfig::new(600.0, 400.0),
        SupervisorConfig::default(),
    );

    assert_eq!(reporter.values, vec![100.0, 100.01, 100.02, 100.03]);
    assert_eq!(stored, 100.03);
}

#[test]
fn test_idle_samples_sleep_one_poll_interval() {
    let config = SupervisorConfig { poll_interval_ms: 250, ..Default::default() };
    let (_, _, delay, _) = run_script(&[100, 100, 3000, 100], TriggerConfig::new(600.0, 400.0), config);

    // No sleep right after a trigger
    assert_eq!(delay.sleeps_ms, vec![250, 250, 250]);
}

#[test]
fn test_startup_waits_for_reporter_grace() {
    let config = SupervisorConfig { startup_grace_ms: 1500, ..Default::default() };
    let (_, reporter, _, _) = run_script(&[], TriggerConfig::default(), config);

    assert_eq!(reporter.grace_requests, vec![1500]);
    // Reported even though the transport never came up
    assert_eq!(reporter.values, vec![100.0]);
}

#[test]
fn test_debug_mode_reports_all_samples() {
    let config = SupervisorConfig { debug_all_values: true, ..Default::default() };
    let (_, reporter, _, _) = run_script(&[5, 6, 7], TriggerConfig::default(), config);

    let xs: Vec<i16> = reporter.samples.iter().map(|s| s.x()).collect();
    assert_eq!(xs, vec![5, 6, 7]);
}

#[test]
fn test_run_stops_on_sensor_failure() {
    let dir = tempdir().unwrap();
    let counter = DurableCounter::open(dir.path().join("counter"), 0.0, 6).unwrap();
    let mut supervisor = Supervisor::new(
        ScriptedSource::new(&[100, 3000]),
        TriggerDetector::new(TriggerConfig::new(600.0, 400.0)),
        counter,
        RecordingReporter::default(),
        RecordingDelay::default(),
        SupervisorConfig::default(),
    );

    assert!(matches!(supervisor.run(), Err(SupervisorError::Sensor(BusFault))));
    assert_eq!(supervisor.counter().value(), 0.01);
}

#[test]
fn test_full_stack_from_register_file() {
    let dir = tempdir().unwrap();
    let counter = DurableCounter::open(dir.path().join("counter"), 0.0, 6).unwrap();

    let mut map = RegisterMap::qmc5883(3000, 0, 0);
    let sensor = AnyMagnetometer::new(SensorVariant::Qmc5883, &mut map, RecordingDelay::default());
    let reader = SampleReader::new(sensor, RecordingDelay::default());

    let mut supervisor = Supervisor::new(
        reader,
        TriggerDetector::new(TriggerConfig::new(600.0, 400.0)),
        counter,
        RecordingReporter::default(),
        RecordingDelay::default(),
        SupervisorConfig::default(),
    );

    // Seed HIGH, stay HIGH
    assert_eq!(supervisor.step().unwrap(), StepOutcome::Idle);
    assert_eq!(supervisor.step().unwrap(), StepOutcome::Idle);
    assert_eq!(supervisor.counter().value(), 0.0);
}
