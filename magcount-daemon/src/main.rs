//! magcountd: count gas meter revolutions with a magnetometer
//!
//! Usage: `magcountd <config.json>`
//!
//! Start-up order:
//! 1. logger (`RUST_LOG`, default `info`)
//! 2. configuration and broker password
//! 3. counter storage
//! 4. sensor on the I2C bus
//! 5. MQTT network task on its own thread
//! 6. start-up report, then the polling loop on the main thread
//!
//! Any failure before or during the loop is logged and ends the process
//! with a non-zero exit status.

mod config;

use std::convert::Infallible;
use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use anyhow::{anyhow, Context, Result};
use linux_embedded_hal::{Delay, I2cdev};
use log::{error, info};
use magcount_connectors::mqtt;
use magcount_connectors::CounterPublisher;
use magcount_core::time::SystemTime;
use magcount_core::{
    AnyMagnetometer, DurableCounter, I2cBus, SampleReader, Supervisor, TriggerDetector,
};

use config::{DaemonConfig, PASSWORD_ENV};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(never) => match never {},
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<Infallible> {
    let path: PathBuf = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: magcountd <config.json>")?;

    let mut config = DaemonConfig::load(&path)?;
    config.resolve_password(env::var(PASSWORD_ENV).ok(), io::stdin().lock())?;
    config.validate()?;
    info!("magcount {} using {}", magcount_core::VERSION, path.display());

    let counter = DurableCounter::with_config(&config.storage.path, &config.storage.counter)
        .with_context(|| format!("counter storage {}", config.storage.path.display()))?;

    let variant = config.sensor.variant;
    let i2c = I2cdev::new(&config.sensor.i2c_bus)
        .with_context(|| format!("opening {}", config.sensor.i2c_bus.display()))?;
    let bus = I2cBus::new(i2c, config.sensor.address(), Delay).with_retry(config.bus_retry);
    let mut reader =
        SampleReader::new(AnyMagnetometer::new(variant, bus, Delay), Delay).with_policy(config.ready);
    reader
        .initialize()
        .map_err(|e| anyhow!("{} at {:#04x}: {}", variant, config.sensor.address(), e))?;
    info!("{} ready at {:#04x}", variant, config.sensor.address());

    let (connector, network) = mqtt::connect(&config.mqtt)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building the network runtime")?;
    thread::Builder::new()
        .name("mqtt".into())
        .spawn(move || runtime.block_on(network.run()))
        .context("starting the network thread")?;

    let mut publisher = CounterPublisher::new(connector, SystemTime, config.mqtt.topic.clone());
    if config.debug_all_values {
        publisher = publisher.with_debug_topics(&config.mqtt.debug_topic_prefix);
        info!("Publishing every sample under {}/", config.mqtt.debug_topic_prefix);
    }

    let mut supervisor = Supervisor::new(
        reader,
        TriggerDetector::new(config.trigger_config()),
        counter,
        publisher,
        Delay,
        config.supervisor_config(),
    );
    Ok(supervisor.run()?)
}
