//! Durable event counter
//!
//! ## Overview
//!
//! The counter is the authoritative cumulative total. It lives in one small
//! text file holding a single decimal number, read once at start-up and
//! rewritten after every increment.
//!
//! ## Write Protocol
//!
//! ```text
//! increment(step)
//!   ├── next = round(value + step)
//!   ├── write next → .<name>.tmp      (truncate, write, fsync)
//!   ├── rename .<name>.tmp → <name>   (atomic replace)
//!   └── value = next                  (only after the rename succeeded)
//! ```
//!
//! A reader sees either the previous or the new total, never a partial write.
//! A crash may lose the latest increment but never corrupts the stored value.
//! If any step fails the in-memory value keeps the last persisted total and
//! the error is returned; callers treat it as fatal.
//!
//! ## Precision
//!
//! Values are rounded to a fixed number of decimal places after each
//! increment. Without that, 0.01 steps drift (`2650.36 + 0.01` is
//! `2650.3700000000003` in binary floating point).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::constants::{
    DEFAULT_COUNTER_DECIMALS, DEFAULT_INCREMENT, DEFAULT_INITIAL_VALUE, MAX_COUNTER_DECIMALS,
};
use crate::errors::CounterError;

/// Counter persistence settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CounterConfig {
    /// Value written when the storage file does not exist yet
    pub initial_value: f64,
    /// Amount added per trigger
    pub increment: f64,
    /// Decimal places kept in memory and on disk
    pub decimals: u32,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            initial_value: DEFAULT_INITIAL_VALUE,
            increment: DEFAULT_INCREMENT,
            decimals: DEFAULT_COUNTER_DECIMALS,
        }
    }
}

/// Persisted floating counter
#[derive(Debug)]
pub struct DurableCounter {
    path: PathBuf,
    value: f64,
    decimals: u32,
}

impl DurableCounter {
    /// Open the counter at `path`, creating it with `initial_value` if absent
    ///
    /// Missing parent directories are created. `decimals` above
    /// [`MAX_COUNTER_DECIMALS`] is rejected.
    pub fn open(
        path: impl Into<PathBuf>,
        initial_value: f64,
        decimals: u32,
    ) -> Result<Self, CounterError> {
        check_decimals(decimals)?;
        let path = path.into();
        let initial_value = round_to(check_value(initial_value)?, decimals);

        let mut counter = Self {
            path,
            value: initial_value,
            decimals,
        };

        if counter.path.exists() {
            counter.value = counter.load()?;
            info!("Loaded counter {} from {}", counter.value, counter.path.display());
        } else {
            if let Some(parent) = counter.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            counter.store(initial_value)?;
            info!(
                "Created counter {} with initial value {}",
                counter.path.display(),
                initial_value
            );
        }

        Ok(counter)
    }

    /// Open using the settings in `config`
    ///
    /// Also rejects an increment that the configured precision would round
    /// away.
    pub fn with_config(path: impl Into<PathBuf>, config: &CounterConfig) -> Result<Self, CounterError> {
        check_decimals(config.decimals)?;
        check_increment(config.increment, config.decimals)?;
        Self::open(path, config.initial_value, config.decimals)
    }

    /// Read the stored value
    ///
    /// Does not change the in-memory value.
    pub fn load(&self) -> Result<f64, CounterError> {
        read_value(&self.path)
    }

    /// Current in-memory value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Storage file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add `step` and persist the new total before returning it
    ///
    /// A `step` that is lost to rounding fails without touching storage.
    pub fn increment(&mut self, step: f64) -> Result<f64, CounterError> {
        check_increment(step, self.decimals)?;
        let next = round_to(check_value(self.value + step)?, self.decimals);
        self.store(next)?;
        self.value = next;
        debug!("Counter now {}", next);
        Ok(next)
    }

    fn store(&self, value: f64) -> Result<(), CounterError> {
        let tmp = self.temp_path();

        let mut file = fs::File::create(&tmp)?;
        file.write_all(value.to_string().as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "counter".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

/// Parse the single decimal number stored at `path`
pub fn read_value(path: &Path) -> Result<f64, CounterError> {
    let content = fs::read_to_string(path)?;
    let trimmed = content.trim();
    let value = trimmed.parse::<f64>().map_err(|_| CounterError::Parse {
        content: trimmed.to_string(),
    })?;
    check_value(value)
}

fn check_value(value: f64) -> Result<f64, CounterError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(CounterError::InvalidValue { value })
    }
}

/// Check that `decimals` is within the supported precision
pub fn check_decimals(decimals: u32) -> Result<(), CounterError> {
    if decimals > MAX_COUNTER_DECIMALS {
        return Err(CounterError::InvalidPrecision {
            decimals,
            max: MAX_COUNTER_DECIMALS,
        });
    }
    Ok(())
}

/// Check that `increment` survives rounding to `decimals` places
pub fn check_increment(increment: f64, decimals: u32) -> Result<(), CounterError> {
    if !increment.is_finite() || increment <= 0.0 || round_to(increment, decimals) != increment {
        return Err(CounterError::UnrepresentableIncrement {
            increment,
            decimals,
        });
    }
    Ok(())
}

/// Round to `decimals` places, the nearest representable double
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_removes_float_drift() {
        assert_eq!(2650.36 + 0.01, 2650.3700000000003);
        assert_eq!(round_to(2650.36 + 0.01, 6), 2650.37);
        assert_eq!(round_to(2650.37, 6).to_string(), "2650.37");
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(check_value(-0.5), Err(CounterError::InvalidValue { .. })));
        assert!(matches!(check_value(f64::NAN), Err(CounterError::InvalidValue { .. })));
        assert!(check_value(0.0).is_ok());
    }

    #[test]
    fn precision_guards() {
        assert!(check_decimals(MAX_COUNTER_DECIMALS).is_ok());
        assert!(matches!(
            check_decimals(400),
            Err(CounterError::InvalidPrecision { decimals: 400, .. })
        ));

        assert!(check_increment(0.01, 6).is_ok());
        assert!(check_increment(0.01, 2).is_ok());
        assert!(check_increment(1.0, 0).is_ok());
        assert!(matches!(
            check_increment(0.01, 1),
            Err(CounterError::UnrepresentableIncrement { .. })
        ));
        assert!(check_increment(0.0, 6).is_err());
    }

    #[test]
    fn temp_file_is_a_hidden_sibling() {
        let counter = DurableCounter {
            path: PathBuf::from("/var/lib/magcount/gas.value"),
            value: 0.0,
            decimals: 6,
        };
        assert_eq!(
            counter.temp_path(),
            PathBuf::from("/var/lib/magcount/.gas.value.tmp")
        );
    }
}
