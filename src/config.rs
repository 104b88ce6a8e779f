//! Explicit configuration for the detector and the synthetic source.
//!
//! Every field has a default so partial JSON documents are accepted;
//! validation happens once, before anything is constructed.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, SettingsError};

pub const DEFAULT_WINDOW_SIZE: usize = 50;
pub const DEFAULT_THRESHOLD: f64 = 3.0;

/// Which values form the baseline a candidate is scored against.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Baseline {
    /// The candidate is appended first and takes part in its own mean and
    /// standard deviation. The largest reachable |z| is sqrt(window_size - 1).
    #[default]
    Inclusive,
    /// The candidate is scored against the preceding `window_size` values and
    /// appended afterwards.
    Trailing,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub window_size: usize,
    pub threshold: f64,
    pub baseline: Baseline,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            threshold: DEFAULT_THRESHOLD,
            baseline: Baseline::Inclusive,
        }
    }
}

impl DetectorConfig {
    pub fn new(window_size: usize, threshold: f64) -> Self {
        Self {
            window_size,
            threshold,
            baseline: Baseline::Inclusive,
        }
    }

    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.window_size < 2 {
            return Err(ConfigurationError::WindowTooSmall {
                window_size: self.window_size,
            });
        }
        // Also rejects NaN.
        if !(self.threshold > 0.0 && self.threshold.is_finite()) {
            return Err(ConfigurationError::InvalidThreshold {
                threshold: self.threshold,
            });
        }
        Ok(())
    }
}

/// Shape of the synthetic stream: a sinusoid with gaussian noise and
/// occasional positive spikes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Number of samples; `None` runs forever.
    pub length: Option<u64>,
    pub noise_level: f64,
    pub seasonal_amplitude: f64,
    pub seasonal_period: f64,
    pub anomaly_probability: f64,
    pub spike_min: f64,
    pub spike_max: f64,
    pub seed: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            length: Some(1000),
            noise_level: 0.5,
            seasonal_amplitude: 5.0,
            seasonal_period: 50.0,
            anomaly_probability: 0.02,
            spike_min: 10.0,
            spike_max: 20.0,
            seed: None,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |field, reason: &str| {
            Err(ConfigurationError::InvalidStream {
                field,
                reason: reason.to_string(),
            })
        };

        if !(self.noise_level >= 0.0 && self.noise_level.is_finite()) {
            return invalid("noise_level", "must be a finite non-negative number");
        }
        if !self.seasonal_amplitude.is_finite() {
            return invalid("seasonal_amplitude", "must be finite");
        }
        if !(self.seasonal_period > 0.0 && self.seasonal_period.is_finite()) {
            return invalid("seasonal_period", "must be a finite positive number");
        }
        if !(0.0..=1.0).contains(&self.anomaly_probability) {
            return invalid("anomaly_probability", "must lie in [0, 1]");
        }
        if !(self.spike_min.is_finite() && self.spike_max.is_finite()) {
            return invalid("spike_min", "spike bounds must be finite");
        }
        if self.spike_min > self.spike_max {
            return invalid("spike_max", "must not be below spike_min");
        }
        Ok(())
    }
}

/// Top-level settings document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub detector: DetectorConfig,
    pub stream: StreamConfig,
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.detector.validate()?;
        self.stream.validate()
    }
}
