//! Rolling Z-score anomaly detector.
//!
//! Each ingested value is classified against the mean and population
//! standard deviation of the most recent `window_size` samples. State is a
//! single [`RollingWindow`]; every call is amortised O(1) and memory is
//! bounded by the window.

use serde::Serialize;
use tracing::debug;

use crate::algo::rolling::RollingWindow;
use crate::config::{Baseline, DetectorConfig};
use crate::error::ConfigurationError;

/// Outcome of classifying one value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The window is not full yet, or the value or a retained sample is not
    /// a finite number.
    InsufficientData,
    /// `|z| <= threshold`. A zero-variance window reports `z_score: 0.0`.
    Normal { z_score: f64 },
    /// `|z| > threshold`.
    Anomalous { z_score: f64 },
}

impl Verdict {
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Verdict::Anomalous { .. })
    }

    pub fn z_score(&self) -> Option<f64> {
        match *self {
            Verdict::InsufficientData => None,
            Verdict::Normal { z_score } | Verdict::Anomalous { z_score } => Some(z_score),
        }
    }
}

/// What a sink receives for every sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    /// Zero-based position of the sample in the stream.
    pub index: u64,
    pub value: f64,
    pub is_anomaly: bool,
    #[serde(flatten)]
    pub verdict: Verdict,
    /// Baseline statistics the value was scored against.
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RollingAnomalyDetector {
    config: DetectorConfig,
    window: RollingWindow,
    ingested: u64,
}

impl RollingAnomalyDetector {
    /// Inclusive-baseline detector. Fails if `window_size < 2` or
    /// `threshold <= 0`.
    pub fn new(window_size: usize, threshold: f64) -> Result<Self, ConfigurationError> {
        Self::with_config(DetectorConfig::new(window_size, threshold))
    }

    pub fn with_config(config: DetectorConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        debug!(
            window_size = config.window_size,
            threshold = config.threshold,
            baseline = ?config.baseline,
            "Detector configured."
        );
        Ok(Self {
            window: RollingWindow::new(config.window_size),
            config,
            ingested: 0,
        })
    }

    /// Ingests `value` and reports whether it is anomalous.
    pub fn ingest(&mut self, value: f64) -> bool {
        self.classify(value).is_anomaly()
    }

    /// Ingests `value` and returns the three-state verdict.
    pub fn classify(&mut self, value: f64) -> Verdict {
        self.observe(value).verdict
    }

    /// Ingests `value` and returns the full detection record.
    pub fn observe(&mut self, value: f64) -> Detection {
        let index = self.ingested;
        self.ingested += 1;

        if !value.is_finite() {
            debug!(index, value, "Non-finite sample; verdicts suspended.");
        }

        let (verdict, mean, std_dev) = match self.config.baseline {
            Baseline::Inclusive => {
                self.window.push(value);
                self.score(value)
            }
            Baseline::Trailing => {
                let scored = self.score(value);
                self.window.push(value);
                scored
            }
        };

        Detection {
            index,
            value,
            is_anomaly: verdict.is_anomaly(),
            verdict,
            mean,
            std_dev,
        }
    }

    fn score(&self, value: f64) -> (Verdict, Option<f64>, Option<f64>) {
        if !self.window.is_full() || !value.is_finite() {
            return (Verdict::InsufficientData, None, None);
        }
        let (Some(mean), Some(std_dev)) = (self.window.mean(), self.window.std_dev()) else {
            return (Verdict::InsufficientData, None, None);
        };

        if std_dev == 0.0 {
            return (Verdict::Normal { z_score: 0.0 }, Some(mean), Some(std_dev));
        }

        let z_score = (value - mean) / std_dev;
        let verdict = if z_score.abs() > self.config.threshold {
            Verdict::Anomalous { z_score }
        } else {
            Verdict::Normal { z_score }
        };
        (verdict, Some(mean), Some(std_dev))
    }

    /// Drops all retained samples; configuration and the sample counter are
    /// kept.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn window_size(&self) -> usize {
        self.config.window_size
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    pub fn baseline(&self) -> Baseline {
        self.config.baseline
    }

    /// Number of samples currently retained.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// True once the window holds `window_size` samples.
    pub fn is_warm(&self) -> bool {
        self.window.is_full()
    }

    /// Total calls to `ingest`/`classify`/`observe`.
    pub fn ingested(&self) -> u64 {
        self.ingested
    }
}
