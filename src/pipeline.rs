//! Drives a sample source through a detector into a sink.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::detector::{RollingAnomalyDetector, Verdict};
use crate::error::PipelineError;
use crate::metrics;
use crate::sink::Sink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub samples: u64,
    pub anomalies: u64,
    /// Finite samples that got no score: the window was still filling or
    /// held a non-finite value.
    pub warmup: u64,
    /// Non-finite samples.
    pub rejected: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.samples as f64 / secs
        } else {
            0.0
        }
    }
}

/// Runs an infallible source to exhaustion.
pub fn run<I, S>(
    detector: &mut RollingAnomalyDetector,
    values: I,
    sink: &mut S,
) -> Result<RunSummary, PipelineError<Infallible>>
where
    I: IntoIterator<Item = f64>,
    S: Sink + ?Sized,
{
    try_run(detector, values.into_iter().map(Ok), sink)
}

/// Runs a fallible source, stopping at the first source or sink error.
pub fn try_run<I, E, S>(
    detector: &mut RollingAnomalyDetector,
    values: I,
    sink: &mut S,
) -> Result<RunSummary, PipelineError<E>>
where
    I: IntoIterator<Item = Result<f64, E>>,
    E: std::error::Error + 'static,
    S: Sink + ?Sized,
{
    info!(
        window_size = detector.window_size(),
        threshold = detector.threshold(),
        "Pipeline started."
    );

    let start = Instant::now();
    let mut summary = RunSummary::default();

    for value in values {
        let value = value.map_err(PipelineError::Source)?;

        let timer = metrics::INGEST_LATENCY.start_timer();
        let detection = detector.observe(value);
        timer.observe_duration();
        metrics::record(&detection);

        summary.samples += 1;
        if detection.is_anomaly {
            summary.anomalies += 1;
        }
        if !value.is_finite() {
            summary.rejected += 1;
        } else if detection.verdict == Verdict::InsufficientData {
            summary.warmup += 1;
        }

        sink.record(&detection)?;
    }

    sink.flush()?;
    summary.elapsed = start.elapsed();

    info!(
        samples = summary.samples,
        anomalies = summary.anomalies,
        rejected = summary.rejected,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Pipeline finished."
    );
    Ok(summary)
}
