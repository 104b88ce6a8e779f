//! Detection sinks.

use std::io::Write;

use tracing::{trace, warn};

use crate::detector::Detection;
use crate::error::SinkError;

pub trait Sink {
    fn record(&mut self, detection: &Detection) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn record(&mut self, detection: &Detection) -> Result<(), SinkError> {
        (**self).record(detection)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    anomalies_only: bool,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            anomalies_only: false,
        }
    }

    pub fn anomalies_only(mut self, enabled: bool) -> Self {
        self.anomalies_only = enabled;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn record(&mut self, detection: &Detection) -> Result<(), SinkError> {
        if self.anomalies_only && !detection.is_anomaly {
            return Ok(());
        }
        serde_json::to_writer(&mut self.writer, detection)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Emits anomalies as `warn` events and everything else at `trace`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn record(&mut self, detection: &Detection) -> Result<(), SinkError> {
        if detection.is_anomaly {
            warn!(
                index = detection.index,
                value = detection.value,
                z_score = detection.verdict.z_score(),
                "ANOMALY"
            );
        } else {
            trace!(index = detection.index, value = detection.value, "sample");
        }
        Ok(())
    }
}

/// Keeps every detection in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub detections: Vec<Detection>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter().filter(|d| d.is_anomaly)
    }
}

impl Sink for MemorySink {
    fn record(&mut self, detection: &Detection) -> Result<(), SinkError> {
        self.detections.push(*detection);
        Ok(())
    }
}
