//! Error types.
//!
//! Detection itself never fails: every degenerate numeric situation is a
//! [`Verdict`](crate::detector::Verdict). Errors only arise while building a
//! detector, loading settings, reading samples, writing results or talking
//! to shard workers.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid construction parameters. No partial detector is ever produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("window_size must be at least 2, got {window_size}")]
    WindowTooSmall { window_size: usize },

    #[error("threshold must be a finite positive number, got {threshold}")]
    InvalidThreshold { threshold: f64 },

    #[error("invalid stream setting {field}: {reason}")]
    InvalidStream { field: &'static str, reason: String },

    #[error("shard pool needs at least one shard and a non-zero queue (shards={shards}, queue_capacity={queue_capacity})")]
    InvalidShards { shards: usize, queue_capacity: usize },
}

/// Failure to load a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigurationError),
}

/// Failure while pulling samples from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read samples: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: not a number: {text:?}")]
    Parse { line: usize, text: String },
}

/// Failure while handing a detection to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink write failed: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode detection: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure while running a source through the detector.
#[derive(Debug, Error)]
pub enum PipelineError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Source(E),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Failure talking to a [`ShardPool`](crate::shard::ShardPool).
#[derive(Debug, Error)]
pub enum ShardError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error("shard {shard} queue is full")]
    Backpressure { shard: usize },

    #[error("shard workers have stopped")]
    Disconnected,

    #[error("failed to spawn shard worker: {0}")]
    Spawn(#[source] io::Error),

    #[error("shard {shard} worker panicked")]
    WorkerPanicked { shard: usize },
}
