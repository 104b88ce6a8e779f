//! Keyed multi-stream detection.
//!
//! A detector is not safe to share between producers, so each stream key is
//! pinned to one worker thread by hashing, and each worker owns the detectors
//! for its keys. Per-key ordering is preserved end to end.

use std::collections::HashMap;
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::DetectorConfig;
use crate::detector::{Detection, RollingAnomalyDetector};
use crate::error::{ConfigurationError, ShardError};
use crate::metrics;

#[derive(Debug, Clone)]
pub struct KeyedSample {
    pub key: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyedDetection {
    pub key: String,
    #[serde(flatten)]
    pub detection: Detection,
}

struct ShardWorker {
    id: usize,
    template: RollingAnomalyDetector,
    rx: Receiver<KeyedSample>,
    out: Sender<KeyedDetection>,
    detectors: HashMap<String, RollingAnomalyDetector>,
}

impl ShardWorker {
    fn spawn(
        id: usize,
        template: RollingAnomalyDetector,
        rx: Receiver<KeyedSample>,
        out: Sender<KeyedDetection>,
    ) -> Result<thread::JoinHandle<()>, ShardError> {
        thread::Builder::new()
            .name(format!("zscore-shard-{}", id))
            .spawn(move || {
                let mut worker = ShardWorker {
                    id,
                    template,
                    rx,
                    out,
                    detectors: HashMap::new(),
                };
                worker.run();
                info!(
                    shard = id,
                    streams = worker.detectors.len(),
                    "Shard worker stopped."
                );
            })
            .map_err(ShardError::Spawn)
    }

    fn run(&mut self) {
        info!(shard = self.id, "Shard worker active.");

        while let Ok(sample) = self.rx.recv() {
            let timer = metrics::INGEST_LATENCY.start_timer();

            let template = &self.template;
            let detector = self.detectors.entry(sample.key.clone()).or_insert_with(|| {
                debug!(key = %sample.key, "New stream.");
                template.clone()
            });

            let detection = detector.observe(sample.value);
            timer.observe_duration();
            metrics::record(&detection);

            let keyed = KeyedDetection {
                key: sample.key,
                detection,
            };
            if self.out.send(keyed).is_err() {
                info!(shard = self.id, "Output closed, stopping.");
                break;
            }
        }
    }
}

pub struct ShardPool {
    shard_txs: Vec<Sender<KeyedSample>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl ShardPool {
    /// Starts `shards` workers, each with an input queue of `queue_capacity`
    /// samples. Detections are sent to `output`.
    pub fn spawn(
        config: DetectorConfig,
        shards: usize,
        queue_capacity: usize,
        output: Sender<KeyedDetection>,
    ) -> Result<Self, ShardError> {
        let template = RollingAnomalyDetector::with_config(config)?;
        if shards == 0 || queue_capacity == 0 {
            return Err(ShardError::Config(ConfigurationError::InvalidShards {
                shards,
                queue_capacity,
            }));
        }

        let mut shard_txs = Vec::with_capacity(shards);
        let mut workers = Vec::with_capacity(shards);
        for id in 0..shards {
            let (tx, rx) = bounded::<KeyedSample>(queue_capacity);
            shard_txs.push(tx);
            workers.push(ShardWorker::spawn(id, template.clone(), rx, output.clone())?);
        }
        info!(shards, queue_capacity, "Shard pool started.");

        Ok(Self { shard_txs, workers })
    }

    pub fn shards(&self) -> usize {
        self.shard_txs.len()
    }

    /// Shard that owns `key`.
    pub fn shard_for(&self, key: &str) -> usize {
        let hash = xxhash_rust::xxh3::xxh3_64(key.as_bytes());
        (hash % self.shard_txs.len() as u64) as usize
    }

    /// Queues a sample, blocking while the owning shard is full.
    pub fn submit(&self, key: impl Into<String>, value: f64) -> Result<(), ShardError> {
        let key = key.into();
        let shard = self.shard_for(&key);
        self.shard_txs[shard]
            .send(KeyedSample { key, value })
            .map_err(|_| ShardError::Disconnected)
    }

    /// Queues a sample without blocking. A full queue drops the sample.
    pub fn try_submit(&self, key: impl Into<String>, value: f64) -> Result<(), ShardError> {
        let key = key.into();
        let shard = self.shard_for(&key);
        match self.shard_txs[shard].try_send(KeyedSample { key, value }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                metrics::DROPPED_TOTAL.inc();
                Err(ShardError::Backpressure { shard })
            }
            Err(TrySendError::Disconnected(_)) => Err(ShardError::Disconnected),
        }
    }

    /// Closes the input queues and waits for every worker to drain.
    pub fn shutdown(self) -> Result<(), ShardError> {
        drop(self.shard_txs);

        let mut result = Ok(());
        for (shard, handle) in self.workers.into_iter().enumerate() {
            if handle.join().is_err() && result.is_ok() {
                result = Err(ShardError::WorkerPanicked { shard });
            }
        }
        info!("Shard pool drained.");
        result
    }
}
