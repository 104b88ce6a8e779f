//! Process-wide detection metrics in the default prometheus registry.

use once_cell::sync::Lazy;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, TextEncoder};

use crate::detector::Detection;

pub static SAMPLES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    let c = Counter::new("zscore_samples_total", "Total samples ingested").expect("metric");
    prometheus::register(Box::new(c.clone())).expect("register zscore_samples_total");
    c
});

pub static ANOMALIES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    let c = Counter::new("zscore_anomalies_total", "Total anomalies flagged").expect("metric");
    prometheus::register(Box::new(c.clone())).expect("register zscore_anomalies_total");
    c
});

pub static REJECTED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    let c = Counter::new("zscore_rejected_total", "Non-finite samples ingested").expect("metric");
    prometheus::register(Box::new(c.clone())).expect("register zscore_rejected_total");
    c
});

pub static DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    let c = Counter::new(
        "zscore_dropped_total",
        "Samples dropped due to shard backpressure",
    )
    .expect("metric");
    prometheus::register(Box::new(c.clone())).expect("register zscore_dropped_total");
    c
});

pub static INGEST_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    let h = Histogram::with_opts(
        HistogramOpts::new(
            "zscore_ingest_duration_seconds",
            "Time spent classifying one sample",
        )
        .buckets(prometheus::exponential_buckets(1e-8, 4.0, 10).expect("buckets")),
    )
    .expect("metric");
    prometheus::register(Box::new(h.clone())).expect("register zscore_ingest_duration_seconds");
    h
});

/// Counts one classified sample.
pub fn record(detection: &Detection) {
    SAMPLES_TOTAL.inc();
    if detection.is_anomaly {
        ANOMALIES_TOTAL.inc();
    }
    if !detection.value.is_finite() {
        REJECTED_TOTAL.inc();
    }
}

/// Text exposition of everything in the default registry.
pub fn render() -> String {
    // Touch the lazies so they show up even before the first sample.
    let _ = &*SAMPLES_TOTAL;
    let _ = &*ANOMALIES_TOTAL;
    let _ = &*REJECTED_TOTAL;
    let _ = &*DROPPED_TOTAL;
    let _ = &*INGEST_LATENCY;

    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics.");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
