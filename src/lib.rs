//! Rolling Z-score anomaly detection for univariate numeric streams.

use std::os::raw::c_double;

pub mod algo;
pub mod config;
pub mod detector;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod shard;
pub mod sink;
pub mod stream;

pub use config::{Baseline, DetectorConfig, Settings, StreamConfig};
pub use detector::{Detection, RollingAnomalyDetector, Verdict};
pub use error::{ConfigurationError, PipelineError, SettingsError, ShardError, SinkError, SourceError};
pub use pipeline::RunSummary;

// --- Detector FFI ---

/// Returns null if the configuration is invalid.
#[unsafe(no_mangle)]
pub extern "C" fn zscore_detector_new(
    window_size: usize,
    threshold: c_double,
) -> *mut RollingAnomalyDetector {
    match RollingAnomalyDetector::new(window_size, threshold) {
        Ok(detector) => Box::into_raw(Box::new(detector)),
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
/// `ptr` must be null or a pointer returned by `zscore_detector_new` that
/// has not been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zscore_detector_free(ptr: *mut RollingAnomalyDetector) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        let _ = Box::from_raw(ptr);
    }
}

/// # Safety
/// `ptr` must be null or a live pointer from `zscore_detector_new`, not used
/// concurrently from another thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zscore_detector_ingest(
    ptr: *mut RollingAnomalyDetector,
    value: c_double,
) -> bool {
    if ptr.is_null() {
        return false;
    }
    let detector = unsafe { &mut *ptr };
    detector.ingest(value)
}

/// # Safety
/// Same contract as `zscore_detector_ingest`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zscore_detector_reset(ptr: *mut RollingAnomalyDetector) {
    if ptr.is_null() {
        return;
    }
    let detector = unsafe { &mut *ptr };
    detector.reset();
}
