//! Behavioural properties of the rolling detector.

use proptest::collection::vec;
use proptest::prelude::*;

use zscore_stream::{Baseline, DetectorConfig, RollingAnomalyDetector, Verdict};

fn baseline_strategy() -> impl Strategy<Value = Baseline> {
    prop_oneof![Just(Baseline::Inclusive), Just(Baseline::Trailing)]
}

fn config_strategy() -> impl Strategy<Value = DetectorConfig> {
    (2usize..40, 0.1f64..6.0, baseline_strategy()).prop_map(|(window_size, threshold, baseline)| {
        DetectorConfig::new(window_size, threshold).with_baseline(baseline)
    })
}

/// Two-pass population statistics, recomputed from scratch.
fn naive_z(window: &[f64], value: f64) -> Option<f64> {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let std_dev = (window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
    (std_dev > 0.0).then(|| (value - mean) / std_dev)
}

/// A small-spread signal around a large offset that jumps to a new level
/// partway through.
fn level_shift_strategy() -> impl Strategy<Value = Vec<f64>> {
    (
        -1.0e7f64..1.0e7,
        -1.0e7f64..1.0e7,
        1.0e-2f64..1.0e2,
        vec(-1.0f64..1.0, 1..300),
        0.0f64..1.0,
    )
        .prop_map(|(offset, jump, spread, noise, at)| {
            let jump_at = (noise.len() as f64 * at) as usize;
            noise
                .iter()
                .enumerate()
                .map(|(i, n)| {
                    let level = if i >= jump_at { offset + jump } else { offset };
                    level + n * spread
                })
                .collect()
        })
}

proptest! {
    #[test]
    fn warm_up_never_flags(
        config in config_strategy(),
        values in vec(-1.0e6f64..1.0e6, 0..80),
    ) {
        let mut detector = RollingAnomalyDetector::with_config(config).unwrap();
        for (i, &v) in values.iter().enumerate().take(config.window_size - 1) {
            prop_assert_eq!(detector.classify(v), Verdict::InsufficientData, "call {}", i);
        }
    }

    #[test]
    fn constant_stream_never_flags(
        config in config_strategy(),
        value in -1.0e9f64..1.0e9,
        extra in 0usize..100,
    ) {
        let mut detector = RollingAnomalyDetector::with_config(config).unwrap();
        for _ in 0..config.window_size + extra {
            prop_assert!(!detector.ingest(value));
        }
        prop_assert_eq!(detector.classify(value), Verdict::Normal { z_score: 0.0 });
    }

    #[test]
    fn identical_input_gives_identical_output(
        config in config_strategy(),
        values in vec(-1.0e3f64..1.0e3, 0..200),
    ) {
        let mut a = RollingAnomalyDetector::with_config(config).unwrap();
        let mut b = RollingAnomalyDetector::with_config(config).unwrap();
        let first: Vec<Verdict> = values.iter().map(|&v| a.classify(v)).collect();
        let second: Vec<Verdict> = values.iter().map(|&v| b.classify(v)).collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn inclusive_z_never_exceeds_sqrt_window(
        window_size in 2usize..64,
        values in vec(-1.0e6f64..1.0e6, 0..200),
    ) {
        let mut detector = RollingAnomalyDetector::new(window_size, 1.0).unwrap();
        let bound = ((window_size - 1) as f64).sqrt() * (1.0 + 1e-9);
        for &v in &values {
            if let Some(z) = detector.classify(v).z_score() {
                prop_assert!(z.abs() <= bound, "z={} bound={}", z, bound);
            }
        }
    }

    #[test]
    fn matches_fifo_recomputation(
        config in config_strategy(),
        values in vec(-1.0e3f64..1.0e3, 0..300),
    ) {
        let mut detector = RollingAnomalyDetector::with_config(config).unwrap();
        let w = config.window_size;

        for (i, &v) in values.iter().enumerate() {
            let verdict = detector.classify(v);

            // The baseline is the last `w` values, taken after (inclusive) or
            // before (trailing) the candidate is appended.
            let end = match config.baseline {
                Baseline::Inclusive => i + 1,
                Baseline::Trailing => i,
            };
            if end < w {
                prop_assert_eq!(verdict, Verdict::InsufficientData);
                continue;
            }

            let window = &values[end - w..end];
            match naive_z(window, v) {
                None => prop_assert_eq!(verdict, Verdict::Normal { z_score: 0.0 }),
                Some(expected) => {
                    let z = verdict.z_score().unwrap();
                    prop_assert!(
                        (z - expected).abs() <= 1e-6 * expected.abs().max(1.0),
                        "step {}: z={} expected={}", i, z, expected
                    );
                    if (expected.abs() - config.threshold).abs() > 1e-6 {
                        prop_assert_eq!(
                            verdict.is_anomaly(),
                            expected.abs() > config.threshold,
                            "step {}", i
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn matches_recomputation_across_level_shifts(
        config in config_strategy(),
        values in level_shift_strategy(),
    ) {
        let mut detector = RollingAnomalyDetector::with_config(config).unwrap();
        let w = config.window_size;

        for (i, &v) in values.iter().enumerate() {
            let verdict = detector.classify(v);
            let end = match config.baseline {
                Baseline::Inclusive => i + 1,
                Baseline::Trailing => i,
            };
            if end < w {
                continue;
            }

            let window = &values[end - w..end];
            let n = w as f64;
            let mean = window.iter().sum::<f64>() / n;
            let std_dev = (window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
            // Both sides round the mean to within a few ulps of the offset.
            let mean_slack = 64.0 * f64::EPSILON * mean.abs().max(v.abs());
            if std_dev <= mean_slack {
                continue;
            }

            let expected = (v - mean) / std_dev;
            let tolerance = 1e-6 * expected.abs().max(1.0) + mean_slack / std_dev;
            let z = verdict.z_score();
            prop_assert!(z.is_some(), "step {}: no score, expected z={}", i, expected);
            let z = z.unwrap();
            prop_assert!(
                (z - expected).abs() <= tolerance,
                "step {}: z={} expected={}", i, z, expected
            );
            if (expected.abs() - config.threshold).abs() > tolerance {
                prop_assert_eq!(
                    verdict.is_anomaly(),
                    expected.abs() > config.threshold,
                    "step {}", i
                );
            }
        }
    }
}
