//! Sample sources.
//!
//! `SyntheticStream` produces a seasonal signal with gaussian noise and
//! occasional positive spikes; `ValueReader` parses one number per line from
//! any buffered reader.

use std::f64::consts::TAU;
use std::io::BufRead;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::config::StreamConfig;
use crate::error::{ConfigurationError, SourceError};

pub struct SyntheticStream {
    config: StreamConfig,
    noise: Normal<f64>,
    rng: StdRng,
    step: u64,
    injected: u64,
}

impl SyntheticStream {
    pub fn new(config: StreamConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let noise = Normal::new(0.0, config.noise_level).map_err(|e| {
            ConfigurationError::InvalidStream {
                field: "noise_level",
                reason: e.to_string(),
            }
        })?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            config,
            noise,
            rng,
            step: 0,
            injected: 0,
        })
    }

    /// Number of spikes injected so far.
    pub fn injected(&self) -> u64 {
        self.injected
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

impl Iterator for SyntheticStream {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if let Some(length) = self.config.length {
            if self.step >= length {
                return None;
            }
        }

        let phase = TAU * self.step as f64 / self.config.seasonal_period;
        let seasonal = self.config.seasonal_amplitude * phase.sin();
        let mut value = seasonal + self.noise.sample(&mut self.rng);

        if self.config.anomaly_probability > 0.0
            && self.rng.random::<f64>() < self.config.anomaly_probability
        {
            value += self
                .rng
                .random_range(self.config.spike_min..=self.config.spike_max);
            self.injected += 1;
        }

        self.step += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.config.length {
            Some(length) => {
                let remaining = length.saturating_sub(self.step) as usize;
                (remaining, Some(remaining))
            }
            None => (usize::MAX, None),
        }
    }
}

/// Reads one value per line. Blank lines and lines starting with `#` are
/// skipped.
pub struct ValueReader<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> ValueReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for ValueReader<R> {
    type Item = Result<f64, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line += 1,
                Err(e) => return Some(Err(e.into())),
            }

            let text = self.buf.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            return Some(text.parse::<f64>().map_err(|_| SourceError::Parse {
                line: self.line,
                text: text.to_string(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_stream_is_reproducible() {
        let config = StreamConfig {
            length: Some(200),
            seed: Some(42),
            ..Default::default()
        };
        let a: Vec<f64> = SyntheticStream::new(config.clone()).unwrap().collect();
        let b: Vec<f64> = SyntheticStream::new(config).unwrap().collect();
        assert_eq!(a.len(), 200);
        assert_eq!(a, b);
    }

    #[test]
    fn test_noise_free_stream_is_a_sine() {
        let config = StreamConfig {
            length: Some(100),
            noise_level: 0.0,
            anomaly_probability: 0.0,
            seed: Some(1),
            ..Default::default()
        };
        let mut stream = SyntheticStream::new(config).unwrap();
        assert_eq!(stream.size_hint(), (100, Some(100)));

        let values: Vec<f64> = stream.by_ref().collect();
        for (i, v) in values.iter().enumerate() {
            let expected = 5.0 * (TAU * i as f64 / 50.0).sin();
            assert!((v - expected).abs() < 1e-12);
        }
        assert_eq!(stream.injected(), 0);
    }

    #[test]
    fn test_spikes_land_in_configured_range() {
        let config = StreamConfig {
            length: Some(50),
            noise_level: 0.0,
            seasonal_amplitude: 0.0,
            anomaly_probability: 1.0,
            spike_min: 10.0,
            spike_max: 20.0,
            seed: Some(9),
            ..Default::default()
        };
        let mut stream = SyntheticStream::new(config).unwrap();
        let values: Vec<f64> = stream.by_ref().collect();
        assert!(values.iter().all(|v| (10.0..=20.0).contains(v)));
        assert_eq!(stream.injected(), 50);
    }

    #[test]
    fn test_unbounded_stream() {
        let config = StreamConfig {
            length: None,
            seed: Some(5),
            ..Default::default()
        };
        let stream = SyntheticStream::new(config).unwrap();
        assert_eq!(stream.take(5_000).count(), 5_000);
    }

    #[test]
    fn test_invalid_stream_config() {
        let config = StreamConfig {
            seasonal_period: 0.0,
            ..Default::default()
        };
        assert!(SyntheticStream::new(config).is_err());
    }

    #[test]
    fn test_value_reader() {
        let input = "1.5\n\n# comment\n-2\n  3e2  \n";
        let values: Vec<f64> = ValueReader::new(input.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(values, vec![1.5, -2.0, 300.0]);
    }

    #[test]
    fn test_value_reader_reports_line() {
        let input = "1\n2\noops\n4\n";
        let results: Vec<_> = ValueReader::new(input.as_bytes()).collect();
        assert_eq!(results.len(), 4);
        match &results[2] {
            Err(SourceError::Parse { line, text }) => {
                assert_eq!(*line, 3);
                assert_eq!(text, "oops");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
