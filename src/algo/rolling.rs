//! Fixed-capacity sliding window with O(1) mean and variance.
//!
//! Sums are kept over deviations from a reference `shift` (assumed-mean
//! form) so that large offsets do not swamp small spreads. The sums are
//! rebuilt from the retained values, and the shift moved to their mean,
//! every `capacity` evictions and whenever an update has cancelled away most
//! of their magnitude (a level shift away from `shift`, or a large value
//! leaving the window).
//!
//! Non-finite values occupy a slot like any other but stay out of the sums.
//! While one is retained the window has no mean or variance.

use std::collections::VecDeque;

/// Variances at or below `(VARIANCE_ULPS * EPSILON * |mean|)^2` are treated
/// as zero: at that magnitude they are rounding noise.
pub const VARIANCE_ULPS: f64 = 4.0;

/// Rebuild once the incremental result keeps less than this fraction of the
/// magnitude it was computed from.
const CANCELLATION_RATIO: f64 = 1.0e-6;

#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
    shift: f64,
    /// Sum of (x - shift) over finite x
    sum: f64,
    /// Sum of (x - shift)^2 over finite x
    sum_sq: f64,
    /// Largest `sum_sq` since the last rebuild.
    peak_sq: f64,
    non_finite: usize,
    /// Length of the trailing run of bit-identical values.
    run_len: usize,
    evictions: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            shift: 0.0,
            sum: 0.0,
            sum_sq: 0.0,
            peak_sq: 0.0,
            non_finite: 0,
            run_len: 0,
            evictions: 0,
        }
    }

    /// Appends `value`, returning the evicted oldest value if the window was
    /// already full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        let evicted = if self.values.len() == self.capacity {
            self.values.pop_front()
        } else {
            None
        };

        if let Some(old) = evicted {
            if old.is_finite() {
                let d = old - self.shift;
                self.sum -= d;
                self.sum_sq -= d * d;
            } else {
                self.non_finite -= 1;
            }
            self.evictions += 1;
        }

        self.run_len = match self.values.back() {
            Some(last) if last.to_bits() == value.to_bits() => self.run_len + 1,
            _ => 1,
        };

        if value.is_finite() {
            if self.finite_len() == 0 {
                self.shift = value;
                self.sum = 0.0;
                self.sum_sq = 0.0;
                self.peak_sq = 0.0;
            }
            let d = value - self.shift;
            self.sum += d;
            self.sum_sq += d * d;
        } else {
            self.non_finite += 1;
        }
        self.values.push_back(value);
        self.peak_sq = self.peak_sq.max(self.sum_sq);

        if self.evictions >= self.capacity || self.lost_precision() {
            self.resync();
        }

        evicted
    }

    fn finite_len(&self) -> usize {
        self.values.len() - self.non_finite
    }

    /// True when the centred variance came out of a subtraction that
    /// cancelled nearly all of the largest magnitude the sums have held since
    /// the last rebuild.
    fn lost_precision(&self) -> bool {
        let n = self.finite_len();
        if n == 0 {
            return false;
        }
        let n = n as f64;
        let centred = self.sum / n;
        self.sum_sq / n - centred * centred < self.peak_sq / n * CANCELLATION_RATIO
    }

    /// Rebuilds the sums from the retained finite values around their mean.
    fn resync(&mut self) {
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.evictions = 0;

        let n = self.finite_len();
        if n > 0 {
            self.shift = match self.values.back() {
                // All bit-identical: the mean is exactly that value.
                Some(&last) if self.run_len >= self.values.len() => last,
                _ => self.finite().sum::<f64>() / n as f64,
            };
            let (mut sum, mut sum_sq) = (self.sum, self.sum_sq);
            for x in self.finite() {
                let d = x - self.shift;
                sum += d;
                sum_sq += d * d;
            }
            self.sum = sum;
            self.sum_sq = sum_sq;
        }
        self.peak_sq = self.sum_sq;
    }

    fn finite(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied().filter(|x| x.is_finite())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained NaN or infinite values.
    pub fn non_finite(&self) -> usize {
        self.non_finite
    }

    /// Retained values, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// `None` when empty or while a non-finite value is retained.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() || self.non_finite > 0 {
            return None;
        }
        let n = self.values.len() as f64;
        Some(self.shift + self.sum / n)
    }

    /// Population variance (divides by N).
    pub fn variance(&self) -> Option<f64> {
        let mean = self.mean()?;
        if self.run_len >= self.values.len() {
            return Some(0.0);
        }

        let n = self.values.len() as f64;
        let centred = self.sum / n;
        let variance = (self.sum_sq / n - centred * centred).max(0.0);

        let floor = VARIANCE_ULPS * f64::EPSILON * mean.abs();
        if variance <= floor * floor {
            Some(0.0)
        } else {
            Some(variance)
        }
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.shift = 0.0;
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.peak_sq = 0.0;
        self.non_finite = 0;
        self.run_len = 0;
        self.evictions = 0;
    }
}
