//! Exponentially decaying reservoir sample.
//!
//! Forward-decay priority sampling: every observation is weighted by
//! `exp(alpha * (t - landmark)) / u` with `u` drawn uniformly from `(0, 1]`,
//! and the reservoir keeps the `capacity` highest weights. Recent values
//! therefore dominate the sample while older ones fade out without a fixed
//! window. The landmark is moved forward periodically so weights stay finite.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::registry::RegistryError;

/// Interval after which all priorities are rescaled to a new landmark.
const RESCALE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

/// Default reservoir capacity.
pub const DEFAULT_RESERVOIR_SIZE: usize = 128;

/// Default decay constant, biased towards roughly the last five minutes.
pub const DEFAULT_ALPHA: f64 = 0.015;

/// Fixed configuration of a decaying sample, chosen at registration time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleParams {
    capacity: usize,
    alpha: f64,
}

impl SampleParams {
    /// Validate and build sample parameters.
    pub fn new(capacity: usize, alpha: f64) -> Result<Self, RegistryError> {
        if capacity == 0 {
            return Err(RegistryError::InvalidSampleParams(
                "reservoir capacity must be greater than 0".to_string(),
            ));
        }
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(RegistryError::InvalidSampleParams(format!(
                "decay constant must be finite and non-negative, got {alpha}"
            )));
        }
        Ok(Self { capacity, alpha })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RESERVOIR_SIZE,
            alpha: DEFAULT_ALPHA,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WeightedValue {
    priority: f64,
    value: i64,
}

impl PartialEq for WeightedValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for WeightedValue {}

impl PartialOrd for WeightedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WeightedValue {
    // Reversed: the top of the heap is the lowest priority.
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.total_cmp(&self.priority)
    }
}

/// Saturate a weight that overflowed, so every weight stays comparable.
fn bounded(priority: f64) -> f64 {
    if priority.is_nan() {
        0.0
    } else {
        priority.min(f64::MAX)
    }
}

/// Exponentially decaying reservoir of `i64` observations.
#[derive(Debug)]
pub struct ExpDecaySample {
    params: SampleParams,
    count: u64,
    sum: i64,
    landmark: Instant,
    next_rescale: Instant,
    values: BinaryHeap<WeightedValue>,
}

impl ExpDecaySample {
    pub fn new(params: SampleParams) -> Self {
        let now = Instant::now();
        Self {
            params,
            count: 0,
            sum: 0,
            landmark: now,
            next_rescale: now + RESCALE_THRESHOLD,
            values: BinaryHeap::with_capacity(params.capacity),
        }
    }

    pub fn params(&self) -> SampleParams {
        self.params
    }

    /// Record a value observed now.
    pub fn update(&mut self, value: i64) {
        self.update_at(Instant::now(), value);
    }

    /// Record a value observed at `now`.
    pub fn update_at(&mut self, now: Instant, value: i64) {
        // Move the landmark first so the new weight is taken against it.
        if now >= self.next_rescale {
            self.rescale(now);
        }

        self.count += 1;
        self.sum = self.sum.saturating_add(value);

        // gen::<f64>() is in [0, 1); flip it so the divisor is never zero.
        let u = 1.0 - rand::thread_rng().gen::<f64>();
        let elapsed = now.saturating_duration_since(self.landmark).as_secs_f64();
        let candidate = WeightedValue {
            priority: bounded((self.params.alpha * elapsed).exp() / u),
            value,
        };

        if self.values.len() < self.params.capacity {
            self.values.push(candidate);
        } else if let Some(mut lowest) = self.values.peek_mut() {
            if candidate.priority > lowest.priority {
                *lowest = candidate;
            }
        }
    }

    fn rescale(&mut self, now: Instant) {
        let previous = std::mem::replace(&mut self.landmark, now);
        self.next_rescale = now + RESCALE_THRESHOLD;

        let elapsed = now.saturating_duration_since(previous).as_secs_f64();
        let factor = (-self.params.alpha * elapsed).exp();
        let rescaled: BinaryHeap<WeightedValue> = self
            .values
            .drain()
            .map(|mut weighted| {
                weighted.priority = bounded(weighted.priority * factor);
                weighted
            })
            .collect();
        self.values = rescaled;
    }

    /// Total number of observations, including evicted ones.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Number of values currently held in the reservoir.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn clear(&mut self) {
        let now = Instant::now();
        self.count = 0;
        self.sum = 0;
        self.landmark = now;
        self.next_rescale = now + RESCALE_THRESHOLD;
        self.values.clear();
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        let mut values: Vec<i64> = self.values.iter().map(|w| w.value).collect();
        values.sort_unstable();
        HistogramSnapshot {
            count: self.count,
            sum: self.sum,
            values,
        }
    }
}

/// Point-in-time view of a decaying sample.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// Total number of observations.
    pub count: u64,
    /// Running sum of all observations.
    pub sum: i64,
    values: Vec<i64>,
}

impl HistogramSnapshot {
    /// Sorted reservoir contents.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn sample_size(&self) -> usize {
        self.values.len()
    }

    pub fn min(&self) -> i64 {
        self.values.first().copied().unwrap_or(0)
    }

    pub fn max(&self) -> i64 {
        self.values.last().copied().unwrap_or(0)
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().map(|&v| v as f64).sum::<f64>() / self.values.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .values
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / self.values.len() as f64;
        variance.sqrt()
    }

    /// Estimate the `p` quantile (0.0..=1.0) by linear interpolation over the
    /// sorted sample at position `p * (n + 1)`.
    pub fn percentile(&self, p: f64) -> f64 {
        let size = self.values.len();
        if size == 0 {
            return 0.0;
        }

        let pos = p * (size + 1) as f64;
        if pos < 1.0 {
            self.values[0] as f64
        } else if pos >= size as f64 {
            self.values[size - 1] as f64
        } else {
            let lower = self.values[pos as usize - 1] as f64;
            let upper = self.values[pos as usize] as f64;
            lower + (pos - pos.floor()) * (upper - lower)
        }
    }

    pub fn percentiles(&self, ps: &[f64]) -> Vec<f64> {
        ps.iter().map(|&p| self.percentile(p)).collect()
    }
}
