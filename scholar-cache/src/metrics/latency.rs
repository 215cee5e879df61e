//! Fixed-capacity latency sample buffer

use serde::{Deserialize, Serialize};

/// Default number of samples kept per layer
pub const DEFAULT_LATENCY_CAPACITY: usize = 1000;

/// Circular buffer of recent latency samples in milliseconds
///
/// Once full, each new sample overwrites the oldest one.
#[derive(Debug, Clone)]
pub struct LatencyStats {
    samples: Vec<f64>,
    capacity: usize,
    /// Slot the next sample is written to
    next: usize,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_CAPACITY)
    }
}

impl LatencyStats {
    /// Create a buffer holding at most `capacity` samples (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    pub fn add(&mut self, latency_ms: f64) {
        if self.samples.len() < self.capacity {
            self.samples.push(latency_ms);
        } else {
            self.samples[self.next] = latency_ms;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.next = 0;
    }

    fn sorted(&self) -> Vec<f64> {
        let mut snapshot = self.samples.clone();
        snapshot.sort_by(|a, b| a.total_cmp(b));
        snapshot
    }

    /// Value at index `floor(n * p / 100)` of the sorted samples, clamped to the last index
    pub fn percentile(&self, p: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sorted = self.sorted();
        let n = sorted.len();
        let idx = ((n as f64 * p.max(0.0) / 100.0).floor() as usize).min(n - 1);
        sorted[idx]
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn median(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sorted = self.sorted();
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }

    /// Population standard deviation
    pub fn stddev(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .samples
            .iter()
            .map(|s| (s - mean).powi(2))
            .sum::<f64>()
            / self.samples.len() as f64;
        variance.sqrt()
    }

    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            samples: self.samples.len(),
            mean_ms: self.mean(),
            p50_ms: self.percentile(50.0),
            p95_ms: self.percentile(95.0),
            p99_ms: self.percentile(99.0),
            stddev_ms: self.stddev(),
        }
    }
}

/// Point-in-time latency figures for one layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub stddev_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_is_all_zero() {
        let stats = LatencyStats::new(10);
        assert_eq!(stats.percentile(99.0), 0.0);
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.median(), 0.0);
        assert_eq!(stats.stddev(), 0.0);
        assert_eq!(stats.summary(), LatencySummary::default());
    }

    #[test]
    fn test_percentile_index_rule() {
        let mut stats = LatencyStats::new(100);
        for i in 1..=10 {
            stats.add(i as f64);
        }
        // floor(10 * 50 / 100) = 5 -> sixth smallest
        assert_eq!(stats.percentile(50.0), 6.0);
        // floor(10 * 99 / 100) = 9 -> largest
        assert_eq!(stats.percentile(99.0), 10.0);
        // clamped
        assert_eq!(stats.percentile(100.0), 10.0);
        assert_eq!(stats.percentile(0.0), 1.0);
    }

    #[test]
    fn test_ring_overwrites_oldest() {
        let mut stats = LatencyStats::new(3);
        stats.add(100.0);
        stats.add(1.0);
        stats.add(2.0);
        stats.add(3.0);

        assert_eq!(stats.len(), 3);
        assert_eq!(stats.percentile(99.0), 3.0);
        assert_eq!(stats.mean(), 2.0);
    }

    #[test]
    fn test_mean_median_stddev() {
        let mut stats = LatencyStats::new(10);
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.add(v);
        }
        assert_eq!(stats.mean(), 5.0);
        assert_eq!(stats.median(), 4.5);
        assert!((stats.stddev() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_capacity_is_bumped() {
        let mut stats = LatencyStats::new(0);
        stats.add(1.0);
        stats.add(2.0);
        assert_eq!(stats.capacity(), 1);
        assert_eq!(stats.mean(), 2.0);

        stats.clear();
        assert!(stats.is_empty());
    }
}
