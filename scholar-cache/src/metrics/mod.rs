//! # Layer Metrics
//!
//! Per-layer operation counters and latency samples for the cache backend.
//!
//! Both layers live behind one mutex in [`CacheMetrics`], so a snapshot never
//! mixes counters read at different points in time.
//!
//! Error rate is `errors / (hits + misses + sets + deletes + errors)`: errors
//! over every attempted operation on the layer. A failed operation is
//! recorded only as an error, never also as a miss or set. The overall view
//! uses the same definition over the summed counters.

pub mod latency;
pub mod timer;

pub use latency::{LatencyStats, LatencySummary, DEFAULT_LATENCY_CAPACITY};
pub use timer::MetricsTimer;

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// Physical cache layer a measurement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    L1,
    L2,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::L1 => write!(f, "l1"),
            Layer::L2 => write!(f, "l2"),
        }
    }
}

/// Outcome of one layer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricEvent {
    Hit,
    Miss,
    Set,
    Delete,
    Error,
    Eviction,
}

/// Counters and latency samples for one layer
#[derive(Debug, Clone, Default)]
pub struct LayerMetrics {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    pub evictions: u64,
    pub latency: LatencyStats,
}

impl LayerMetrics {
    pub fn new(latency_capacity: usize) -> Self {
        Self {
            latency: LatencyStats::new(latency_capacity),
            ..Default::default()
        }
    }

    pub fn record(&mut self, event: MetricEvent, latency_ms: f64) {
        match event {
            MetricEvent::Hit => self.hits += 1,
            MetricEvent::Miss => self.misses += 1,
            MetricEvent::Set => self.sets += 1,
            MetricEvent::Delete => self.deletes += 1,
            MetricEvent::Error => self.errors += 1,
            MetricEvent::Eviction => self.evictions += 1,
        }
        // Evictions are side effects of another operation; they carry no latency
        if event != MetricEvent::Eviction {
            self.latency.add(latency_ms);
        }
    }

    /// Lookups: hits + misses
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// Every attempted operation, including failed ones
    pub fn total_operations(&self) -> u64 {
        self.hits + self.misses + self.sets + self.deletes + self.errors
    }

    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.total_requests())
    }

    pub fn error_rate(&self) -> f64 {
        ratio(self.errors, self.total_operations())
    }

    pub fn snapshot(&self) -> LayerSnapshot {
        LayerSnapshot {
            hits: self.hits,
            misses: self.misses,
            sets: self.sets,
            deletes: self.deletes,
            errors: self.errors,
            evictions: self.evictions,
            total_requests: self.total_requests(),
            hit_rate: self.hit_rate(),
            error_rate: self.error_rate(),
            latency: self.latency.summary(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.latency.capacity());
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Serializable view of one layer's metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    pub evictions: u64,
    pub total_requests: u64,
    pub hit_rate: f64,
    pub error_rate: f64,
    pub latency: LatencySummary,
}

/// Counters summed across both layers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallMetrics {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    pub evictions: u64,
    pub total_requests: u64,
    pub hit_rate: f64,
    pub error_rate: f64,
    /// Mean latency weighted by each layer's sample count
    pub avg_latency_ms: f64,
}

/// Both layers plus the combined view, read under one lock
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub overall: OverallMetrics,
    pub l1: LayerSnapshot,
    pub l2: LayerSnapshot,
}

struct LayerCounters {
    l1: LayerMetrics,
    l2: LayerMetrics,
}

impl LayerCounters {
    fn layer_mut(&mut self, layer: Layer) -> &mut LayerMetrics {
        match layer {
            Layer::L1 => &mut self.l1,
            Layer::L2 => &mut self.l2,
        }
    }

    fn overall(&self) -> OverallMetrics {
        let (l1, l2) = (&self.l1, &self.l2);
        let hits = l1.hits + l2.hits;
        let misses = l1.misses + l2.misses;
        let sets = l1.sets + l2.sets;
        let deletes = l1.deletes + l2.deletes;
        let errors = l1.errors + l2.errors;

        let samples = l1.latency.len() + l2.latency.len();
        let avg_latency_ms = if samples == 0 {
            0.0
        } else {
            (l1.latency.mean() * l1.latency.len() as f64
                + l2.latency.mean() * l2.latency.len() as f64)
                / samples as f64
        };

        OverallMetrics {
            hits,
            misses,
            sets,
            deletes,
            errors,
            evictions: l1.evictions + l2.evictions,
            total_requests: hits + misses,
            hit_rate: ratio(hits, hits + misses),
            error_rate: ratio(errors, hits + misses + sets + deletes + errors),
            avg_latency_ms,
        }
    }
}

/// Metrics for both cache layers behind a single lock
pub struct CacheMetrics {
    inner: Mutex<LayerCounters>,
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::with_latency_capacity(DEFAULT_LATENCY_CAPACITY)
    }

    pub fn with_latency_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LayerCounters {
                l1: LayerMetrics::new(capacity),
                l2: LayerMetrics::new(capacity),
            }),
        }
    }

    /// Record one event. Dropped if the lock is poisoned
    pub fn record(&self, layer: Layer, event: MetricEvent, latency_ms: f64) {
        if let Ok(mut counters) = self.inner.lock() {
            counters.layer_mut(layer).record(event, latency_ms);
        }
    }

    pub fn record_l1_hit(&self, latency_ms: f64) {
        self.record(Layer::L1, MetricEvent::Hit, latency_ms);
    }

    pub fn record_l1_miss(&self, latency_ms: f64) {
        self.record(Layer::L1, MetricEvent::Miss, latency_ms);
    }

    pub fn record_l1_set(&self, latency_ms: f64) {
        self.record(Layer::L1, MetricEvent::Set, latency_ms);
    }

    pub fn record_l1_delete(&self, latency_ms: f64) {
        self.record(Layer::L1, MetricEvent::Delete, latency_ms);
    }

    pub fn record_l1_error(&self, latency_ms: f64) {
        self.record(Layer::L1, MetricEvent::Error, latency_ms);
    }

    pub fn record_l1_eviction(&self, latency_ms: f64) {
        self.record(Layer::L1, MetricEvent::Eviction, latency_ms);
    }

    pub fn record_l2_hit(&self, latency_ms: f64) {
        self.record(Layer::L2, MetricEvent::Hit, latency_ms);
    }

    pub fn record_l2_miss(&self, latency_ms: f64) {
        self.record(Layer::L2, MetricEvent::Miss, latency_ms);
    }

    pub fn record_l2_set(&self, latency_ms: f64) {
        self.record(Layer::L2, MetricEvent::Set, latency_ms);
    }

    pub fn record_l2_delete(&self, latency_ms: f64) {
        self.record(Layer::L2, MetricEvent::Delete, latency_ms);
    }

    pub fn record_l2_error(&self, latency_ms: f64) {
        self.record(Layer::L2, MetricEvent::Error, latency_ms);
    }

    pub fn record_l2_eviction(&self, latency_ms: f64) {
        self.record(Layer::L2, MetricEvent::Eviction, latency_ms);
    }

    /// Record `count` evictions at once (sweeps and capacity eviction)
    pub fn record_evictions(&self, layer: Layer, count: u64) {
        if count == 0 {
            return;
        }
        if let Ok(mut counters) = self.inner.lock() {
            counters.layer_mut(layer).evictions += count;
        }
    }

    /// Start timing an operation on `layer`
    pub fn timer(&self, layer: Layer) -> MetricsTimer<'_> {
        MetricsTimer::start(self, layer)
    }

    pub fn layer(&self, layer: Layer) -> Result<LayerSnapshot> {
        let mut counters = self.lock()?;
        Ok(counters.layer_mut(layer).snapshot())
    }

    pub fn overall(&self) -> Result<OverallMetrics> {
        Ok(self.lock()?.overall())
    }

    pub fn snapshot(&self) -> Result<MetricsSnapshot> {
        let counters = self.lock()?;
        Ok(MetricsSnapshot {
            overall: counters.overall(),
            l1: counters.l1.snapshot(),
            l2: counters.l2.snapshot(),
        })
    }

    /// Zero every counter and drop all latency samples. Also recovers a
    /// poisoned lock.
    pub fn reset(&self) {
        let mut counters = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                self.inner.clear_poison();
                poisoned.into_inner()
            }
        };
        counters.l1.reset();
        counters.l2.reset();
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LayerCounters>> {
        self.inner
            .lock()
            .map_err(|_| CacheError::MetricsUnavailable("metrics lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_rates_are_zero() {
        let metrics = CacheMetrics::new();
        let snapshot = metrics.snapshot().unwrap();
        assert_eq!(snapshot.l1.hit_rate, 0.0);
        assert_eq!(snapshot.l1.error_rate, 0.0);
        assert_eq!(snapshot.overall.hit_rate, 0.0);
        assert_eq!(snapshot.overall.avg_latency_ms, 0.0);
    }

    #[test]
    fn test_hit_and_error_rates() {
        let metrics = CacheMetrics::new();
        metrics.record_l1_hit(1.0);
        metrics.record_l1_hit(1.0);
        metrics.record_l1_hit(1.0);
        metrics.record_l1_miss(1.0);
        metrics.record_l1_set(1.0);
        metrics.record_l1_error(1.0);

        let l1 = metrics.layer(Layer::L1).unwrap();
        assert_eq!(l1.hit_rate, 0.75);
        // 1 error over 6 attempted operations
        assert!((l1.error_rate - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_overall_sums_layers_and_blends_latency() {
        let metrics = CacheMetrics::new();
        metrics.record_l1_miss(1.0);
        metrics.record_l1_miss(1.0);
        metrics.record_l2_hit(10.0);
        metrics.record_l2_error(4.0);
        metrics.record_l1_eviction(0.0);

        let overall = metrics.overall().unwrap();
        assert_eq!(overall.hits, 1);
        assert_eq!(overall.misses, 2);
        assert_eq!(overall.errors, 1);
        assert_eq!(overall.evictions, 1);
        assert_eq!(overall.total_requests, 3);
        assert!((overall.hit_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(overall.error_rate, 0.25);
        // (1 + 1 + 10 + 4) / 4; the eviction has no sample
        assert_eq!(overall.avg_latency_ms, 4.0);
    }

    #[test]
    fn test_reset() {
        let metrics = CacheMetrics::new();
        metrics.record_l2_set(3.0);
        metrics.record_evictions(Layer::L2, 5);
        metrics.reset();

        let snapshot = metrics.snapshot().unwrap();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_poisoned_lock() {
        let metrics = Arc::new(CacheMetrics::new());
        let poisoner = Arc::clone(&metrics);
        let _ = thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison the metrics lock");
        })
        .join();

        assert!(matches!(
            metrics.snapshot(),
            Err(CacheError::MetricsUnavailable(_))
        ));

        metrics.reset();
        metrics.record_l1_hit(1.0);
        assert_eq!(metrics.layer(Layer::L1).unwrap().hits, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = CacheMetrics::new();
        metrics.record_l1_hit(0.5);
        let json = serde_json::to_value(metrics.snapshot().unwrap()).unwrap();
        assert_eq!(json["l1"]["hits"], 1);
        assert_eq!(json["overall"]["hit_rate"], 1.0);
    }

    #[test]
    fn test_concurrent_recording() {
        let metrics = Arc::new(CacheMetrics::with_latency_capacity(10));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.record_l1_hit(0.1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let l1 = metrics.layer(Layer::L1).unwrap();
        assert_eq!(l1.hits, 8000);
        assert_eq!(l1.latency.samples, 10);
    }
}
