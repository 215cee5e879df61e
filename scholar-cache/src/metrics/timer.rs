//! Scoped latency measurement

use crate::metrics::{CacheMetrics, Layer, MetricEvent};
use std::time::Instant;

/// Measures one layer operation and records it exactly once, when dropped
///
/// Call [`MetricsTimer::finish`] with the outcome. A timer dropped without an
/// outcome (early `?` return, panic unwind) records an error for its layer,
/// so the failure path still contributes a latency sample.
pub struct MetricsTimer<'a> {
    metrics: &'a CacheMetrics,
    layer: Layer,
    start: Instant,
    outcome: Option<MetricEvent>,
}

impl<'a> MetricsTimer<'a> {
    pub fn start(metrics: &'a CacheMetrics, layer: Layer) -> Self {
        Self {
            metrics,
            layer,
            start: Instant::now(),
            outcome: None,
        }
    }

    /// Set the outcome without ending the measurement
    pub fn set_outcome(&mut self, event: MetricEvent) {
        self.outcome = Some(event);
    }

    /// Record `event` now
    pub fn finish(mut self, event: MetricEvent) {
        self.outcome = Some(event);
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for MetricsTimer<'_> {
    fn drop(&mut self) {
        let event = self.outcome.take().unwrap_or(MetricEvent::Error);
        self.metrics.record(self.layer, event, self.elapsed_ms());
    }
}
