//! Threshold evaluation and alert delivery

use crate::cache::types::CacheStats;
use crate::error::Result;
use crate::health::{HealthIssue, HealthReport, HealthStatus, HealthThresholds, Severity};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error, warn};

/// Anything that can report cache statistics
///
/// The monitor needs nothing else from the cache, so tests can hand it a
/// minimal fake.
pub trait StatsSource: Send + Sync {
    fn get_stats(&self) -> Result<CacheStats>;
}

/// Outcome of one alert callback
pub type AlertResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Called with every report that has issues
pub type AlertCallback = Arc<dyn Fn(&HealthReport) -> AlertResult + Send + Sync>;

/// Evaluates health thresholds over a stats source
pub struct HealthMonitor {
    source: Arc<dyn StatsSource>,
    thresholds: HealthThresholds,
    callbacks: Mutex<Vec<AlertCallback>>,
    last_report: RwLock<Option<Arc<HealthReport>>>,
}

impl HealthMonitor {
    pub fn new(source: Arc<dyn StatsSource>, thresholds: HealthThresholds) -> Self {
        Self {
            source,
            thresholds,
            callbacks: Mutex::new(Vec::new()),
            last_report: RwLock::new(None),
        }
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    /// Register a callback invoked whenever a check finds issues
    pub fn add_alert_callback<F>(&self, callback: F)
    where
        F: Fn(&HealthReport) -> AlertResult + Send + Sync + 'static,
    {
        let mut callbacks = match self.callbacks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        callbacks.push(Arc::new(callback));
    }

    /// Run every check, keep the report as the latest and deliver alerts
    ///
    /// Never fails: unreadable statistics produce an [`HealthStatus::Unknown`] report.
    pub fn check_health(&self) -> Arc<HealthReport> {
        let report = match catch_unwind(AssertUnwindSafe(|| self.source.get_stats())) {
            Ok(Ok(stats)) => {
                let issues = evaluate(&stats, &self.thresholds);
                HealthReport::from_issues(issues, stats)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Cache statistics unavailable for health check");
                HealthReport::unknown(&e.to_string())
            }
            Err(_) => {
                error!("Cache statistics source panicked during health check");
                HealthReport::unknown("statistics source panicked")
            }
        };
        let report = Arc::new(report);

        match report.status {
            HealthStatus::Healthy => debug!("Cache health check passed"),
            status => warn!(
                %status,
                issues = report.issues.len(),
                "Cache health check found issues"
            ),
        }

        match self.last_report.write() {
            Ok(mut last) => *last = Some(Arc::clone(&report)),
            Err(poisoned) => *poisoned.into_inner() = Some(Arc::clone(&report)),
        }

        if report.has_issues() {
            self.deliver(&report);
        }

        report
    }

    fn deliver(&self, report: &HealthReport) {
        // Clone the list so callbacks run without holding the lock
        let callbacks: Vec<AlertCallback> = match self.callbacks.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        for (index, callback) in callbacks.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| callback(report))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(callback = index, error = %e, "Alert callback failed"),
                Err(_) => error!(callback = index, "Alert callback panicked"),
            }
        }
    }

    /// Most recent report, if any check has run
    pub fn get_last_report(&self) -> Option<Arc<HealthReport>> {
        match self.last_report.read() {
            Ok(last) => last.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Run every check against `stats`; all failures are collected
pub fn evaluate(stats: &CacheStats, thresholds: &HealthThresholds) -> Vec<HealthIssue> {
    let mut issues = Vec::new();
    let overall = &stats.overall;
    let l1 = &stats.layers.l1;
    let l2 = &stats.layers.l2;
    let min_requests = thresholds.min_requests.max(1);

    if overall.total_requests >= min_requests && overall.hit_rate < thresholds.min_hit_rate {
        issues.push(HealthIssue::new(
            Severity::Warning,
            "cache",
            "hit_rate",
            format!(
                "hit rate {:.1}% below {:.1}%",
                overall.hit_rate * 100.0,
                thresholds.min_hit_rate * 100.0
            ),
            overall.hit_rate,
            thresholds.min_hit_rate,
        ));
    }

    let operations =
        overall.hits + overall.misses + overall.sets + overall.deletes + overall.errors;
    if operations >= min_requests && overall.error_rate > thresholds.max_error_rate {
        issues.push(HealthIssue::new(
            Severity::Critical,
            "cache",
            "error_rate",
            format!(
                "error rate {:.1}% above {:.1}%",
                overall.error_rate * 100.0,
                thresholds.max_error_rate * 100.0
            ),
            overall.error_rate,
            thresholds.max_error_rate,
        ));
    }

    if l1.latency.samples > 0 && l1.latency.p99_ms > thresholds.max_l1_p99_latency_ms {
        issues.push(HealthIssue::new(
            Severity::Warning,
            "l1",
            "p99_latency_ms",
            format!("L1 p99 latency {:.2}ms", l1.latency.p99_ms),
            l1.latency.p99_ms,
            thresholds.max_l1_p99_latency_ms,
        ));
    }

    if l2.latency.samples > 0 && l2.latency.p99_ms > thresholds.max_l2_p99_latency_ms {
        issues.push(HealthIssue::new(
            Severity::Warning,
            "l2",
            "p99_latency_ms",
            format!("L2 p99 latency {:.2}ms", l2.latency.p99_ms),
            l2.latency.p99_ms,
            thresholds.max_l2_p99_latency_ms,
        ));
    }

    if l2.total_requests >= min_requests && l2.hit_rate < thresholds.min_l2_hit_rate {
        issues.push(HealthIssue::new(
            Severity::Warning,
            "l2",
            "hit_rate",
            format!("L2 hit rate {:.1}%", l2.hit_rate * 100.0),
            l2.hit_rate,
            thresholds.min_l2_hit_rate,
        ));
    }

    let disk_usage = stats.usage.l2_utilization();
    if stats.usage.l2_available && disk_usage > thresholds.max_l2_disk_usage {
        issues.push(HealthIssue::new(
            Severity::Critical,
            "l2",
            "disk_usage",
            format!("L2 storage {:.1}% full", disk_usage * 100.0),
            disk_usage,
            thresholds.max_l2_disk_usage,
        ));
    }

    issues
}
