//! # Cache Health Monitoring
//!
//! [`HealthMonitor`] evaluates a set of [`HealthThresholds`] against the
//! statistics of anything implementing [`StatsSource`] and produces a
//! [`HealthReport`]. Every failing check becomes a [`HealthIssue`]; the
//! report status is the worst severity found.
//!
//! | check | severity |
//! |---|---|
//! | overall hit rate below `min_hit_rate` | warning |
//! | overall error rate above `max_error_rate` | critical |
//! | L1 p99 latency above `max_l1_p99_latency_ms` | warning |
//! | L2 p99 latency above `max_l2_p99_latency_ms` | warning |
//! | L2 hit rate below `min_l2_hit_rate` | warning |
//! | L2 disk usage above `max_l2_disk_usage` | critical |

pub mod monitor;

pub use monitor::{AlertCallback, AlertResult, HealthMonitor, StatsSource};

use crate::cache::types::CacheStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Limits the monitor checks against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Overall hit rate below this is a warning
    pub min_hit_rate: f64,

    /// Overall error rate above this is critical
    pub max_error_rate: f64,

    pub max_l1_p99_latency_ms: f64,

    pub max_l2_p99_latency_ms: f64,

    /// Fraction of the L2 map in use above which the layer is critical
    pub max_l2_disk_usage: f64,

    pub min_l2_hit_rate: f64,

    /// Requests a layer must have served before its rates are judged
    pub min_requests: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            min_hit_rate: 0.5,
            max_error_rate: 0.05,
            max_l1_p99_latency_ms: 10.0,
            max_l2_p99_latency_ms: 100.0,
            max_l2_disk_usage: 0.9,
            min_l2_hit_rate: 0.2,
            min_requests: 1,
        }
    }
}

/// Overall health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// No check failed
    Healthy,
    /// At least one warning, nothing critical
    Warning,
    /// At least one critical issue
    Critical,
    /// Statistics could not be read
    Unknown,
}

impl HealthStatus {
    /// Convert to HTTP status code equivalent
    pub fn to_http_status_code(&self) -> u16 {
        match self {
            HealthStatus::Healthy => 200,
            HealthStatus::Warning => 200,
            HealthStatus::Critical => 503,
            HealthStatus::Unknown => 503,
        }
    }

    /// Check if status is healthy or only warning (operational)
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Warning)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Warning => write!(f, "warning"),
            HealthStatus::Critical => write!(f, "critical"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// One failed check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthIssue {
    pub severity: Severity,
    /// `cache`, `l1` or `l2`
    pub component: String,
    pub metric: String,
    pub message: String,
    /// Observed value
    pub value: f64,
    pub threshold: f64,
}

impl HealthIssue {
    pub fn new(
        severity: Severity,
        component: &str,
        metric: &str,
        message: impl Into<String>,
        value: f64,
        threshold: f64,
    ) -> Self {
        Self {
            severity,
            component: component.to_string(),
            metric: metric.to_string(),
            message: message.into(),
            value,
            threshold,
        }
    }
}

impl fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}.{}: {} (value {:.3}, threshold {:.3})",
            self.severity, self.component, self.metric, self.message, self.value, self.threshold
        )
    }
}

/// Point-in-time health evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// In check order
    pub issues: Vec<HealthIssue>,
    /// Statistics the checks ran against; `None` when they could not be read
    pub stats: Option<CacheStats>,
    pub timestamp: DateTime<Utc>,
}

impl HealthReport {
    /// Build a report whose status follows from the issues found
    pub fn from_issues(issues: Vec<HealthIssue>, stats: CacheStats) -> Self {
        let status = if issues.iter().any(|i| i.severity == Severity::Critical) {
            HealthStatus::Critical
        } else if !issues.is_empty() {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            issues,
            stats: Some(stats),
            timestamp: Utc::now(),
        }
    }

    /// Report for when statistics could not be collected
    pub fn unknown(reason: &str) -> Self {
        Self {
            status: HealthStatus::Unknown,
            issues: vec![HealthIssue::new(
                Severity::Critical,
                "cache",
                "metrics",
                format!("metrics unavailable: {}", reason),
                0.0,
                0.0,
            )],
            stats: None,
            timestamp: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn issues_with_severity(&self, severity: Severity) -> impl Iterator<Item = &HealthIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }
}
