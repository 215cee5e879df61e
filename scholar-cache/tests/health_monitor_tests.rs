//! Integration tests for health monitoring over a live cache backend

use scholar_cache::{
    CacheBackend, CacheConfig, CacheError, CacheLayer, CacheStats, HealthMonitor, HealthStatus,
    HealthThresholds, PersistentLayer, Result, SetOptions, Severity, StatsSource,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn memory_backend() -> Arc<CacheBackend> {
    let backend = CacheBackend::new(CacheConfig::memory_only(), PersistentLayer::unavailable("test"))
        .expect("valid config");
    Arc::new(backend)
}

#[test]
fn test_fresh_cache_is_healthy() {
    let monitor = HealthMonitor::new(memory_backend(), HealthThresholds::default());
    let report = monitor.check_health();

    assert_eq!(report.status, HealthStatus::Healthy);
    assert!(!report.has_issues());
    assert_eq!(report.status.to_http_status_code(), 200);
    assert!(report.stats.is_some());
}

#[test]
fn test_all_misses_produce_hit_rate_warning() {
    let backend = memory_backend();
    for i in 0..200 {
        assert!(backend.get(&format!("search:v1:{}", i), CacheLayer::Any).is_none());
    }

    let monitor = HealthMonitor::new(backend, HealthThresholds::default());
    let report = monitor.check_health();

    assert_eq!(report.status, HealthStatus::Warning);
    assert!(report.status.is_operational());
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].component, "cache");
    assert_eq!(report.issues[0].metric, "hit_rate");
    assert_eq!(report.issues[0].value, 0.0);
}

#[test]
fn test_good_hit_rate_clears_warning() {
    let backend = memory_backend();
    backend.set("record:v1:a", "a", &SetOptions::new());
    for _ in 0..9 {
        backend.get("record:v1:a", CacheLayer::Any);
    }
    backend.get("record:v1:missing", CacheLayer::Any);

    let monitor = HealthMonitor::new(backend, HealthThresholds::default());
    assert!(monitor.check_health().is_healthy());
}

#[test]
fn test_l1_write_errors_are_critical() {
    let config = CacheConfig::builder()
        .enable_l2(false)
        .l1_size_limit_bytes(128)
        .build()
        .unwrap();
    let backend = Arc::new(CacheBackend::new(config, PersistentLayer::unavailable("test")).unwrap());
    for i in 0..10 {
        assert!(!backend.set(&format!("fulltext:v1:{}", i), vec![0u8; 1024], &SetOptions::new()));
    }

    let monitor = HealthMonitor::new(backend, HealthThresholds::default());
    let report = monitor.check_health();
    assert_eq!(report.status, HealthStatus::Critical);
    assert_eq!(report.status.to_http_status_code(), 503);
    let critical: Vec<_> = report.issues_with_severity(Severity::Critical).collect();
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].metric, "error_rate");
    assert_eq!(critical[0].value, 1.0);
}

struct Unreadable;

impl StatsSource for Unreadable {
    fn get_stats(&self) -> Result<CacheStats> {
        Err(CacheError::MetricsUnavailable("lock poisoned".to_string()))
    }
}

#[test]
fn test_unreadable_stats_give_unknown() {
    let monitor = HealthMonitor::new(Arc::new(Unreadable), HealthThresholds::default());
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    monitor.add_alert_callback(move |report| {
        assert_eq!(report.status, HealthStatus::Unknown);
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let report = monitor.check_health();
    assert_eq!(report.status, HealthStatus::Unknown);
    assert!(!report.status.is_operational());
    assert!(report.stats.is_none());
    assert!(report.issues[0].message.contains("lock poisoned"));
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failing_callbacks_do_not_stop_delivery() {
    let backend = memory_backend();
    for i in 0..10 {
        backend.get(&format!("k{}", i), CacheLayer::Any);
    }

    let monitor = HealthMonitor::new(backend, HealthThresholds::default());
    let delivered = Arc::new(AtomicUsize::new(0));

    monitor.add_alert_callback(|_| Err("pager unreachable".into()));
    monitor.add_alert_callback(|_| panic!("alert sink crashed"));
    let counter = delivered.clone();
    monitor.add_alert_callback(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let report = monitor.check_health();
    assert_eq!(report.status, HealthStatus::Warning);
    assert_eq!(delivered.load(Ordering::SeqCst), 1);

    // still usable after a callback panicked
    monitor.check_health();
    assert_eq!(delivered.load(Ordering::SeqCst), 2);
}

#[test]
fn test_healthy_reports_are_not_delivered() {
    let monitor = HealthMonitor::new(memory_backend(), HealthThresholds::default());
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    monitor.add_alert_callback(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    monitor.check_health();
    assert_eq!(delivered.load(Ordering::SeqCst), 0);
}

#[test]
fn test_last_report_tracks_latest_check() {
    let backend = memory_backend();
    let monitor = HealthMonitor::new(backend.clone(), HealthThresholds::default());
    assert!(monitor.get_last_report().is_none());

    let first = monitor.check_health();
    assert!(first.is_healthy());

    for i in 0..5 {
        backend.get(&format!("k{}", i), CacheLayer::Any);
    }
    let second = monitor.check_health();
    assert_eq!(second.status, HealthStatus::Warning);

    let last = monitor.get_last_report().unwrap();
    assert!(Arc::ptr_eq(&last, &second));
    assert!(last.timestamp >= first.timestamp);
}

#[test]
fn test_custom_thresholds() {
    let backend = memory_backend();
    for i in 0..10 {
        backend.get(&format!("k{}", i), CacheLayer::Any);
    }

    let lenient = HealthThresholds {
        min_hit_rate: 0.0,
        ..Default::default()
    };
    let monitor = HealthMonitor::new(backend, lenient);
    assert!(monitor.check_health().is_healthy());
}
