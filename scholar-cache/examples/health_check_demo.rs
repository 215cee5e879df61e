//! Health Check Demo Application
//!
//! Drives a tiered cache with a synthetic workload and prints the health
//! report after each phase.
//!
//! Usage:
//!   cargo run --example health_check_demo
//!
//! Environment variables:
//!   SCHOLAR_CACHE_DIR - cache directory (default: a temporary directory)
//!   RUST_LOG          - log filter (default: info)

use scholar_cache::{
    ArtifactInfo, ArtifactStore, ArtifactStoreConfig, CacheBackend, CacheConfig, CacheKeyBuilder,
    CacheLayer, Category, HealthMonitor, HealthReport, HealthThresholds, SetOptions,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn print_report(phase: &str, report: &HealthReport) {
    info!(
        "{}: status={} http={} issues={}",
        phase,
        report.status,
        report.status.to_http_status_code(),
        report.issues.len()
    );
    for issue in &report.issues {
        info!("  {}", issue);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    dotenv::dotenv().ok();

    info!("=== Scholar Cache Health Check Demo ===");

    let scratch = tempfile::tempdir()?;
    let cache_dir = std::env::var("SCHOLAR_CACHE_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| scratch.path().to_path_buf());

    let config = CacheConfig::builder()
        .cache_dir(&cache_dir)
        .l1_size_limit_mb(8)
        .l2_size_limit_mb(64)
        .ttl_jitter(0.1)
        .build()?;
    let cache = Arc::new(CacheBackend::open(config)?);
    info!("Cache opened at {} (L2 attached: {})", cache_dir.display(), cache.has_l2());

    let monitor = HealthMonitor::new(cache.clone(), HealthThresholds::default());
    monitor.add_alert_callback(|report| {
        warn!("ALERT: cache is {} ({} issue(s))", report.status, report.issues.len());
        Ok(())
    });

    print_report("idle", &monitor.check_health());

    // Cold cache: every lookup misses
    let version = cache.config().namespace_version;
    for pmid in 0..50 {
        let key = CacheKeyBuilder::new(Category::Record, "efetch")
            .param("id", pmid)
            .build(version);
        if cache.get(&key, CacheLayer::Any).is_none() {
            cache.set(
                &key,
                json!({"pmid": pmid, "title": format!("Paper {}", pmid)}),
                &SetOptions::for_category(Category::Record).tag("demo"),
            );
        }
    }
    print_report("cold", &monitor.check_health());

    // Warm cache: repeat the same lookups
    for _ in 0..3 {
        for pmid in 0..50 {
            let key = CacheKeyBuilder::new(Category::Record, "efetch")
                .param("id", pmid)
                .build(version);
            cache.get(&key, CacheLayer::Any);
        }
    }
    print_report("warm", &monitor.check_health());

    let health = cache.get_health();
    info!(
        "Backend self-check: {} (hit rate {:.2}, utilization {:.4})",
        health.status, health.hit_rate, health.size_utilization
    );

    let stats = cache.get_stats()?;
    info!("Stats: {}", serde_json::to_string_pretty(&stats.to_json())?);

    info!("Evicted {} demo entries", cache.evict("demo"));

    // Artifact store next to the response cache
    let artifacts = ArtifactStore::open(
        ArtifactStoreConfig::new(cache_dir.join("artifacts")).size_limit_mb(16),
    )?;
    let pdf = vec![0x25u8; 256 * 1024];
    let meta = artifacts.store(
        "pmc:PMC0000001:pdf",
        &pdf,
        ArtifactInfo::new().mime_type("application/pdf"),
    )?;
    artifacts.store("doi:10.1000/demo", &pdf, ArtifactInfo::new())?;
    let usage = artifacts.get_disk_usage();
    info!(
        "Artifact {} stored; {} blob(s) for {} id(s), {:.2} MB used",
        meta.hash_value, usage.artifact_count, usage.index_count, usage.used_mb
    );

    cache.close();
    info!("=== Demo complete ===");
    Ok(())
}
