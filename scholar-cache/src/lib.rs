//! # Scholar Cache (scholar-cache)
//!
//! Caching infrastructure for clients of literature APIs (search endpoints,
//! record lookups, full-text downloads).
//!
//! ## Features
//!
//! - Two-layer response cache: in-memory LRU in front of an LMDB store
//! - Parameter-normalized cache keys with namespace versioning
//! - Per-category TTLs with jitter
//! - Invalidation by tag, glob pattern, category or age
//! - Content-addressed artifact store with deduplication and LRU garbage collection
//! - Per-layer metrics with latency percentiles
//! - Threshold-based health monitoring with alert callbacks
//!
//! Cache operations never fail the caller: a broken layer degrades to misses
//! and skipped writes, counted as errors in the metrics.
//!
//! ## Response Cache
//!
//! ```no_run
//! use scholar_cache::{CacheBackend, CacheConfig, CacheKeyBuilder, CacheLayer, Category, SetOptions};
//! use serde_json::json;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = CacheConfig::builder()
//!         .cache_dir("/var/cache/scholar")
//!         .l1_size_limit_mb(64)
//!         .build()?;
//!     let cache = CacheBackend::open(config)?;
//!
//!     let key = CacheKeyBuilder::new(Category::Record, "efetch")
//!         .param("id", "PMC123456")
//!         .build(cache.config().namespace_version);
//!
//!     cache.set(&key, json!({"title": "..."}), &SetOptions::for_category(Category::Record));
//!     if let Some(value) = cache.get(&key, CacheLayer::Any) {
//!         println!("cached: {:?}", value.as_json());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Artifact Store
//!
//! ```no_run
//! use scholar_cache::{ArtifactInfo, ArtifactStore, ArtifactStoreConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = ArtifactStore::open(ArtifactStoreConfig::new("/var/cache/scholar/artifacts"))?;
//!
//!     let pdf = std::fs::read("paper.pdf")?;
//!     let meta = store.store("pmc:PMC123456:pdf", &pdf, ArtifactInfo::new().mime_type("application/pdf"))?;
//!     println!("stored {} bytes as {}", meta.size, meta.hash_value);
//!
//!     if let Some((content, _)) = store.retrieve("pmc:PMC123456:pdf") {
//!         assert_eq!(content, pdf);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Health Monitoring
//!
//! ```no_run
//! use scholar_cache::{CacheBackend, CacheConfig, HealthMonitor, HealthThresholds};
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let cache = Arc::new(CacheBackend::open(CacheConfig::memory_only())?);
//!     let monitor = HealthMonitor::new(cache.clone(), HealthThresholds::default());
//!
//!     monitor.add_alert_callback(|report| {
//!         eprintln!("cache {}: {} issue(s)", report.status, report.issues.len());
//!         Ok(())
//!     });
//!
//!     let report = monitor.check_health();
//!     println!("HTTP {}", report.status.to_http_status_code());
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod cache;
pub mod error;
pub mod health;
pub mod metrics;

// Re-export main types for convenience
pub use artifacts::{
    ArtifactInfo, ArtifactMetadata, ArtifactStore, ArtifactStoreConfig, CompactReport, DiskUsage,
};
pub use cache::{
    BackendHealth, BackendStatus, CacheBackend, CacheConfig, CacheConfigBuilder, CacheKey,
    CacheKeyBuilder, CacheLayer, CacheStats, CacheValue, Category, PersistentLayer, SetOptions,
    StorageUsage,
};
pub use error::{CacheError, Result};
pub use health::{
    HealthIssue, HealthMonitor, HealthReport, HealthStatus, HealthThresholds, Severity,
    StatsSource,
};
pub use metrics::{
    CacheMetrics, Layer, LatencyStats, LatencySummary, LayerSnapshot, MetricEvent, MetricsSnapshot,
    MetricsTimer, OverallMetrics,
};
