//! Tiered cache coordination
//!
//! [`CacheBackend`] presents one key/value API over the in-process layer (L1)
//! and the LMDB layer (L2):
//!
//! - reads probe L1, then L2, and promote L2 hits into L1
//! - writes go through to both layers; one layer failing does not stop the other
//! - bulk invalidation by tag, glob pattern or age sweeps both layers
//!
//! No operation here returns an error. Failures are logged, counted in the
//! failing layer's `errors` and surface as `None`, `false` or `0`.

use crate::cache::config::CacheConfig;
use crate::cache::entry::{CacheEntry, Lookup};
use crate::cache::invalidation::{GlobPattern, InvalidationReason};
use crate::cache::key;
use crate::cache::memory::MemoryLayer;
use crate::cache::persistent::{LmdbStore, PersistentLayer};
use crate::cache::types::{CacheKey, CacheLayer, CacheStats, CacheValue, Category, LayerStats, StorageUsage};
use crate::error::{CacheError, Result};
use crate::health::StatsSource;
use crate::metrics::{CacheMetrics, Layer, MetricEvent};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Hit rate under which `get_health` warns, once there is traffic
const HEALTH_MIN_HIT_RATE: f64 = 0.5;
const HEALTH_MAX_ERROR_RATE: f64 = 0.05;
const HEALTH_MAX_UTILIZATION: f64 = 0.9;

/// Options for a single write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    /// Explicit TTL; overrides the category and default TTLs
    pub ttl: Option<Duration>,
    /// Grouping label for [`CacheBackend::evict`]
    pub tag: Option<String>,
    /// Data category used to pick a TTL
    pub category: Option<Category>,
    pub layer: CacheLayer,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_category(category: Category) -> Self {
        Self {
            category: Some(category),
            ..Default::default()
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn layer(mut self, layer: CacheLayer) -> Self {
        self.layer = layer;
        self
    }
}

/// Result of the backend's own lightweight health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Healthy,
    Degraded,
    Disabled,
    Error,
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendStatus::Healthy => write!(f, "healthy"),
            BackendStatus::Degraded => write!(f, "degraded"),
            BackendStatus::Disabled => write!(f, "disabled"),
            BackendStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub status: BackendStatus,
    pub hit_rate: f64,
    /// Highest utilization across the available layers
    pub size_utilization: f64,
    pub error_rate: f64,
    pub warnings: Vec<String>,
}

/// Two-layer cache with write-through and L2 → L1 promotion
pub struct CacheBackend {
    config: CacheConfig,
    l1: MemoryLayer,
    l2: RwLock<PersistentLayer>,
    metrics: CacheMetrics,
}

impl CacheBackend {
    /// Create a backend over an already-opened persistent layer
    ///
    /// Fails only if `config` is invalid.
    pub fn new(config: CacheConfig, persistent: PersistentLayer) -> Result<Self> {
        config.validate()?;

        info!(
            enabled = config.enabled,
            l2 = persistent.is_available(),
            namespace_version = config.namespace_version,
            "Initializing cache backend"
        );

        Ok(Self {
            l1: MemoryLayer::new(config.l1_size_limit_bytes),
            l2: RwLock::new(persistent),
            metrics: CacheMetrics::new(),
            config,
        })
    }

    /// Validate `config`, open L2 as configured and create the backend
    pub fn open(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let persistent = PersistentLayer::open(&config);
        Self::new(config, persistent)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Whether L2 is currently attached
    pub fn has_l2(&self) -> bool {
        self.l2.read().map(|l2| l2.is_available()).unwrap_or(false)
    }

    /// Normalized key for a request under this backend's namespace version
    pub fn make_key(&self, category: Category, operation: &str, params: &Map<String, Value>) -> CacheKey {
        key::make_key(category, self.config.namespace_version, operation, params)
    }

    fn with_l2<T>(&self, f: impl FnOnce(&LmdbStore) -> T) -> Option<T> {
        let guard = self.l2.read().ok()?;
        guard.store().map(f)
    }

    fn record_failure(&self, layer: Layer, started: Instant, operation: &str, error: &CacheError) {
        warn!(%layer, operation, error = %error, "Cache layer operation failed");
        self.metrics.record(
            layer,
            MetricEvent::Error,
            started.elapsed().as_secs_f64() * 1000.0,
        );
    }

    /// Read a value
    ///
    /// With [`CacheLayer::Any`], an L2 hit is copied into L1 before returning.
    pub fn get(&self, key: &str, layer: CacheLayer) -> Option<CacheValue> {
        if !self.config.enabled {
            return None;
        }

        if layer.includes_l1() {
            let timer = self.metrics.timer(Layer::L1);
            match self.l1.get(key) {
                Ok(Lookup::Hit(entry)) => {
                    timer.finish(MetricEvent::Hit);
                    debug!(key, "L1 hit");
                    return Some(entry.value);
                }
                Ok(Lookup::Miss) => timer.finish(MetricEvent::Miss),
                Ok(Lookup::Expired) => {
                    timer.finish(MetricEvent::Miss);
                    self.metrics.record_evictions(Layer::L1, 1);
                }
                Err(e) => {
                    warn!(key, error = %e, "L1 read failed");
                    timer.finish(MetricEvent::Error);
                }
            }
        }

        if !layer.includes_l2() {
            return None;
        }

        let entry = self.with_l2(|store| {
            let timer = self.metrics.timer(Layer::L2);
            match store.get(key) {
                Ok(Lookup::Hit(entry)) => {
                    timer.finish(MetricEvent::Hit);
                    debug!(key, "L2 hit");
                    Some(entry)
                }
                Ok(Lookup::Miss) => {
                    timer.finish(MetricEvent::Miss);
                    None
                }
                Ok(Lookup::Expired) => {
                    timer.finish(MetricEvent::Miss);
                    self.metrics.record_evictions(Layer::L2, 1);
                    None
                }
                Err(e) => {
                    warn!(key, error = %e, "L2 read failed");
                    timer.finish(MetricEvent::Error);
                    None
                }
            }
        })??;

        if layer == CacheLayer::Any {
            self.promote(key, entry.clone());
        }
        Some(entry.value)
    }

    /// Copy an L2 entry into L1, keeping its expiry
    fn promote(&self, key: &str, mut entry: CacheEntry) {
        entry.mark_accessed();
        let timer = self.metrics.timer(Layer::L1);
        match self.l1.insert(key, entry) {
            Ok(outcome) => {
                timer.finish(MetricEvent::Set);
                self.metrics.record_evictions(Layer::L1, outcome.evicted);
                debug!(key, "Promoted L2 entry into L1");
            }
            Err(e) => {
                debug!(key, error = %e, "Promotion into L1 skipped");
                timer.finish(MetricEvent::Error);
            }
        }
    }

    /// Write a value
    ///
    /// Returns false if the cache is disabled or no targeted layer accepted the write.
    pub fn set(&self, key: &str, value: impl Into<CacheValue>, options: &SetOptions) -> bool {
        if !self.config.enabled {
            return false;
        }

        let ttl = self.config.resolve_ttl(options.ttl, options.category);
        let entry = CacheEntry::new(value.into(), ttl, options.tag.clone());
        let mut written = false;

        if options.layer.includes_l1() {
            let timer = self.metrics.timer(Layer::L1);
            match self.l1.insert(key, entry.clone()) {
                Ok(outcome) => {
                    timer.finish(MetricEvent::Set);
                    self.metrics.record_evictions(Layer::L1, outcome.evicted);
                    written = true;
                }
                Err(e) => {
                    warn!(key, error = %e, "L1 write failed");
                    timer.finish(MetricEvent::Error);
                }
            }
        }

        if options.layer.includes_l2() {
            let l2_written = self.with_l2(|store| {
                let timer = self.metrics.timer(Layer::L2);
                match store.put(key, &entry) {
                    Ok(()) => {
                        timer.finish(MetricEvent::Set);
                        true
                    }
                    Err(e) => {
                        warn!(key, error = %e, "L2 write failed");
                        timer.finish(MetricEvent::Error);
                        false
                    }
                }
            });
            written |= l2_written.unwrap_or(false);
        }

        if written {
            debug!(key, ttl_secs = ttl.as_secs(), layer = %options.layer, "Cached value");
        }
        written
    }

    /// Read and deserialize a JSON value. Anything that does not decode as `T` is a miss
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get(key, CacheLayer::Any)? {
            CacheValue::Json(value) => serde_json::from_value(value).ok(),
            CacheValue::Bytes(bytes) => serde_json::from_slice(&bytes).ok(),
        }
    }

    /// Serialize and write a value as JSON
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T, options: &SetOptions) -> bool {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, CacheValue::Json(json), options),
            Err(e) => {
                warn!(key, error = %e, "Value does not serialize, not caching");
                false
            }
        }
    }

    /// Remove a key. Returns whether any layer held it
    pub fn delete(&self, key: &str, layer: CacheLayer) -> bool {
        if !self.config.enabled {
            return false;
        }

        let mut deleted = false;

        if layer.includes_l1() {
            let timer = self.metrics.timer(Layer::L1);
            match self.l1.remove(key) {
                Ok(found) => {
                    timer.finish(MetricEvent::Delete);
                    deleted |= found;
                }
                Err(e) => {
                    warn!(key, error = %e, "L1 delete failed");
                    timer.finish(MetricEvent::Error);
                }
            }
        }

        if layer.includes_l2() {
            let found = self.with_l2(|store| {
                let timer = self.metrics.timer(Layer::L2);
                match store.delete(key) {
                    Ok(found) => {
                        timer.finish(MetricEvent::Delete);
                        found
                    }
                    Err(e) => {
                        warn!(key, error = %e, "L2 delete failed");
                        timer.finish(MetricEvent::Error);
                        false
                    }
                }
            });
            deleted |= found.unwrap_or(false);
        }

        deleted
    }

    /// Drop every entry in the given layer(s)
    pub fn clear(&self, layer: CacheLayer) -> bool {
        if !self.config.enabled {
            return false;
        }

        let mut ok = true;

        if layer.includes_l1() {
            let started = Instant::now();
            match self.l1.clear() {
                Ok(count) => self.metrics.record_evictions(Layer::L1, count),
                Err(e) => {
                    self.record_failure(Layer::L1, started, "clear", &e);
                    ok = false;
                }
            }
        }

        if layer.includes_l2() {
            let result = self.with_l2(|store| {
                let started = Instant::now();
                store.clear().map_err(|e| (started, e))
            });
            match result {
                Some(Ok(count)) => self.metrics.record_evictions(Layer::L2, count),
                Some(Err((started, e))) => {
                    self.record_failure(Layer::L2, started, "clear", &e);
                    ok = false;
                }
                None => {}
            }
        }

        info!(layer = %layer, "Cache cleared");
        ok
    }

    /// Remove matching entries from both layers and return the number of
    /// distinct keys removed
    fn sweep<F>(&self, reason: InvalidationReason, predicate: F) -> u64
    where
        F: Fn(&str, &CacheEntry) -> bool,
    {
        if !self.config.enabled {
            return 0;
        }

        let mut removed: HashSet<CacheKey> = HashSet::new();

        let started = Instant::now();
        match self.l1.remove_where(&predicate) {
            Ok(keys) => {
                self.metrics.record_evictions(Layer::L1, keys.len() as u64);
                removed.extend(keys);
            }
            Err(e) => self.record_failure(Layer::L1, started, "sweep", &e),
        }

        let l2_result = self.with_l2(|store| {
            let started = Instant::now();
            store.remove_where(&predicate).map_err(|e| (started, e))
        });
        match l2_result {
            Some(Ok(keys)) => {
                self.metrics.record_evictions(Layer::L2, keys.len() as u64);
                removed.extend(keys);
            }
            Some(Err((started, e))) => self.record_failure(Layer::L2, started, "sweep", &e),
            None => {}
        }

        info!(reason = %reason, count = removed.len(), "Invalidated cache entries");
        removed.len() as u64
    }

    /// Remove every entry carrying `tag`
    pub fn evict(&self, tag: &str) -> u64 {
        self.sweep(
            InvalidationReason::TagMatch {
                tag: tag.to_string(),
            },
            |_, entry| entry.has_tag(tag),
        )
    }

    /// Remove every key matching a shell-style glob (`*`, `?`, `[...]`)
    pub fn invalidate_pattern(&self, pattern: &str) -> u64 {
        let glob = match GlobPattern::new(pattern) {
            Ok(glob) => glob,
            Err(e) => {
                warn!(pattern, error = %e, "Ignoring invalid invalidation pattern");
                return 0;
            }
        };

        self.sweep(
            InvalidationReason::PatternMatch {
                pattern: pattern.to_string(),
            },
            |key, _| glob.matches(key),
        )
    }

    /// Remove every key of a category in the current namespace
    pub fn invalidate_category(&self, category: Category) -> u64 {
        self.invalidate_pattern(&key::namespace_glob(category, self.config.namespace_version))
    }

    /// Remove entries written more than `max_age` ago, regardless of TTL
    pub fn invalidate_older_than(&self, max_age: Duration) -> u64 {
        self.sweep(
            InvalidationReason::Age {
                max_age_secs: max_age.as_secs(),
            },
            |_, entry| entry.is_older_than(max_age),
        )
    }

    /// Bulk write. Returns how many entries were written; individual failures
    /// are skipped
    pub fn warm_cache<I, V>(&self, entries: I, options: &SetOptions) -> u64
    where
        I: IntoIterator<Item = (CacheKey, V)>,
        V: Into<CacheValue>,
    {
        let mut written = 0;
        let mut failed = 0;
        for (key, value) in entries {
            if self.set(&key, value, options) {
                written += 1;
            } else {
                failed += 1;
            }
        }

        info!(written, failed, tag = ?options.tag, "Cache warming finished");
        written
    }

    /// Live keys across both layers, sorted and deduplicated, at most `limit`
    pub fn get_keys(&self, pattern: Option<&str>, limit: usize) -> Vec<CacheKey> {
        if !self.config.enabled || limit == 0 {
            return Vec::new();
        }

        let glob = match pattern.map(GlobPattern::new).transpose() {
            Ok(glob) => glob,
            Err(e) => {
                warn!(?pattern, error = %e, "Ignoring invalid key pattern");
                return Vec::new();
            }
        };

        let mut keys: BTreeSet<CacheKey> = BTreeSet::new();

        match self.l1.keys(glob.as_ref(), limit) {
            Ok(found) => keys.extend(found),
            Err(e) => warn!(error = %e, "Listing L1 keys failed"),
        }

        if keys.len() < limit {
            match self.with_l2(|store| store.keys(glob.as_ref(), limit)) {
                Some(Ok(found)) => keys.extend(found),
                Some(Err(e)) => warn!(error = %e, "Listing L2 keys failed"),
                None => {}
            }
        }

        keys.into_iter().take(limit).collect()
    }

    /// Purge expired entries from both layers and flush L2
    pub fn compact(&self) -> bool {
        if !self.config.enabled {
            return false;
        }

        let started = Instant::now();
        match self.l1.purge_expired() {
            Ok(count) => self.metrics.record_evictions(Layer::L1, count),
            Err(e) => self.record_failure(Layer::L1, started, "compact", &e),
        }

        let l2_result = self.with_l2(|store| {
            let started = Instant::now();
            store
                .purge_expired()
                .and_then(|count| store.sync().map(|_| count))
                .map_err(|e| (started, e))
        });
        match l2_result {
            Some(Ok(count)) => self.metrics.record_evictions(Layer::L2, count),
            Some(Err((started, e))) => self.record_failure(Layer::L2, started, "compact", &e),
            None => {}
        }

        info!("Cache compacted");
        true
    }

    /// Metrics of both layers plus their occupancy
    pub fn get_stats(&self) -> Result<CacheStats> {
        let snapshot = self.metrics.snapshot()?;
        let l1 = self.l1.usage()?;

        let mut usage = StorageUsage {
            l1_entries: l1.entries,
            l1_size_bytes: l1.size_bytes,
            l1_limit_bytes: l1.limit_bytes,
            ..Default::default()
        };

        let l2_usage = self.with_l2(|store| -> Result<(u64, u64, u64)> {
            Ok((store.len()?, store.disk_usage()?, store.map_size()))
        });
        match l2_usage {
            Some(Ok((entries, size_bytes, limit_bytes))) => {
                usage.l2_available = true;
                usage.l2_entries = entries;
                usage.l2_size_bytes = size_bytes;
                usage.l2_limit_bytes = limit_bytes;
            }
            Some(Err(e)) => warn!(error = %e, "Reading L2 usage failed"),
            None => {}
        }

        Ok(CacheStats {
            overall: snapshot.overall,
            layers: LayerStats {
                l1: snapshot.l1,
                l2: snapshot.l2,
            },
            usage,
            namespace_version: self.config.namespace_version,
            collected_at: Utc::now(),
        })
    }

    /// Quick self check; never fails
    pub fn get_health(&self) -> BackendHealth {
        let stats = match self.get_stats() {
            Ok(stats) => stats,
            Err(e) => {
                return BackendHealth {
                    status: BackendStatus::Error,
                    hit_rate: 0.0,
                    size_utilization: 0.0,
                    error_rate: 0.0,
                    warnings: vec![format!("stats unavailable: {}", e)],
                }
            }
        };

        let hit_rate = stats.overall.hit_rate;
        let error_rate = stats.overall.error_rate;
        let size_utilization = stats
            .usage
            .l1_utilization()
            .max(stats.usage.l2_utilization());

        if !self.config.enabled {
            return BackendHealth {
                status: BackendStatus::Disabled,
                hit_rate,
                size_utilization,
                error_rate,
                warnings: vec!["cache disabled".to_string()],
            };
        }

        let mut warnings = Vec::new();
        if stats.overall.total_requests > 0 && hit_rate < HEALTH_MIN_HIT_RATE {
            warnings.push(format!("low hit rate: {:.2}", hit_rate));
        }
        if error_rate > HEALTH_MAX_ERROR_RATE {
            warnings.push(format!("high error rate: {:.2}", error_rate));
        }
        if size_utilization > HEALTH_MAX_UTILIZATION {
            warnings.push(format!("high size utilization: {:.2}", size_utilization));
        }
        if self.config.enable_l2 && !stats.usage.l2_available {
            warnings.push("persistent layer unavailable".to_string());
        }

        BackendHealth {
            status: if warnings.is_empty() {
                BackendStatus::Healthy
            } else {
                BackendStatus::Degraded
            },
            hit_rate,
            size_utilization,
            error_rate,
            warnings,
        }
    }

    /// Flush and detach L2. The backend keeps serving from L1
    pub fn close(&self) {
        let mut l2 = match self.l2.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(store) = l2.store() {
            if let Err(e) = store.sync() {
                warn!(error = %e, "Flushing L2 on close failed");
            }
            info!(path = %store.path().display(), "Closed L2 store");
        }
        *l2 = PersistentLayer::unavailable("closed");
    }
}

impl StatsSource for CacheBackend {
    fn get_stats(&self) -> Result<CacheStats> {
        CacheBackend::get_stats(self)
    }
}
