//! Configuration for the cache system

use crate::cache::types::Category;
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

const MB: u64 = 1024 * 1024;

/// Prefix for environment variables read by [`CacheConfig::from_env`]
pub const ENV_PREFIX: &str = "SCHOLAR_CACHE_";

/// Configuration for the tiered cache
///
/// Construct through [`CacheConfig::builder`] (validated on `build`) or take
/// [`CacheConfig::default`] and adjust fields; [`crate::CacheBackend::new`]
/// validates again, so an invalid struct never reaches a running cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Master switch. A disabled cache misses every read and skips every write
    pub enabled: bool,

    /// Root directory for persistent state (the L2 environment lives in `{cache_dir}/l2`)
    pub cache_dir: PathBuf,

    /// Byte budget of the in-process layer
    pub l1_size_limit_bytes: u64,

    /// Byte budget (LMDB map size) of the persistent layer
    pub l2_size_limit_bytes: u64,

    /// Whether to open the persistent layer at all
    pub enable_l2: bool,

    /// TTL used when neither an explicit TTL nor a category TTL applies
    pub default_ttl_seconds: u64,

    /// Per-category TTLs
    pub ttl_by_category: BTreeMap<Category, u64>,

    /// Embedded in every normalized key; bumping it orphans the previous namespace
    pub namespace_version: u32,

    /// TTL jitter factor (0.0 - 1.0)
    /// Adds random variation so entries written together don't expire together
    pub ttl_jitter: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: std::env::temp_dir().join("scholar-cache"),
            l1_size_limit_bytes: 100 * MB,
            l2_size_limit_bytes: 1024 * MB,
            enable_l2: true,
            // 1 day
            default_ttl_seconds: 86_400,
            ttl_by_category: default_category_ttls(),
            namespace_version: 1,
            ttl_jitter: 0.0,
        }
    }
}

fn default_category_ttls() -> BTreeMap<Category, u64> {
    let mut ttls = BTreeMap::new();
    // Search results change as new papers are indexed
    ttls.insert(Category::Search, 300);
    ttls.insert(Category::Record, 86_400);
    // Full text of a published article is effectively immutable
    ttls.insert(Category::Fulltext, 30 * 86_400);
    ttls.insert(Category::Error, 30);
    ttls
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.namespace_version < 1 {
            return Err(CacheError::Config(format!(
                "namespace_version must be >= 1, got {}",
                self.namespace_version
            )));
        }

        if self.l1_size_limit_bytes == 0 {
            return Err(CacheError::Config(
                "l1_size_limit must be greater than 0".to_string(),
            ));
        }

        if self.enable_l2 {
            if self.l2_size_limit_bytes == 0 {
                return Err(CacheError::Config(
                    "l2_size_limit must be greater than 0 when L2 is enabled".to_string(),
                ));
            }
            if self.l1_size_limit_bytes > self.l2_size_limit_bytes {
                return Err(CacheError::Config(format!(
                    "l1_size_limit ({} bytes) must not exceed l2_size_limit ({} bytes)",
                    self.l1_size_limit_bytes, self.l2_size_limit_bytes
                )));
            }
        }

        if self.default_ttl_seconds == 0 {
            return Err(CacheError::Config(
                "default_ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if let Some((category, _)) = self.ttl_by_category.iter().find(|(_, ttl)| **ttl == 0) {
            return Err(CacheError::Config(format!(
                "TTL for category {} must be greater than 0",
                category
            )));
        }

        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err(CacheError::Config(
                "ttl_jitter must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve the TTL for a write: explicit > category > default
    pub fn resolve_ttl(&self, explicit: Option<Duration>, category: Option<Category>) -> Duration {
        if let Some(ttl) = explicit {
            return ttl;
        }

        let secs = category
            .and_then(|c| self.ttl_by_category.get(&c).copied())
            .unwrap_or(self.default_ttl_seconds);

        self.with_jitter(Duration::from_secs(secs))
    }

    /// Apply the configured jitter to a base TTL
    pub fn with_jitter(&self, base: Duration) -> Duration {
        if self.ttl_jitter == 0.0 {
            return base;
        }

        let base_secs = base.as_secs_f64();
        let jitter_range = base_secs * self.ttl_jitter;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_secs = (base_secs + jitter).max(1.0);

        Duration::from_secs_f64(final_secs)
    }

    /// Directory holding the LMDB environment of the persistent layer
    pub fn l2_dir(&self) -> PathBuf {
        self.cache_dir.join("l2")
    }

    /// Build a configuration from `SCHOLAR_CACHE_*` environment variables,
    /// after loading a `.env` file if one exists
    ///
    /// Recognized: `ENABLED`, `DIR`, `L1_SIZE_MB`, `L2_SIZE_MB`, `ENABLE_L2`,
    /// `DEFAULT_TTL_SECONDS`, `NAMESPACE_VERSION`, `TTL_JITTER` and
    /// `TTL_{SEARCH,RECORD,FULLTEXT,ERROR}`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`CacheConfig::from_env`] with an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{}{}", ENV_PREFIX, suffix));
        let mut builder = CacheConfig::builder();

        if let Some(v) = var("ENABLED") {
            builder = builder.enabled(parse_bool("ENABLED", &v)?);
        }
        if let Some(v) = var("DIR") {
            builder = builder.cache_dir(v);
        }
        if let Some(v) = var("L1_SIZE_MB") {
            builder = builder.l1_size_limit_mb(parse_num("L1_SIZE_MB", &v)?);
        }
        if let Some(v) = var("L2_SIZE_MB") {
            builder = builder.l2_size_limit_mb(parse_num("L2_SIZE_MB", &v)?);
        }
        if let Some(v) = var("ENABLE_L2") {
            builder = builder.enable_l2(parse_bool("ENABLE_L2", &v)?);
        }
        if let Some(v) = var("DEFAULT_TTL_SECONDS") {
            builder = builder.default_ttl(Duration::from_secs(parse_num("DEFAULT_TTL_SECONDS", &v)?));
        }
        if let Some(v) = var("NAMESPACE_VERSION") {
            builder = builder.namespace_version(parse_num("NAMESPACE_VERSION", &v)?);
        }
        if let Some(v) = var("TTL_JITTER") {
            builder = builder.ttl_jitter(parse_num("TTL_JITTER", &v)?);
        }
        for category in Category::ALL {
            let name = format!("TTL_{}", category.as_str().to_ascii_uppercase());
            if let Some(v) = var(&name) {
                let secs: u64 = parse_num(&name, &v)?;
                builder = builder.category_ttl(category, Duration::from_secs(secs));
            }
        }

        builder.build()
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CacheError::Config(format!(
            "{}{} must be a boolean, got {:?}",
            ENV_PREFIX, name, raw
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        CacheError::Config(format!("{}{} must be a number, got {:?}", ENV_PREFIX, name, raw))
    })
}

/// Builder for cache configuration with validation
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    enabled: Option<bool>,
    cache_dir: Option<PathBuf>,
    l1_size_limit_bytes: Option<u64>,
    l2_size_limit_bytes: Option<u64>,
    enable_l2: Option<bool>,
    default_ttl: Option<Duration>,
    category_ttls: Vec<(Category, Duration)>,
    namespace_version: Option<u32>,
    ttl_jitter: Option<f64>,
    /// First megabyte setting that did not fit in a u64 byte count
    overflow: Option<String>,
}

/// Megabytes to bytes, or the message `build` reports
fn mb_to_bytes(name: &str, mb: u64) -> std::result::Result<u64, String> {
    mb.checked_mul(MB)
        .ok_or_else(|| format!("{} of {} MB overflows a byte count", name, mb))
}

impl CacheConfigBuilder {
    /// Enable or disable the cache entirely
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Set the root directory for persistent state
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Set the L1 budget in megabytes
    pub fn l1_size_limit_mb(mut self, mb: u64) -> Self {
        match mb_to_bytes("l1_size_limit", mb) {
            Ok(bytes) => self.l1_size_limit_bytes = Some(bytes),
            Err(msg) => {
                self.overflow.get_or_insert(msg);
            }
        }
        self
    }

    /// Set the L1 budget in bytes
    pub fn l1_size_limit_bytes(mut self, bytes: u64) -> Self {
        self.l1_size_limit_bytes = Some(bytes);
        self
    }

    /// Set the L2 budget in megabytes
    pub fn l2_size_limit_mb(mut self, mb: u64) -> Self {
        match mb_to_bytes("l2_size_limit", mb) {
            Ok(bytes) => self.l2_size_limit_bytes = Some(bytes),
            Err(msg) => {
                self.overflow.get_or_insert(msg);
            }
        }
        self
    }

    /// Set the L2 budget in bytes
    pub fn l2_size_limit_bytes(mut self, bytes: u64) -> Self {
        self.l2_size_limit_bytes = Some(bytes);
        self
    }

    /// Enable or disable the persistent layer
    pub fn enable_l2(mut self, enable: bool) -> Self {
        self.enable_l2 = Some(enable);
        self
    }

    /// Set the fallback TTL
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Override the TTL of one category
    pub fn category_ttl(mut self, category: Category, ttl: Duration) -> Self {
        self.category_ttls.push((category, ttl));
        self
    }

    /// Set the key namespace version (must be >= 1)
    pub fn namespace_version(mut self, version: u32) -> Self {
        self.namespace_version = Some(version);
        self
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    /// Build and validate the cache configuration
    pub fn build(self) -> Result<CacheConfig> {
        if let Some(msg) = self.overflow {
            return Err(CacheError::Config(msg));
        }
        let defaults = CacheConfig::default();

        let mut ttl_by_category = defaults.ttl_by_category;
        for (category, ttl) in self.category_ttls {
            ttl_by_category.insert(category, ttl.as_secs());
        }

        let config = CacheConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            cache_dir: self.cache_dir.unwrap_or(defaults.cache_dir),
            l1_size_limit_bytes: self
                .l1_size_limit_bytes
                .unwrap_or(defaults.l1_size_limit_bytes),
            l2_size_limit_bytes: self
                .l2_size_limit_bytes
                .unwrap_or(defaults.l2_size_limit_bytes),
            enable_l2: self.enable_l2.unwrap_or(defaults.enable_l2),
            default_ttl_seconds: self
                .default_ttl
                .map(|d| d.as_secs())
                .unwrap_or(defaults.default_ttl_seconds),
            ttl_by_category,
            namespace_version: self.namespace_version.unwrap_or(defaults.namespace_version),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Preset configurations for common use cases
impl CacheConfig {
    /// In-process cache only; nothing touches the disk
    pub fn memory_only() -> Self {
        Self {
            enable_l2: false,
            ..Default::default()
        }
    }

    /// Configuration for memory-constrained environments
    pub fn small(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            l1_size_limit_bytes: 16 * MB,
            l2_size_limit_bytes: 128 * MB,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert!(config.enable_l2);
        assert_eq!(config.namespace_version, 1);
        assert_eq!(config.ttl_by_category.get(&Category::Search), Some(&300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut invalid = CacheConfig::default();
        invalid.namespace_version = 0;
        assert!(invalid.validate().unwrap_err().is_config());

        let mut invalid = CacheConfig::default();
        invalid.l1_size_limit_bytes = 2 * invalid.l2_size_limit_bytes;
        assert!(invalid.validate().is_err());

        // The same limits are fine once L2 is off
        invalid.enable_l2 = false;
        assert!(invalid.validate().is_ok());

        let mut invalid = CacheConfig::default();
        invalid.ttl_jitter = 1.5;
        assert!(invalid.validate().is_err());

        let mut invalid = CacheConfig::default();
        invalid.ttl_by_category.insert(Category::Error, 0);
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_builder_rejects_zero_namespace() {
        let result = CacheConfig::builder().namespace_version(0).build();
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .cache_dir("/tmp/x")
            .l1_size_limit_mb(8)
            .l2_size_limit_mb(64)
            .default_ttl(Duration::from_secs(600))
            .category_ttl(Category::Search, Duration::from_secs(60))
            .namespace_version(3)
            .build()
            .unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/x"));
        assert_eq!(config.l1_size_limit_bytes, 8 * MB);
        assert_eq!(config.l2_size_limit_bytes, 64 * MB);
        assert_eq!(config.default_ttl_seconds, 600);
        assert_eq!(config.ttl_by_category[&Category::Search], 60);
        assert_eq!(config.ttl_by_category[&Category::Record], 86_400);
        assert_eq!(config.namespace_version, 3);
    }

    #[test]
    fn test_resolve_ttl_precedence() {
        let config = CacheConfig::default();

        assert_eq!(
            config.resolve_ttl(Some(Duration::from_secs(5)), Some(Category::Search)),
            Duration::from_secs(5)
        );
        assert_eq!(
            config.resolve_ttl(None, Some(Category::Search)),
            Duration::from_secs(300)
        );
        assert_eq!(config.resolve_ttl(None, None), Duration::from_secs(86_400));
    }

    #[test]
    fn test_ttl_with_jitter() {
        let config = CacheConfig {
            ttl_jitter: 0.1,
            ..Default::default()
        };

        let ttl = config.with_jitter(Duration::from_secs(3600));
        assert!(ttl.as_secs_f64() >= 3600.0 - 360.0);
        assert!(ttl.as_secs_f64() <= 3600.0 + 360.0);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<String, String> = [
            ("SCHOLAR_CACHE_ENABLE_L2", "false"),
            ("SCHOLAR_CACHE_L1_SIZE_MB", "32"),
            ("SCHOLAR_CACHE_NAMESPACE_VERSION", "4"),
            ("SCHOLAR_CACHE_TTL_FULLTEXT", "120"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = CacheConfig::from_lookup(|name| vars.get(name).cloned()).unwrap();
        assert!(!config.enable_l2);
        assert_eq!(config.l1_size_limit_bytes, 32 * MB);
        assert_eq!(config.namespace_version, 4);
        assert_eq!(config.ttl_by_category[&Category::Fulltext], 120);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result = CacheConfig::from_lookup(|name| {
            (name == "SCHOLAR_CACHE_ENABLED").then(|| "maybe".to_string())
        });
        assert!(result.is_err());

        let result = CacheConfig::from_lookup(|name| {
            (name == "SCHOLAR_CACHE_NAMESPACE_VERSION").then(|| "0".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_oversized_megabyte_limits_are_rejected() {
        let huge = (u64::MAX / MB + 1).to_string();
        for name in ["SCHOLAR_CACHE_L1_SIZE_MB", "SCHOLAR_CACHE_L2_SIZE_MB"] {
            let err = CacheConfig::from_lookup(|n| (n == name).then(|| huge.clone())).unwrap_err();
            assert!(err.is_config(), "{}: {}", name, err);
        }

        let err = CacheConfig::builder()
            .l2_size_limit_mb(u64::MAX)
            .l2_size_limit_mb(64)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("l2_size_limit"));

        let config = CacheConfig::builder()
            .l1_size_limit_mb(u64::MAX / MB)
            .l2_size_limit_mb(u64::MAX / MB)
            .build()
            .unwrap();
        assert_eq!(config.l1_size_limit_bytes, (u64::MAX / MB) * MB);
    }

    #[test]
    fn test_preset_configs() {
        assert!(!CacheConfig::memory_only().enable_l2);
        let small = CacheConfig::small("/tmp/small");
        assert_eq!(small.l1_size_limit_bytes, 16 * MB);
        assert!(small.validate().is_ok());
    }
}
