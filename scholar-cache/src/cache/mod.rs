//! # Tiered Response Cache
//!
//! Caches API responses in two layers behind one interface:
//!
//! - **L1** ([`memory::MemoryLayer`]): in-process map with LRU eviction by
//!   byte budget
//! - **L2** ([`persistent::PersistentLayer`]): LMDB environment under
//!   `{cache_dir}/l2`, surviving restarts
//!
//! ## Keys
//!
//! Keys are `{category}:v{namespace_version}:{token}` where the token is a
//! hash of the operation name and its normalized parameters, so equivalent
//! requests share an entry. Bumping `namespace_version` orphans every
//! existing key at once.
//!
//! ## Example
//!
//! ```no_run
//! use scholar_cache::{CacheBackend, CacheConfig, CacheLayer, Category, SetOptions};
//! use serde_json::json;
//!
//! # fn example() -> scholar_cache::Result<()> {
//! let cache = CacheBackend::open(CacheConfig::small("/var/cache/scholar"))?;
//!
//! let mut params = serde_json::Map::new();
//! params.insert("query".into(), json!("CRISPR"));
//! let key = cache.make_key(Category::Search, "esearch", &params);
//!
//! cache.set(&key, json!({"ids": [1, 2, 3]}), &SetOptions::for_category(Category::Search));
//! assert!(cache.get(&key, CacheLayer::Any).is_some());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod entry;
pub mod invalidation;
pub mod key;
pub mod memory;
pub mod persistent;
pub mod types;

pub use backend::{BackendHealth, BackendStatus, CacheBackend, SetOptions};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{CacheEntry, Lookup};
pub use invalidation::{GlobPattern, InvalidationReason};
pub use key::{make_key, normalize_params, CacheKeyBuilder};
pub use persistent::PersistentLayer;
pub use types::{CacheKey, CacheLayer, CacheStats, CacheValue, Category, LayerStats, StorageUsage};
