//! Persistent cache layer (L2) backed by LMDB
//!
//! Entries are stored as JSON-encoded [`CacheEntry`] records keyed by the
//! cache key, in a single named database inside `{cache_dir}/l2`.
//!
//! # Availability
//!
//! Whether L2 exists at all is decided once, by [`PersistentLayer::open`].
//! The resulting capability is handed to [`crate::CacheBackend::new`]; an
//! unavailable layer makes the backend run L1-only.

use crate::cache::config::CacheConfig;
use crate::cache::entry::{CacheEntry, Lookup};
use crate::cache::invalidation::{GlobPattern, InvalidationReason};
use crate::cache::types::CacheKey;
use crate::error::{CacheError, Result};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions, MdbError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MIB: u64 = 1024 * 1024;
const ENTRIES_DB: &str = "entries";

/// LMDB environment holding the L2 entries
pub struct LmdbStore {
    env: Env,
    entries: Database<Str, Bytes>,
    path: PathBuf,
    map_size: u64,
}

impl LmdbStore {
    /// Open (or create) the environment at `path` with a map of at least
    /// `size_limit_bytes`, rounded up to a whole MiB
    pub fn open(path: impl AsRef<Path>, size_limit_bytes: u64) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let map_size = size_limit_bytes.max(1).div_ceil(MIB) * MIB;
        let map_size_usize = usize::try_from(map_size).map_err(|_| {
            CacheError::Config(format!("l2 size limit {} does not fit in memory", map_size))
        })?;

        // SAFETY: the environment directory is owned by this cache and the
        // map is never mutated outside LMDB transactions.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size_usize)
                .max_dbs(1)
                .open(path)
        }?;

        let mut wtxn = env.write_txn()?;
        let entries: Database<Str, Bytes> = env.create_database(&mut wtxn, Some(ENTRIES_DB))?;
        wtxn.commit()?;

        info!(path = %path.display(), map_size, "Opened L2 store");

        Ok(Self {
            env,
            entries,
            path: path.to_path_buf(),
            map_size,
        })
    }

    /// Look up a key. Expired and undecodable records are deleted and reported as such
    pub fn get(&self, key: &str) -> Result<Lookup> {
        let decoded = {
            let rtxn = self.env.read_txn()?;
            match self.entries.get(&rtxn, key)? {
                None => return Ok(Lookup::Miss),
                Some(raw) => serde_json::from_slice::<CacheEntry>(raw),
            }
        };

        match decoded {
            Ok(entry) if !entry.is_expired() => Ok(Lookup::Hit(entry)),
            Ok(_) => {
                debug!(key, reason = %InvalidationReason::Expired, "L2 entry dropped");
                self.delete(key)?;
                Ok(Lookup::Expired)
            }
            Err(e) => {
                warn!(key, error = %e, "Dropping undecodable L2 record");
                self.delete(key)?;
                Err(e.into())
            }
        }
    }

    /// Write an entry. A full map is retried once after purging expired entries
    pub fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let raw = serde_json::to_vec(entry)?;

        match self.put_raw(key, &raw) {
            Err(heed::Error::Mdb(MdbError::MapFull)) => {
                let purged = self.purge_expired()?;
                warn!(key, purged, "L2 map full, retrying after purge");
                self.put_raw(key, &raw)?;
                Ok(())
            }
            other => Ok(other?),
        }
    }

    fn put_raw(&self, key: &str, raw: &[u8]) -> heed::Result<()> {
        let mut wtxn = self.env.write_txn()?;
        self.entries.put(&mut wtxn, key, raw)?;
        wtxn.commit()
    }

    /// Delete one key. Returns whether it was present
    pub fn delete(&self, key: &str) -> Result<bool> {
        let mut wtxn = self.env.write_txn()?;
        let deleted = self.entries.delete(&mut wtxn, key)?;
        wtxn.commit()?;
        Ok(deleted)
    }

    /// Remove every decodable entry matching `predicate`; returns the removed keys
    pub fn remove_where<F>(&self, predicate: F) -> Result<Vec<CacheKey>>
    where
        F: Fn(&str, &CacheEntry) -> bool,
    {
        self.sweep(|key, entry| entry.is_some_and(|entry| predicate(key, entry)))
    }

    /// Remove expired entries and records that no longer decode
    pub fn purge_expired(&self) -> Result<u64> {
        let removed = self.sweep(|_, entry| entry.map_or(true, CacheEntry::is_expired))?;
        if !removed.is_empty() {
            debug!(count = removed.len(), "Purged expired L2 entries");
        }
        Ok(removed.len() as u64)
    }

    fn sweep<F>(&self, select: F) -> Result<Vec<CacheKey>>
    where
        F: Fn(&str, Option<&CacheEntry>) -> bool,
    {
        let keys: Vec<CacheKey> = {
            let rtxn = self.env.read_txn()?;
            let mut keys = Vec::new();
            for item in self.entries.iter(&rtxn)? {
                let (key, raw) = item?;
                let entry = serde_json::from_slice::<CacheEntry>(raw).ok();
                if select(key, entry.as_ref()) {
                    keys.push(key.to_string());
                }
            }
            keys
        };

        if keys.is_empty() {
            return Ok(keys);
        }

        let mut wtxn = self.env.write_txn()?;
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if self.entries.delete(&mut wtxn, &key)? {
                removed.push(key);
            }
        }
        wtxn.commit()?;

        Ok(removed)
    }

    /// Live keys, optionally filtered by a glob, at most `limit` of them
    pub fn keys(&self, pattern: Option<&GlobPattern>, limit: usize) -> Result<Vec<CacheKey>> {
        let rtxn = self.env.read_txn()?;
        let mut keys = Vec::new();

        for item in self.entries.iter(&rtxn)? {
            if keys.len() >= limit {
                break;
            }
            let (key, raw) = item?;
            if !pattern.map_or(true, |glob| glob.matches(key)) {
                continue;
            }
            let live = serde_json::from_slice::<CacheEntry>(raw)
                .map(|entry| !entry.is_expired())
                .unwrap_or(false);
            if live {
                keys.push(key.to_string());
            }
        }

        Ok(keys)
    }

    /// Delete every entry
    pub fn clear(&self) -> Result<u64> {
        let mut wtxn = self.env.write_txn()?;
        let count = self.entries.len(&wtxn)?;
        self.entries.clear(&mut wtxn)?;
        wtxn.commit()?;

        info!("Cleared {} entries from L2", count);
        Ok(count)
    }

    pub fn len(&self) -> Result<u64> {
        let rtxn = self.env.read_txn()?;
        Ok(self.entries.len(&rtxn)?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Bytes of the map occupied by live pages
    pub fn disk_usage(&self) -> Result<u64> {
        Ok(self.env.non_free_pages_size()?)
    }

    /// Flush the environment to disk
    pub fn sync(&self) -> Result<()> {
        self.env.force_sync()?;
        Ok(())
    }

    pub fn map_size(&self) -> u64 {
        self.map_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Availability of the persistent layer, decided once at startup
pub enum PersistentLayer {
    Available(LmdbStore),
    Unavailable { reason: String },
}

impl PersistentLayer {
    /// Open L2 as configured. Never fails: a disabled or unopenable layer
    /// comes back as [`PersistentLayer::Unavailable`] with the reason logged.
    pub fn open(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::unavailable("cache disabled");
        }
        if !config.enable_l2 {
            return Self::unavailable("l2 disabled by configuration");
        }

        match LmdbStore::open(config.l2_dir(), config.l2_size_limit_bytes) {
            Ok(store) => Self::Available(store),
            Err(e) => {
                warn!(
                    path = %config.l2_dir().display(),
                    error = %e,
                    "Persistent cache layer unavailable, running L1-only"
                );
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn store(&self) -> Option<&LmdbStore> {
        match self {
            Self::Available(store) => Some(store),
            Self::Unavailable { .. } => None,
        }
    }

    /// The store, or [`CacheError::Unavailable`]
    pub fn require(&self) -> Result<&LmdbStore> {
        match self {
            Self::Available(store) => Ok(store),
            Self::Unavailable { reason } => Err(CacheError::Unavailable(reason.clone())),
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Self::Available(_) => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }
}

impl std::fmt::Debug for PersistentLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(store) => f
                .debug_struct("Available")
                .field("path", &store.path)
                .field("map_size", &store.map_size)
                .finish(),
            Self::Unavailable { reason } => {
                f.debug_struct("Unavailable").field("reason", reason).finish()
            }
        }
    }
}
