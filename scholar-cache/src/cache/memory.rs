//! In-process cache layer (L1) with LRU eviction and a byte budget

use crate::cache::entry::{CacheEntry, Lookup};
use crate::cache::invalidation::{GlobPattern, InvalidationReason};
use crate::cache::types::CacheKey;
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Bounded in-memory layer
///
/// - Thread-safe access via a single mutex
/// - Expired entries are dropped when read and by [`MemoryLayer::purge_expired`]
/// - LRU eviction when the byte budget is reached
pub struct MemoryLayer {
    limit_bytes: u64,
    store: Mutex<MemoryStore>,
}

/// Internal cache storage
#[derive(Default)]
struct MemoryStore {
    /// Main storage: key -> entry
    entries: HashMap<CacheKey, CacheEntry>,

    /// LRU tracking: front is least recently used
    lru_queue: VecDeque<CacheKey>,

    /// Total accounted size of all entries
    current_size_bytes: u64,
}

impl MemoryStore {
    fn touch(&mut self, key: &str) {
        self.lru_queue.retain(|k| k != key);
        self.lru_queue.push_back(key.to_string());
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.lru_queue.retain(|k| k != key);
        self.current_size_bytes = self.current_size_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }
}

/// Outcome of a successful insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Entries evicted to make room
    pub evicted: u64,
}

/// Point-in-time occupancy of the layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub entries: usize,
    pub size_bytes: u64,
    pub limit_bytes: u64,
}

impl MemoryLayer {
    pub fn new(limit_bytes: u64) -> Self {
        debug!(limit_bytes, "Initializing L1 memory layer");
        Self {
            limit_bytes,
            store: Mutex::new(MemoryStore::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryStore>> {
        self.store.lock().map_err(|_| CacheError::LockPoisoned("l1 store"))
    }

    /// Look up a key, refreshing its recency on a hit
    pub fn get(&self, key: &str) -> Result<Lookup> {
        let mut store = self.lock()?;

        let expired = match store.entries.get(key) {
            None => return Ok(Lookup::Miss),
            Some(entry) => entry.is_expired(),
        };

        if expired {
            debug!(key, reason = %InvalidationReason::Expired, "L1 entry dropped");
            store.remove_entry(key);
            return Ok(Lookup::Expired);
        }

        let entry = match store.entries.get_mut(key) {
            Some(entry) => {
                entry.mark_accessed();
                entry.clone()
            }
            None => return Ok(Lookup::Miss),
        };
        store.touch(key);

        Ok(Lookup::Hit(entry))
    }

    /// Insert or replace an entry, evicting least recently used entries as needed
    pub fn insert(&self, key: &str, mut entry: CacheEntry) -> Result<InsertOutcome> {
        let size = entry.calculate_size(key) as u64;
        if size > self.limit_bytes {
            return Err(CacheError::EntryTooLarge {
                size,
                limit: self.limit_bytes,
            });
        }
        entry.size_bytes = size;

        let mut store = self.lock()?;
        store.remove_entry(key);

        let mut outcome = InsertOutcome::default();
        while store.current_size_bytes + size > self.limit_bytes {
            let Some(victim) = store.lru_queue.pop_front() else {
                break;
            };
            if let Some(evicted) = store.entries.remove(&victim) {
                debug!(key = %victim, reason = %InvalidationReason::SizeLimit, "Evicting L1 entry");
                store.current_size_bytes = store.current_size_bytes.saturating_sub(evicted.size_bytes);
                outcome.evicted += 1;
            }
        }

        store.entries.insert(key.to_string(), entry);
        store.lru_queue.push_back(key.to_string());
        store.current_size_bytes += size;

        Ok(outcome)
    }

    /// Remove one key. Returns whether it was present
    pub fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.remove_entry(key).is_some())
    }

    /// Remove every entry matching `predicate` and return the removed keys
    pub fn remove_where<F>(&self, predicate: F) -> Result<Vec<CacheKey>>
    where
        F: Fn(&str, &CacheEntry) -> bool,
    {
        let mut store = self.lock()?;
        let keys: Vec<CacheKey> = store
            .entries
            .iter()
            .filter(|(key, entry)| predicate(key, entry))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            store.remove_entry(key);
        }
        Ok(keys)
    }

    /// Remove all expired entries
    pub fn purge_expired(&self) -> Result<u64> {
        let removed = self.remove_where(|_, entry| entry.is_expired())?;
        if !removed.is_empty() {
            debug!(count = removed.len(), "Purged expired L1 entries");
        }
        Ok(removed.len() as u64)
    }

    /// Live keys, optionally filtered by a glob, at most `limit` of them
    pub fn keys(&self, pattern: Option<&GlobPattern>, limit: usize) -> Result<Vec<CacheKey>> {
        let store = self.lock()?;
        Ok(store
            .entries
            .iter()
            .filter(|(key, entry)| {
                !entry.is_expired() && pattern.map_or(true, |glob| glob.matches(key))
            })
            .map(|(key, _)| key.clone())
            .take(limit)
            .collect())
    }

    /// Clear all entries from the layer
    pub fn clear(&self) -> Result<u64> {
        let mut store = self.lock()?;
        let count = store.entries.len() as u64;
        *store = MemoryStore::default();

        info!("Cleared {} entries from L1", count);
        Ok(count)
    }

    pub fn usage(&self) -> Result<MemoryUsage> {
        let store = self.lock()?;
        Ok(MemoryUsage {
            entries: store.entries.len(),
            size_bytes: store.current_size_bytes,
            limit_bytes: self.limit_bytes,
        })
    }

    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }
}
