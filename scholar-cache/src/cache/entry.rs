//! Cache entry management with TTL support

use crate::cache::types::CacheValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A cache entry with TTL and metadata
///
/// The same record is held in L1 and serialized (as JSON) into L2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached value
    pub value: CacheValue,

    /// Optional grouping label for bulk eviction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// When the entry was written
    pub created_at: DateTime<Utc>,

    /// When the entry expires
    pub expires_at: DateTime<Utc>,

    /// Last read (L1 only tracks this; L2 records keep the write time)
    pub accessed_at: DateTime<Utc>,

    /// Number of reads served
    #[serde(default)]
    pub access_count: u64,

    /// Accounted size in L1, set when the entry is stored there
    #[serde(default)]
    pub size_bytes: u64,
}

/// Result of probing one layer for a key
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit(CacheEntry),
    Miss,
    /// Present but past its expiry; the layer has dropped it
    Expired,
}

impl Lookup {
    pub fn into_entry(self) -> Option<CacheEntry> {
        match self {
            Lookup::Hit(entry) => Some(entry),
            Lookup::Miss | Lookup::Expired => None,
        }
    }
}

impl CacheEntry {
    /// Create a new cache entry that lives for `ttl`
    pub fn new(value: CacheValue, ttl: Duration, tag: Option<String>) -> Self {
        let now = Utc::now();
        let expires_at =
            now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(3600));

        Self {
            value,
            tag,
            created_at: now,
            expires_at,
            accessed_at: now,
            access_count: 0,
            size_bytes: 0,
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Get time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now();
        if now >= self.expires_at {
            None
        } else {
            (self.expires_at - now).to_std().ok()
        }
    }

    /// Mark the entry as accessed. Expiry is left untouched
    pub fn mark_accessed(&mut self) {
        self.accessed_at = Utc::now();
        self.access_count += 1;
    }

    /// Get the age of the entry (time since it was written)
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }

    /// Check if the entry is older than `max_age`
    pub fn is_older_than(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }

    /// Check if entry carries a specific tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.as_deref() == Some(tag)
    }

    /// Calculate the size of this entry in bytes
    pub fn calculate_size(&self, key: &str) -> usize {
        // Approximate size: key + value + metadata overhead
        key.len()
            + self.value.size_bytes()
            + self.tag.as_ref().map(|t| t.len()).unwrap_or(0)
            + std::mem::size_of::<CacheEntry>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn entry(ttl: Duration) -> CacheEntry {
        CacheEntry::new(CacheValue::from("value"), ttl, None)
    }

    #[test]
    fn test_cache_entry_creation() {
        let entry = CacheEntry::new(
            CacheValue::from("test_value"),
            Duration::from_secs(3600),
            Some("batch-1".to_string()),
        );

        assert_eq!(entry.value, CacheValue::from("test_value"));
        assert!(!entry.is_expired());
        assert!(entry.has_tag("batch-1"));
        assert!(!entry.has_tag("batch-2"));
        assert_eq!(entry.access_count, 0);
    }

    #[test]
    fn test_entry_expiration() {
        let entry = entry(Duration::from_millis(100));

        assert!(!entry.is_expired());
        sleep(Duration::from_millis(150));
        assert!(entry.is_expired());
        assert!(entry.time_until_expiration().is_none());
    }

    #[test]
    fn test_mark_accessed_keeps_expiry() {
        let mut entry = entry(Duration::from_secs(3600));
        let expires_at = entry.expires_at;
        let initial_time = entry.accessed_at;

        sleep(Duration::from_millis(10));
        entry.mark_accessed();

        assert_eq!(entry.access_count, 1);
        assert!(entry.accessed_at > initial_time);
        assert_eq!(entry.expires_at, expires_at);
    }

    #[test]
    fn test_age() {
        let entry = entry(Duration::from_secs(3600));

        sleep(Duration::from_millis(20));
        assert!(entry.age() >= Duration::from_millis(20));
        assert!(entry.is_older_than(Duration::from_millis(10)));
        assert!(!entry.is_older_than(Duration::from_secs(60)));
    }

    #[test]
    fn test_calculate_size() {
        let entry = entry(Duration::from_secs(3600));
        let size = entry.calculate_size("key");
        assert!(size >= "key".len() + "\"value\"".len());
    }

    #[test]
    fn test_serialized_record_omits_missing_tag() {
        let entry = entry(Duration::from_secs(60));
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("tag").is_none());

        let decoded: CacheEntry = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, entry);
    }
}
