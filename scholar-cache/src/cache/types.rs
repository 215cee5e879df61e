//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CacheError;
use crate::metrics::{LayerSnapshot, OverallMetrics};
use chrono::{DateTime, Utc};

/// Cache key type - `"{category}:v{namespace_version}:{token}"` for normalized keys,
/// but any string is accepted by the layers
pub type CacheKey = String;

/// Data category, used to pick a TTL and as the key prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Search result pages (short-lived)
    Search,
    /// Single record/article metadata
    Record,
    /// Full-text documents (long-lived)
    Fulltext,
    /// Cached error responses (negative caching)
    Error,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Search,
        Category::Record,
        Category::Fulltext,
        Category::Error,
    ];

    /// Lower-case name used in cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Search => "search",
            Category::Record => "record",
            Category::Fulltext => "fulltext",
            Category::Error => "error",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "search" => Ok(Category::Search),
            "record" => Ok(Category::Record),
            "fulltext" => Ok(Category::Fulltext),
            "error" => Ok(Category::Error),
            other => Err(CacheError::Config(format!("unknown cache category: {}", other))),
        }
    }
}

/// Which physical layer(s) an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheLayer {
    /// In-process memory layer
    L1,
    /// Persistent LMDB layer
    L2,
    /// Both layers (read L1 then L2, write through to both)
    #[default]
    Any,
}

impl CacheLayer {
    pub fn includes_l1(&self) -> bool {
        matches!(self, CacheLayer::L1 | CacheLayer::Any)
    }

    pub fn includes_l2(&self) -> bool {
        matches!(self, CacheLayer::L2 | CacheLayer::Any)
    }
}

impl fmt::Display for CacheLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheLayer::L1 => write!(f, "l1"),
            CacheLayer::L2 => write!(f, "l2"),
            CacheLayer::Any => write!(f, "any"),
        }
    }
}

/// A cached value: raw bytes or a structured JSON document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CacheValue {
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    Json(serde_json::Value),
}

/// Byte payloads travel as base64 strings rather than JSON number arrays
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

impl CacheValue {
    /// Approximate payload size in bytes, used for L1 accounting
    pub fn size_bytes(&self) -> usize {
        match self {
            CacheValue::Bytes(bytes) => bytes.len(),
            CacheValue::Json(value) => serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            CacheValue::Json(value) => Some(value),
            CacheValue::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            CacheValue::Bytes(bytes) => Some(bytes),
            CacheValue::Json(_) => None,
        }
    }
}

impl From<serde_json::Value> for CacheValue {
    fn from(value: serde_json::Value) -> Self {
        CacheValue::Json(value)
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(bytes: Vec<u8>) -> Self {
        CacheValue::Bytes(bytes)
    }
}

impl From<&[u8]> for CacheValue {
    fn from(bytes: &[u8]) -> Self {
        CacheValue::Bytes(bytes.to_vec())
    }
}

impl From<&str> for CacheValue {
    fn from(s: &str) -> Self {
        CacheValue::Json(serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for CacheValue {
    fn from(s: String) -> Self {
        CacheValue::Json(serde_json::Value::String(s))
    }
}

/// Occupancy of both layers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub l1_entries: usize,
    pub l1_size_bytes: u64,
    pub l1_limit_bytes: u64,
    /// False when L2 is disabled, failed to open or was closed
    pub l2_available: bool,
    pub l2_entries: u64,
    pub l2_size_bytes: u64,
    pub l2_limit_bytes: u64,
}

impl StorageUsage {
    /// Fraction of the L1 budget in use
    pub fn l1_utilization(&self) -> f64 {
        fraction(self.l1_size_bytes, self.l1_limit_bytes)
    }

    /// Fraction of the L2 map in use; 0.0 without L2
    pub fn l2_utilization(&self) -> f64 {
        if !self.l2_available {
            return 0.0;
        }
        fraction(self.l2_size_bytes, self.l2_limit_bytes)
    }
}

fn fraction(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        0.0
    } else {
        used as f64 / limit as f64
    }
}

/// Per-layer metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerStats {
    pub l1: LayerSnapshot,
    pub l2: LayerSnapshot,
}

/// Cache statistics: combined view, per-layer metrics and occupancy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub overall: OverallMetrics,
    pub layers: LayerStats,
    pub usage: StorageUsage,
    pub namespace_version: u32,
    pub collected_at: DateTime<Utc>,
}

impl CacheStats {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
