//! # Content-Addressed Artifact Store
//!
//! Durable storage for large binary payloads (PDFs, full-text archives),
//! keyed by a caller-chosen artifact id and stored once per distinct content.
//!
//! ## Layout
//!
//! ```text
//! {base_dir}/artifacts/{hash[0..2]}/{hash}     blob, hash = SHA-256 of the content
//! {base_dir}/index/{sha256(artifact_id)}.json  id -> metadata record
//! {base_dir}/tmp/                              in-flight writes
//! ```
//!
//! Many ids may point at one blob. Deleting an id only removes its index
//! record; blobs are reclaimed by garbage collection once nothing references
//! them.

pub mod store;

pub use store::ArtifactStore;

use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

const MB: u64 = 1024 * 1024;

/// Configuration for the artifact store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactStoreConfig {
    /// Root of the on-disk layout
    pub base_dir: PathBuf,

    /// Total blob bytes kept before garbage collection runs
    pub size_limit_bytes: u64,

    /// Extra space freed by automatic collection, as a fraction of the limit
    pub gc_margin_fraction: f64,

    /// Megabyte limit that did not fit in a u64 byte count
    #[serde(skip)]
    size_limit_overflow: Option<u64>,
}

impl Default for ArtifactStoreConfig {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("scholar-cache").join("artifacts"))
    }
}

impl ArtifactStoreConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            size_limit_bytes: 1024 * MB,
            gc_margin_fraction: 0.1,
            size_limit_overflow: None,
        }
    }

    pub fn size_limit_mb(mut self, mb: u64) -> Self {
        match mb.checked_mul(MB) {
            Some(bytes) => {
                self.size_limit_bytes = bytes;
                self.size_limit_overflow = None;
            }
            None => self.size_limit_overflow = Some(mb),
        }
        self
    }

    pub fn size_limit_bytes(mut self, bytes: u64) -> Self {
        self.size_limit_bytes = bytes;
        self.size_limit_overflow = None;
        self
    }

    pub fn gc_margin_fraction(mut self, fraction: f64) -> Self {
        self.gc_margin_fraction = fraction;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(mb) = self.size_limit_overflow {
            return Err(CacheError::Config(format!(
                "artifact size_limit of {} MB overflows a byte count",
                mb
            )));
        }
        if self.size_limit_bytes == 0 {
            return Err(CacheError::Config(
                "artifact size_limit must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.gc_margin_fraction) {
            return Err(CacheError::Config(
                "gc_margin_fraction must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn artifacts_dir(&self) -> PathBuf {
        self.base_dir.join("artifacts")
    }

    pub(crate) fn index_dir(&self) -> PathBuf {
        self.base_dir.join("index")
    }

    pub(crate) fn tmp_dir(&self) -> PathBuf {
        self.base_dir.join("tmp")
    }
}

/// Caller-supplied HTTP metadata for a stored payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub mime_type: Option<String>,
    pub etag: Option<String>,
    /// HTTP-date string as received
    pub last_modified: Option<String>,
}

impl ArtifactInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn last_modified(mut self, last_modified: impl Into<String>) -> Self {
        self.last_modified = Some(last_modified.into());
        self
    }
}

/// Index record of one artifact id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// 64-character lowercase hex SHA-256 of the content
    pub hash_value: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    pub stored_at: DateTime<Utc>,
    /// Never moves backwards
    pub last_accessed: DateTime<Utc>,
}

/// Store occupancy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub used_bytes: u64,
    pub used_mb: f64,
    pub used_percent: f64,
    /// Physical blobs
    pub artifact_count: usize,
    /// Index records (artifact ids)
    pub index_count: usize,
    pub limit_mb: f64,
}

/// Outcome of [`ArtifactStore::compact`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactReport {
    pub orphans_removed: u64,
    pub artifacts_remaining: usize,
    pub index_entries: usize,
    pub temp_files_removed: u64,
    pub corrupt_index_removed: u64,
}

/// Lowercase hex SHA-256
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Whether `s` looks like a [`sha256_hex`] digest
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(is_sha256_hex(&sha256_hex(b"abc")));
        assert!(!is_sha256_hex("../etc/passwd"));
        assert!(!is_sha256_hex(&sha256_hex(b"abc").to_uppercase()));
    }

    #[test]
    fn test_config_validation() {
        assert!(ArtifactStoreConfig::new("/tmp/x").validate().is_ok());
        assert!(ArtifactStoreConfig::new("/tmp/x")
            .size_limit_bytes(0)
            .validate()
            .unwrap_err()
            .is_config());
        assert!(ArtifactStoreConfig::new("/tmp/x")
            .gc_margin_fraction(1.5)
            .validate()
            .is_err());
        assert_eq!(
            ArtifactStoreConfig::new("/tmp/x").size_limit_mb(2).size_limit_bytes,
            2 * MB
        );
    }

    #[test]
    fn test_oversized_megabyte_limit_is_rejected() {
        let config = ArtifactStoreConfig::new("/tmp/x").size_limit_mb(u64::MAX);
        assert_eq!(config.size_limit_bytes, 1024 * MB);
        assert!(config.validate().unwrap_err().is_config());

        let config = config.size_limit_mb(8);
        assert!(config.validate().is_ok());
        assert_eq!(config.size_limit_bytes, 8 * MB);
    }

    #[test]
    fn test_metadata_omits_missing_http_fields() {
        let now = Utc::now();
        let meta = ArtifactMetadata {
            hash_value: sha256_hex(b"x"),
            size: 1,
            mime_type: None,
            etag: Some("\"abc\"".to_string()),
            last_modified: None,
            stored_at: now,
            last_accessed: now,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("mime_type").is_none());
        assert_eq!(json["etag"], "\"abc\"");
    }
}
