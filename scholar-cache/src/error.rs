//! Error types for cache and artifact operations
//!
//! Most cache operations never surface these to callers: the backend turns
//! them into misses and skipped writes and counts them in the layer metrics.
//! Configuration errors and artifact writes are the exceptions.

use thiserror::Error;

/// Main error type for the cache subsystem
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid configuration, rejected at construction
    #[error("Configuration error: {0}")]
    Config(String),

    /// The persistent layer could not be opened or has been closed
    #[error("Persistent layer unavailable: {0}")]
    Unavailable(String),

    /// Storage engine failure (LMDB)
    #[error("Storage error: {0}")]
    Storage(#[from] heed::Error),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Index entry points at content that is not on disk
    #[error("Integrity error for artifact {artifact_id}: blob {hash} is missing")]
    Integrity { artifact_id: String, hash: String },

    /// A single value does not fit in the layer's size budget
    #[error("Entry of {size} bytes exceeds the layer limit of {limit} bytes")]
    EntryTooLarge { size: u64, limit: u64 },

    /// Metrics could not be read
    #[error("Metrics unavailable: {0}")]
    MetricsUnavailable(String),

    /// A shared lock was poisoned by a panicking thread
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl CacheError {
    /// Whether the error is a configuration problem (the only kind that is
    /// meant to stop the caller)
    pub fn is_config(&self) -> bool {
        matches!(self, CacheError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CacheError::Config("namespace_version must be >= 1".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: namespace_version must be >= 1"
        );

        let integrity = CacheError::Integrity {
            artifact_id: "pmc:PMC1:pdf".to_string(),
            hash: "ab".repeat(32),
        };
        assert!(integrity.to_string().contains("pmc:PMC1:pdf"));

        let too_large = CacheError::EntryTooLarge { size: 10, limit: 5 };
        assert!(too_large.to_string().contains("10 bytes"));
    }

    #[test]
    fn test_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: CacheError = io.into();
        assert!(matches!(error, CacheError::Io(_)));
        assert!(!error.is_config());

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: CacheError = json_err.into();
        assert!(matches!(error, CacheError::Serialization(_)));
    }
}
