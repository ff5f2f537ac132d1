//! Cache error types

use thiserror::Error;

/// Errors that can occur during cache operations
///
/// The tiered cache never returns these to its callers; they surface from
/// the individual tiers and the codec and are logged where they are absorbed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CacheError {
    /// Failed to connect to cache backend
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// Failed to serialize or deserialize cache value
    #[error("Cache serialization error: {0}")]
    Serialization(String),

    /// Failed to compress or decompress a payload
    #[error("Cache compression error: {0}")]
    Compression(String),

    /// Cache operation timed out
    #[error("Cache operation timed out: {0}")]
    Timeout(String),

    /// Generic backend error
    #[error("Cache backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(error: serde_json::Error) -> Self {
        CacheError::Serialization(error.to_string())
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
