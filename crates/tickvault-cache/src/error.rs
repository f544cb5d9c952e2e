//! Error types for the cache.

use thiserror::Error;
use tickvault_store::StoreError;

/// Errors that can occur in cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The durable tier failed.
    #[error("Durable cache tier error: {0}")]
    Store(#[from] StoreError),

    /// A value could not be serialized for the durable tier.
    #[error("Failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A durable entry could not be decoded as the requested type.
    #[error("Failed to decode cache entry {key}: {source}")]
    Decode {
        /// Entry key.
        key: String,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// A prefetch loader failed.
    #[error("Cache loader failed: {0}")]
    Loader(String),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
