//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a durable storage backend or the tick store on top of it.
///
/// Every variant is treated as non-fatal and retryable by callers.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to create a directory.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        /// The path that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to read a file.
    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to delete a file.
    #[error("Failed to delete file '{path}': {source}")]
    DeleteFile {
        /// The path that could not be deleted.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to read a directory.
    #[error("Failed to read directory '{path}': {source}")]
    ReadDir {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Writing would exceed the backend's storage quota.
    #[error("Storage quota exceeded: {used} + {requested} > {quota} bytes")]
    QuotaExceeded {
        /// Bytes currently stored.
        used: u64,
        /// Bytes the rejected write needed.
        requested: u64,
        /// Configured quota.
        quota: u64,
    },

    /// The backend is not reachable.
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be decoded.
    #[error("Corrupt record '{namespace}/{key}': {source}")]
    Corrupt {
        /// Namespace of the record.
        namespace: String,
        /// Key of the record.
        key: String,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Failed to serialize a record.
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
