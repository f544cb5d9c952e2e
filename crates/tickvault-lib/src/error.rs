//! Error types for the pipeline facade.

use std::path::PathBuf;
use thiserror::Error;
use tickvault_cache::CacheError;
use tickvault_fetch::FetchError;
use tickvault_store::StoreError;

/// Errors that can occur while loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to write the configuration file.
    #[error("Failed to write config file '{path}': {source}")]
    WriteFile {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the configuration file.
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        /// The path that could not be parsed.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Failed to serialize the configuration.
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that can occur in [`MarketDataService`](crate::MarketDataService) operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Tick store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Cache error.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Tick source error.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
