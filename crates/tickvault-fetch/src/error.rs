//! Error types for tick sources.

use thiserror::Error;

/// Errors that can occur while fetching ticks.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out after {0} attempts")]
    Timeout(u32),

    /// Server returned an error status.
    #[error("Server error: {status}")]
    ServerError {
        /// HTTP status code.
        status: u16,
    },

    /// Response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The source does not know the symbol.
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// The fetch was cancelled by the caller.
    #[error("Fetch cancelled")]
    Cancelled,

    /// Any other source failure.
    #[error("Tick source unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    /// Returns true if repeating the request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout(_) | Self::ServerError { .. } | Self::Unavailable(_)
        )
    }
}
