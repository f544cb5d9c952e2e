//! Error types shared across the pipeline.

use chrono::NaiveDate;
use thiserror::Error;

/// Error for invalid date ranges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateRangeError {
    /// Start date is after end date.
    #[error("Invalid date range: {start} > {end}")]
    InvalidRange {
        /// The start date.
        start: NaiveDate,
        /// The end date.
        end: NaiveDate,
    },
}

/// Error returned when parsing an unknown timeframe string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid timeframe '{0}', expected one of: 1m, 5m, 15m, 1h, 4h, 1d")]
pub struct TimeframeParseError(pub String);
