//! Core data model for the tickvault market-data pipeline.
//!
//! This crate provides the fundamental data structures shared by every
//! component of the pipeline:
//!
//! - [`TickRecord`] - A single bid/ask quote with volume
//! - [`DateRange`] - Inclusive range of UTC calendar days (partitions)
//! - [`Timeframe`] - Candle aggregation timeframe
//! - [`SymbolInfo`] - Symbol description reported by a tick source
//! - [`Timestamped`] - Anything ordered by a millisecond timestamp

#![doc(issue_tracker_base_url = "https://github.com/tickvault/tickvault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod clock;
mod date_range;
mod error;
mod symbol;
mod tick;
mod timeframe;

pub use clock::{MS_PER_DAY, date_of_ms, day_start_ms, now_ms};
pub use date_range::{DateRange, DayIterator};
pub use error::{DateRangeError, TimeframeParseError};
pub use symbol::{Category, SymbolInfo};
pub use tick::{TickRecord, Timestamped};
pub use timeframe::Timeframe;
