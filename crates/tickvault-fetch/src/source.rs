//! Tick source abstraction.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;
use tickvault_types::{DateRange, SymbolInfo, TickRecord};
use tokio_util::sync::CancellationToken;

use crate::FetchError;

/// Stream of tick chunks for one day.
pub type ChunkStream = BoxStream<'static, Result<TickChunk, FetchError>>;

/// A batch of ticks for one `(symbol, day)` delivered by a streaming fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct TickChunk {
    /// Symbol of the ticks.
    pub symbol: String,
    /// Day the ticks belong to.
    pub date: NaiveDate,
    /// Ticks in this chunk, ascending by timestamp.
    pub ticks: Vec<TickRecord>,
    /// Ticks delivered for the day so far, including this chunk.
    pub fetched: usize,
    /// Total ticks the source reports for the day, if known.
    pub total: Option<usize>,
}

impl TickChunk {
    /// Returns true if the chunk holds no ticks.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Returns the number of ticks in the chunk.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.ticks.len()
    }

    /// Returns the fraction of the day delivered so far, if the total is known.
    #[must_use]
    pub fn day_progress(&self) -> Option<f64> {
        self.total.map(|total| {
            if total == 0 {
                1.0
            } else {
                (self.fetched as f64 / total as f64).min(1.0)
            }
        })
    }
}

/// Source of historical ticks.
///
/// Streaming fetches deliver a day in chunks so that callers can persist
/// incrementally. Cancelling `cancel` stops the stream; a cancelled stream
/// ends with [`FetchError::Cancelled`] unless it already finished.
#[async_trait]
pub trait TickSource: Send + Sync + std::fmt::Debug {
    /// Lists the symbols the source can serve.
    async fn fetch_available_symbols(&self) -> Result<Vec<SymbolInfo>, FetchError>;

    /// Describes one symbol.
    async fn fetch_symbol_info(&self, symbol: &str) -> Result<SymbolInfo, FetchError>;

    /// Streams the ticks of one day in chunks.
    fn stream_fetch_ticks(&self, symbol: &str, date: NaiveDate, cancel: CancellationToken) -> ChunkStream;

    /// Fetches all ticks in a range in one call.
    async fn fetch_ticks_in_range(&self, symbol: &str, range: DateRange) -> Result<Vec<TickRecord>, FetchError>;
}
