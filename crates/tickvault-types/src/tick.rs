//! Tick data representation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Anything positioned in time by a Unix millisecond timestamp.
pub trait Timestamped {
    /// Returns the Unix millisecond timestamp.
    fn timestamp_ms(&self) -> u64;
}

/// A single quote update for a symbol.
///
/// A tick is identified by `(symbol, partition date, timestamp_ms)`; storing a
/// second tick under the same key replaces the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    /// Symbol the quote belongs to (e.g., "EURUSD").
    pub symbol: String,
    /// Unix timestamp in milliseconds (UTC).
    pub timestamp_ms: u64,
    /// Bid price.
    pub bid: f64,
    /// Ask (offer) price.
    pub ask: f64,
    /// Traded or quoted volume.
    pub volume: f64,
}

impl TickRecord {
    /// Creates a new tick.
    #[must_use]
    pub fn new(symbol: impl Into<String>, timestamp_ms: u64, bid: f64, ask: f64, volume: f64) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp_ms,
            bid,
            ask,
            volume,
        }
    }

    /// Returns the mid price (average of ask and bid).
    #[must_use]
    pub fn mid(&self) -> f64 {
        (self.ask + self.bid) / 2.0
    }

    /// Returns the spread (ask - bid).
    #[must_use]
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Returns the UTC day partition this tick is stored under.
    #[must_use]
    pub fn partition_date(&self) -> NaiveDate {
        crate::date_of_ms(self.timestamp_ms)
    }

    /// Approximate in-memory footprint of the record in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        (std::mem::size_of::<Self>() + self.symbol.len()) as u64
    }
}

impl Timestamped for TickRecord {
    fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}
