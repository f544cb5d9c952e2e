//! OHLC candle data structure.

use serde::{Deserialize, Serialize};
use tickvault_types::Timestamped;

/// OHLC candle over one timeframe bucket.
///
/// Prices are tick mid prices. A candle always satisfies
/// `low <= min(open, close) <= max(open, close) <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Aligned start of the bucket, Unix milliseconds.
    pub bucket_start_ms: u64,
    /// First price in the bucket.
    pub open: f64,
    /// Highest price in the bucket.
    pub high: f64,
    /// Lowest price in the bucket.
    pub low: f64,
    /// Last price in the bucket.
    pub close: f64,
    /// Summed tick volume.
    pub volume: f64,
    /// Number of ticks folded into the candle.
    pub tick_count: u32,
}

impl Candle {
    /// Creates a new candle.
    #[must_use]
    pub const fn new(
        bucket_start_ms: u64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        tick_count: u32,
    ) -> Self {
        Self {
            bucket_start_ms,
            open,
            high,
            low,
            close,
            volume,
            tick_count,
        }
    }

    /// Opens a degenerate single-price candle.
    #[must_use]
    pub const fn open_at(bucket_start_ms: u64, price: f64, volume: f64) -> Self {
        Self::new(bucket_start_ms, price, price, price, price, volume, 1)
    }

    /// Extends the candle with a later price in the same bucket.
    pub fn extend(&mut self, price: f64, volume: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += volume;
        self.tick_count += 1;
    }

    /// Merges a later candle into this one.
    ///
    /// Open is kept, close is taken from `later`, extremes and volume combine.
    pub fn merge(&mut self, later: &Self) {
        self.high = self.high.max(later.high);
        self.low = self.low.min(later.low);
        self.close = later.close;
        self.volume += later.volume;
        self.tick_count += later.tick_count;
    }

    /// Returns the price range (high - low).
    #[must_use]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Returns the body size (|close - open|).
    #[must_use]
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Returns true if this is a bullish (green) candle.
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Returns true if this is a bearish (red) candle.
    #[must_use]
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Returns the typical price ((high + low + close) / 3).
    #[must_use]
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Returns true if the OHLC ordering invariant holds.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open.min(self.close) && self.open.max(self.close) <= self.high
    }
}

impl Timestamped for Candle {
    fn timestamp_ms(&self) -> u64 {
        self.bucket_start_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_candle() -> Candle {
        Candle::new(60_000, 1.1000, 1.1050, 1.0980, 1.1020, 1000.0, 500)
    }

    #[test]
    fn test_range_and_body() {
        let candle = create_test_candle();
        assert!((candle.range() - 0.0070).abs() < 1e-10);
        assert!((candle.body() - 0.0020).abs() < 1e-10);
    }

    #[test]
    fn test_direction() {
        let candle = create_test_candle();
        assert!(candle.is_bullish());
        assert!(!candle.is_bearish());

        let bearish = Candle::new(60_000, 1.1020, 1.1050, 1.0980, 1.1000, 1000.0, 500);
        assert!(bearish.is_bearish());
    }

    #[test]
    fn test_typical_price() {
        let candle = create_test_candle();
        let expected = (1.1050 + 1.0980 + 1.1020) / 3.0;
        assert!((candle.typical_price() - expected).abs() < 1e-10);
    }

    #[test]
    fn test_extend() {
        let mut candle = Candle::open_at(0, 1.5, 1.0);
        candle.extend(1.7, 2.0);
        candle.extend(1.2, 1.0);

        assert!((candle.open - 1.5).abs() < 1e-10);
        assert!((candle.high - 1.7).abs() < 1e-10);
        assert!((candle.low - 1.2).abs() < 1e-10);
        assert!((candle.close - 1.2).abs() < 1e-10);
        assert!((candle.volume - 4.0).abs() < 1e-10);
        assert_eq!(candle.tick_count, 3);
        assert!(candle.is_consistent());
    }

    #[test]
    fn test_merge() {
        let mut first = Candle::new(0, 1.0, 1.4, 0.9, 1.2, 3.0, 3);
        let second = Candle::new(60_000, 1.2, 1.3, 0.8, 1.1, 2.0, 2);
        first.merge(&second);

        assert_eq!(first, Candle::new(0, 1.0, 1.4, 0.8, 1.1, 5.0, 5));
    }
}
