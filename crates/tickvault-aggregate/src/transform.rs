//! Stateless candle transforms.

use std::cmp::Ordering;
use tickvault_types::{TickRecord, Timeframe, Timestamped};

use crate::Candle;

/// Folds ticks into closed candles of `timeframe`.
///
/// Ticks are sorted before folding, so any permutation of the same ticks
/// yields the same candles. Ticks sharing a timestamp are ordered by price and
/// then volume.
#[must_use]
pub fn aggregate_ticks(ticks: &[TickRecord], timeframe: Timeframe) -> Vec<Candle> {
    let mut sorted: Vec<&TickRecord> = ticks.iter().collect();
    sorted.sort_by(|a, b| compare_ticks(a, b));

    let mut candles: Vec<Candle> = Vec::new();
    for tick in sorted {
        let bucket = timeframe.bucket_start(tick.timestamp_ms);
        match candles.last_mut() {
            Some(candle) if candle.bucket_start_ms == bucket => candle.extend(tick.mid(), tick.volume),
            _ => candles.push(Candle::open_at(bucket, tick.mid(), tick.volume)),
        }
    }
    candles
}

fn compare_ticks(a: &TickRecord, b: &TickRecord) -> Ordering {
    a.timestamp_ms
        .cmp(&b.timestamp_ms)
        .then_with(|| a.mid().total_cmp(&b.mid()))
        .then_with(|| a.volume.total_cmp(&b.volume))
}

/// Re-buckets candles into a coarser `target` timeframe.
///
/// Open comes from the first constituent, close from the last, high and low
/// are the extremes and volume is summed. Input is processed in chronological
/// order regardless of how it is passed in.
#[must_use]
pub fn resample_ohlc(candles: &[Candle], target: Timeframe) -> Vec<Candle> {
    let mut sorted = candles.to_vec();
    sorted.sort_by_key(|c| c.bucket_start_ms);

    let mut resampled: Vec<Candle> = Vec::new();
    for candle in sorted {
        let bucket = target.bucket_start(candle.bucket_start_ms);
        match resampled.last_mut() {
            Some(last) if last.bucket_start_ms == bucket => last.merge(&candle),
            _ => resampled.push(Candle {
                bucket_start_ms: bucket,
                ..candle
            }),
        }
    }
    resampled
}

/// Derives Heikin-Ashi candles from chronological candles.
///
/// Each output depends on the previous output:
/// `close = (o + h + l + c) / 4`, `open = (prev_open + prev_close) / 2`
/// (or `(o + c) / 2` for the first candle), and the extremes include both.
#[must_use]
pub fn calculate_heikin_ashi(candles: &[Candle]) -> Vec<Candle> {
    let mut result: Vec<Candle> = Vec::with_capacity(candles.len());

    for candle in candles {
        let ha_close = (candle.open + candle.high + candle.low + candle.close) / 4.0;
        let ha_open = match result.last() {
            Some(prev) => (prev.open + prev.close) / 2.0,
            None => (candle.open + candle.close) / 2.0,
        };
        result.push(Candle {
            open: ha_open,
            high: candle.high.max(ha_open).max(ha_close),
            low: candle.low.min(ha_open).min(ha_close),
            close: ha_close,
            ..*candle
        });
    }
    result
}

/// Joins a historical batch with live items at the cutover point.
///
/// Live items at or before the newest historical timestamp are dropped as
/// duplicates; the remainder is appended and the result sorted by timestamp.
#[must_use]
pub fn merge_historical_and_live<T>(historical: &[T], live: &[T]) -> Vec<T>
where
    T: Timestamped + Clone,
{
    let cutover = historical.iter().map(Timestamped::timestamp_ms).max();

    let mut merged = historical.to_vec();
    merged.extend(
        live.iter()
            .filter(|item| cutover.is_none_or(|c| item.timestamp_ms() > c))
            .cloned(),
    );
    merged.sort_by_key(Timestamped::timestamp_ms);
    merged
}
