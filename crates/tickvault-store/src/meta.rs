//! Per-partition metadata and aggregated storage statistics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tickvault_types::TickRecord;

/// Derived metadata for one `(symbol, date)` partition.
///
/// Updated on every write to the partition. Apart from the segment list it can
/// always be rebuilt by recounting the partition's ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionMeta {
    /// Symbol of the partition.
    pub symbol: String,
    /// UTC day of the partition.
    pub date: NaiveDate,
    /// Number of ticks stored.
    pub tick_count: u64,
    /// Estimated byte size of the stored ticks.
    pub size_bytes: u64,
    /// Unix milliseconds of the last write.
    pub last_write_ms: u64,
    /// Timestamp of the earliest tick, if any.
    pub first_tick_ms: Option<u64>,
    /// Timestamp of the latest tick, if any.
    pub last_tick_ms: Option<u64>,
    /// Whether a full-day download finished for this partition.
    #[serde(default)]
    pub complete: bool,
    /// Ids of the tick segments holding the partition, in write order.
    #[serde(default)]
    pub segments: Vec<u32>,
}

impl PartitionMeta {
    /// Computes metadata from a partition's (sorted) ticks.
    #[must_use]
    pub fn from_ticks(symbol: &str, date: NaiveDate, ticks: &[TickRecord], now_ms: u64) -> Self {
        Self {
            symbol: symbol.to_string(),
            date,
            tick_count: ticks.len() as u64,
            size_bytes: ticks.iter().map(TickRecord::size_bytes).sum(),
            last_write_ms: now_ms,
            first_tick_ms: ticks.first().map(|t| t.timestamp_ms),
            last_tick_ms: ticks.last().map(|t| t.timestamp_ms),
            complete: false,
            segments: Vec::new(),
        }
    }

    /// Accounts for a segment of ticks that all follow `last_tick_ms`.
    pub fn append_segment(&mut self, segment: u32, ticks: &[TickRecord], now_ms: u64) {
        self.tick_count += ticks.len() as u64;
        self.size_bytes += ticks.iter().map(TickRecord::size_bytes).sum::<u64>();
        self.last_write_ms = now_ms;
        if self.first_tick_ms.is_none() {
            self.first_tick_ms = ticks.first().map(|t| t.timestamp_ms);
        }
        if let Some(last) = ticks.last() {
            self.last_tick_ms = Some(last.timestamp_ms);
        }
        self.segments.push(segment);
    }

    /// Id for the next segment written to this partition.
    #[must_use]
    pub fn next_segment(&self) -> u32 {
        self.segments.last().map_or(0, |s| s + 1)
    }

    /// Returns true if the partition holds at least one tick.
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.tick_count > 0
    }
}

/// Storage statistics for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolStorage {
    /// First day with data.
    pub first_date: NaiveDate,
    /// Last day with data.
    pub last_date: NaiveDate,
    /// Number of days with data.
    pub days: usize,
    /// Ticks stored for the symbol.
    pub tick_count: u64,
    /// Estimated bytes stored for the symbol.
    pub size_bytes: u64,
}

/// Storage statistics aggregated from partition metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    /// Estimated bytes across all partitions.
    pub total_size_bytes: u64,
    /// Ticks across all partitions.
    pub tick_count: u64,
    /// Number of symbols with data.
    pub symbol_count: usize,
    /// Date range and totals per symbol.
    pub per_symbol: BTreeMap<String, SymbolStorage>,
}

impl StorageStats {
    /// Builds statistics from an iterator of partition metadata.
    pub fn from_partitions<'a>(partitions: impl IntoIterator<Item = &'a PartitionMeta>) -> Self {
        let mut stats = Self::default();

        for meta in partitions.into_iter().filter(|m| m.has_data()) {
            stats.total_size_bytes += meta.size_bytes;
            stats.tick_count += meta.tick_count;

            stats
                .per_symbol
                .entry(meta.symbol.clone())
                .and_modify(|s| {
                    s.first_date = s.first_date.min(meta.date);
                    s.last_date = s.last_date.max(meta.date);
                    s.days += 1;
                    s.tick_count += meta.tick_count;
                    s.size_bytes += meta.size_bytes;
                })
                .or_insert(SymbolStorage {
                    first_date: meta.date,
                    last_date: meta.date,
                    days: 1,
                    tick_count: meta.tick_count,
                    size_bytes: meta.size_bytes,
                });
        }

        stats.symbol_count = stats.per_symbol.len();
        stats
    }
}
