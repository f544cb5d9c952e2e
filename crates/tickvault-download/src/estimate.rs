//! Tick-count estimation from stored partition metadata.

use tickvault_store::TickStore;
use tickvault_types::DateRange;

/// Number of stored days needed for a high-confidence estimate.
const HIGH_CONFIDENCE_DAYS: usize = 5;

/// Confidence level of the estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimateConfidence {
    /// Averaged over enough stored days of the symbol.
    High,
    /// Averaged over a few stored days.
    Medium,
    /// No stored data; the configured default was used.
    Low,
}

impl EstimateConfidence {
    /// Returns the confidence as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for EstimateConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Estimated size of a download.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickEstimate {
    /// Average ticks per day used for the estimate.
    pub ticks_per_day: u64,
    /// Estimated ticks over the whole range.
    pub estimated_ticks: u64,
    /// Days in the range already holding data.
    pub stored_days: usize,
    /// Confidence level of the estimate.
    pub confidence: EstimateConfidence,
}

/// Estimates the ticks in `range` for `symbol`.
///
/// Uses the average tick count of the symbol's stored non-empty partitions,
/// falling back to `default_ticks_per_day` when there are none.
#[must_use]
pub fn estimate_ticks(store: &TickStore, symbol: &str, range: DateRange, default_ticks_per_day: u64) -> TickEstimate {
    let partitions: Vec<_> = store
        .symbol_partitions(symbol)
        .into_iter()
        .filter(|meta| meta.has_data())
        .collect();

    let (ticks_per_day, confidence) = if partitions.is_empty() {
        (default_ticks_per_day, EstimateConfidence::Low)
    } else {
        let total: u64 = partitions.iter().map(|meta| meta.tick_count).sum();
        let confidence = if partitions.len() >= HIGH_CONFIDENCE_DAYS {
            EstimateConfidence::High
        } else {
            EstimateConfidence::Medium
        };
        (total / partitions.len() as u64, confidence)
    };

    TickEstimate {
        ticks_per_day,
        estimated_ticks: ticks_per_day.saturating_mul(range.total_days() as u64),
        stored_days: partitions
            .iter()
            .filter(|meta| range.contains(meta.date))
            .count(),
        confidence,
    }
}
