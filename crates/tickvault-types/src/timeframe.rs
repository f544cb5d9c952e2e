//! Candle aggregation timeframe definitions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::TimeframeParseError;

/// Candle aggregation timeframe.
///
/// The variants form the canonical sequence `1m, 5m, 15m, 1h, 4h, 1d`, which
/// also defines which timeframes are adjacent for prefetching.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Timeframe {
    /// 1-minute candles.
    #[default]
    #[serde(rename = "1m")]
    Minute1,
    /// 5-minute candles.
    #[serde(rename = "5m")]
    Minute5,
    /// 15-minute candles.
    #[serde(rename = "15m")]
    Minute15,
    /// 1-hour candles.
    #[serde(rename = "1h")]
    Hour1,
    /// 4-hour candles.
    #[serde(rename = "4h")]
    Hour4,
    /// Daily candles.
    #[serde(rename = "1d")]
    Day1,
}

impl Timeframe {
    /// Returns the duration in seconds.
    #[must_use]
    pub const fn seconds(&self) -> u64 {
        match self {
            Self::Minute1 => 60,
            Self::Minute5 => 300,
            Self::Minute15 => 900,
            Self::Hour1 => 3600,
            Self::Hour4 => 14400,
            Self::Day1 => 86400,
        }
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub const fn milliseconds(&self) -> u64 {
        self.seconds() * 1000
    }

    /// Returns the bucket a timestamp falls into: `floor(ts / interval) * interval`.
    #[must_use]
    pub const fn bucket_start(&self, timestamp_ms: u64) -> u64 {
        let interval = self.milliseconds();
        timestamp_ms / interval * interval
    }

    /// Returns true if candles of this timeframe can be built by merging whole
    /// candles of `finer`.
    #[must_use]
    pub const fn is_multiple_of(&self, finer: Self) -> bool {
        self.milliseconds() >= finer.milliseconds()
            && self.milliseconds() % finer.milliseconds() == 0
    }

    /// Returns the timeframe as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Minute1 => "1m",
            Self::Minute5 => "5m",
            Self::Minute15 => "15m",
            Self::Hour1 => "1h",
            Self::Hour4 => "4h",
            Self::Day1 => "1d",
        }
    }

    /// Returns all timeframes in canonical order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Minute1,
            Self::Minute5,
            Self::Minute15,
            Self::Hour1,
            Self::Hour4,
            Self::Day1,
        ]
    }

    /// Returns the next finer timeframe in the canonical sequence.
    #[must_use]
    pub fn finer(&self) -> Option<Self> {
        let idx = self.position();
        idx.checked_sub(1).map(|i| Self::all()[i])
    }

    /// Returns the next coarser timeframe in the canonical sequence.
    #[must_use]
    pub fn coarser(&self) -> Option<Self> {
        Self::all().get(self.position() + 1).copied()
    }

    /// Returns the timeframes immediately finer and coarser than this one.
    #[must_use]
    pub fn adjacent(&self) -> Vec<Self> {
        self.finer().into_iter().chain(self.coarser()).collect()
    }

    fn position(&self) -> usize {
        Self::all().iter().position(|tf| tf == self).unwrap_or(0)
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1m" | "m1" | "minute" | "minute1" => Ok(Self::Minute1),
            "5m" | "m5" | "minute5" => Ok(Self::Minute5),
            "15m" | "m15" | "minute15" => Ok(Self::Minute15),
            "1h" | "h1" | "hour" | "hour1" => Ok(Self::Hour1),
            "4h" | "h4" | "hour4" => Ok(Self::Hour4),
            "1d" | "d1" | "day" | "day1" | "daily" => Ok(Self::Day1),
            _ => Err(TimeframeParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_seconds() {
        assert_eq!(Timeframe::Minute1.seconds(), 60);
        assert_eq!(Timeframe::Hour1.seconds(), 3600);
        assert_eq!(Timeframe::Day1.seconds(), 86400);
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("m1".parse::<Timeframe>().unwrap(), Timeframe::Minute1);
        assert_eq!("1h".parse::<Timeframe>().unwrap(), Timeframe::Hour1);
        assert_eq!("H4".parse::<Timeframe>().unwrap(), Timeframe::Hour4);
        assert!("30m".parse::<Timeframe>().is_err());
        assert!("tick".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_bucket_start() {
        assert_eq!(Timeframe::Minute1.bucket_start(59_999), 0);
        assert_eq!(Timeframe::Minute1.bucket_start(60_000), 60_000);
        assert_eq!(Timeframe::Minute5.bucket_start(61_000), 0);
        assert_eq!(Timeframe::Minute5.bucket_start(300_001), 300_000);
    }

    #[test]
    fn test_adjacency() {
        assert_eq!(Timeframe::Minute1.adjacent(), vec![Timeframe::Minute5]);
        assert_eq!(
            Timeframe::Hour1.adjacent(),
            vec![Timeframe::Minute15, Timeframe::Hour4]
        );
        assert_eq!(Timeframe::Day1.adjacent(), vec![Timeframe::Hour4]);
    }

    #[test]
    fn test_is_multiple_of() {
        assert!(Timeframe::Minute5.is_multiple_of(Timeframe::Minute1));
        assert!(Timeframe::Day1.is_multiple_of(Timeframe::Hour4));
        assert!(Timeframe::Minute1.is_multiple_of(Timeframe::Minute1));
        assert!(!Timeframe::Minute1.is_multiple_of(Timeframe::Minute5));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Timeframe::Minute15).unwrap();
        assert_eq!(json, "\"15m\"");
        let parsed: Timeframe = serde_json::from_str("\"4h\"").unwrap();
        assert_eq!(parsed, Timeframe::Hour4);
    }
}
