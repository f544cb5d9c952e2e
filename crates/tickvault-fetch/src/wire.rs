//! JSON bodies of the history API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tickvault_types::{Category, SymbolInfo, TickRecord};

/// Volume assigned to each fetched tick; the API reports quotes without size.
pub(crate) const TICK_VOLUME: f64 = 1.0;

#[derive(Debug, Deserialize)]
pub(crate) struct SymbolsResponse {
    pub(crate) symbols: Vec<WireSymbol>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSymbol {
    symbol: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    category: Category,
    #[serde(default)]
    tick_count: u64,
}

impl From<WireSymbol> for SymbolInfo {
    fn from(wire: WireSymbol) -> Self {
        Self {
            display_name: wire.display_name.filter(|name| *name != wire.symbol),
            category: wire.category,
            tick_count: wire.tick_count,
            ..Self::new(wire.symbol)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InfoResponse {
    symbol: String,
    #[serde(default)]
    earliest_date: String,
    #[serde(default)]
    latest_date: String,
    #[serde(default)]
    tick_count: u64,
    #[serde(default)]
    available_days: u32,
}

impl InfoResponse {
    pub(crate) fn into_symbol_info(self, category: Category) -> SymbolInfo {
        SymbolInfo {
            category,
            earliest_date: parse_day(&self.earliest_date),
            latest_date: parse_day(&self.latest_date),
            tick_count: self.tick_count,
            available_days: self.available_days,
            ..SymbolInfo::new(self.symbol)
        }
    }
}

/// Parses a `YYYY-MM-DD` day; the zero time (year 1) means "no data".
fn parse_day(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .filter(|date| date.to_string() != "0001-01-01")
}

#[derive(Debug, Deserialize)]
pub(crate) struct DayTicksResponse {
    pub(crate) ticks: Vec<WireDayTick>,
    pub(crate) total: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDayTick {
    timestamp: u64,
    bid: f64,
    ask: f64,
}

impl WireDayTick {
    pub(crate) fn into_tick(self, symbol: &str) -> TickRecord {
        TickRecord::new(symbol, self.timestamp, self.bid, self.ask, TICK_VOLUME)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RangeTicksResponse {
    pub(crate) ticks: Vec<WireRangeTick>,
    #[serde(default)]
    pub(crate) has_more: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireRangeTick {
    bid: f64,
    ask: f64,
    timestamp: DateTime<Utc>,
}

impl WireRangeTick {
    pub(crate) fn into_tick(self, symbol: &str) -> Option<TickRecord> {
        let timestamp_ms = u64::try_from(self.timestamp.timestamp_millis()).ok()?;
        Some(TickRecord::new(symbol, timestamp_ms, self.bid, self.ask, TICK_VOLUME))
    }
}
