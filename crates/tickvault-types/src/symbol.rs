//! Symbol descriptions reported by tick sources.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Symbol category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Foreign exchange currency pairs.
    Forex,
    /// Precious metals.
    Metals,
    /// Energy commodities.
    Energy,
    /// Cryptocurrencies.
    Crypto,
    /// Anything else.
    #[default]
    #[serde(other)]
    Other,
}

impl Category {
    /// Returns the category as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Forex => "forex",
            Self::Metals => "metals",
            Self::Energy => "energy",
            Self::Crypto => "crypto",
            Self::Other => "other",
        }
    }

    /// Guesses the category from a symbol name.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Self {
        let symbol = symbol.to_ascii_uppercase();
        let has = |needles: &[&str]| needles.iter().any(|n| symbol.contains(n));

        if has(&["XAU", "XAG"]) {
            Self::Metals
        } else if has(&["WTI", "BRENT"]) {
            Self::Energy
        } else if has(&["BTC", "ETH"]) {
            Self::Crypto
        } else if has(&["USD", "EUR", "GBP", "JPY"]) {
            Self::Forex
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Description of a symbol's historical data as reported by a tick source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    /// Symbol identifier (e.g., "EURUSD").
    pub symbol: String,
    /// Human-readable name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Symbol category.
    #[serde(default)]
    pub category: Category,
    /// First day with available ticks.
    #[serde(default)]
    pub earliest_date: Option<NaiveDate>,
    /// Last day with available ticks.
    #[serde(default)]
    pub latest_date: Option<NaiveDate>,
    /// Total tick count known to the source.
    #[serde(default)]
    pub tick_count: u64,
    /// Number of days with data.
    #[serde(default)]
    pub available_days: u32,
}

impl SymbolInfo {
    /// Creates a symbol description with only the identifier set.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            display_name: None,
            category: Category::Other,
            earliest_date: None,
            latest_date: None,
            tick_count: 0,
            available_days: 0,
        }
    }

    /// Returns true if the source reports data for the given day.
    #[must_use]
    pub fn has_data_for(&self, date: NaiveDate) -> bool {
        self.earliest_date.is_some_and(|start| date >= start)
            && self.latest_date.is_none_or(|end| date <= end)
    }
}

impl std::fmt::Display for SymbolInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{} ({})", name, self.symbol),
            None => write!(f, "{}", self.symbol),
        }
    }
}
