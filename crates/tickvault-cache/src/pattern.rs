//! Key patterns for bulk invalidation.

use regex::Regex;

/// Selects cache keys for [`TieredCache::invalidate`](crate::TieredCache::invalidate).
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Keys containing the string.
    Literal(String),
    /// Keys matching the regular expression.
    Regex(Regex),
}

impl KeyPattern {
    /// Compiles a regular-expression pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid regular expression.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Regex)
    }

    /// Returns true if `key` is selected.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Literal(needle) => key.contains(needle.as_str()),
            Self::Regex(re) => re.is_match(key),
        }
    }
}

impl From<&str> for KeyPattern {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<Regex> for KeyPattern {
    fn from(value: Regex) -> Self {
        Self::Regex(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_and_regex() {
        let literal = KeyPattern::from("EURUSD");
        assert!(literal.matches("candles:EURUSD:1m"));
        assert!(!literal.matches("candles:GBPUSD:1m"));

        let re = KeyPattern::regex(r"^candles:[A-Z]+:(1m|5m)$").unwrap();
        assert!(re.matches("candles:GBPUSD:5m"));
        assert!(!re.matches("candles:GBPUSD:1h"));
        assert!(KeyPattern::regex("(").is_err());
    }
}
