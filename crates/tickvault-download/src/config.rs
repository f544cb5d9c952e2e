//! Download orchestration settings.

use serde::{Deserialize, Serialize};

/// Download manager configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Maximum number of tasks downloading at once.
    pub max_concurrent_downloads: usize,
    /// Skip days holding any ticks, even if their download never finished.
    ///
    /// With `false`, only days marked complete are skipped.
    pub skip_partial_days: bool,
    /// Ticks per day assumed when a symbol has no stored partitions.
    pub default_ticks_per_day: u64,
    /// Capacity of the event channel returned by `subscribe`.
    pub event_capacity: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 3,
            skip_partial_days: true,
            default_ticks_per_day: 50_000,
            event_capacity: 256,
        }
    }
}

impl DownloadConfig {
    /// Sets the maximum number of concurrent downloads (at least 1).
    #[must_use]
    pub fn with_max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent_downloads = max.max(1);
        self
    }

    /// Sets whether partially downloaded days are skipped.
    #[must_use]
    pub const fn with_skip_partial_days(mut self, skip: bool) -> Self {
        self.skip_partial_days = skip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DownloadConfig::default();
        assert_eq!(config.max_concurrent_downloads, 3);
        assert!(config.skip_partial_days);
        assert_eq!(DownloadConfig::default().with_max_concurrent_downloads(0).max_concurrent_downloads, 1);
    }

    #[test]
    fn test_partial_json() {
        let config: DownloadConfig = serde_json::from_str(r#"{"max_concurrent_downloads": 5}"#).unwrap();
        assert_eq!(config.max_concurrent_downloads, 5);
        assert_eq!(config.default_ticks_per_day, 50_000);
    }
}
