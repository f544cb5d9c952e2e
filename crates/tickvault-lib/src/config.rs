//! Pipeline configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tickvault_aggregate::EngineConfig;
use tickvault_cache::CacheConfig;
use tickvault_download::DownloadConfig;
use tickvault_fetch::ClientConfig;

use crate::ConfigError;

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// History server connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Base URL of the history API.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum retry attempts per request.
    pub max_retries: u32,
    /// Ticks requested per page.
    pub page_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            base_url: client.base_url,
            timeout_secs: client.timeout.as_secs(),
            max_retries: client.max_retries,
            page_size: client.page_size,
        }
    }
}

impl ServerSettings {
    /// Builds the HTTP client configuration.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            page_size: self.page_size,
            ..ClientConfig::default()
        }
    }
}

/// Configuration of every pipeline component.
///
/// Missing fields in a configuration file take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the tick store and the durable cache tier.
    pub data_dir: PathBuf,
    /// History server settings.
    pub server: ServerSettings,
    /// Cache settings.
    pub cache: CacheConfig,
    /// Download settings.
    pub download: DownloadConfig,
    /// Candle engine settings.
    pub engine: EngineConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            server: ServerSettings::default(),
            cache: CacheConfig::default(),
            download: DownloadConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a default configuration rooted at `data_dir`.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Loads `path` if given, else `config.json` in the default data
    /// directory if it exists, else the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let default_file = default_data_dir().join(CONFIG_FILE_NAME);
        if default_file.is_file() {
            Self::load(&default_file)
        } else {
            Ok(Self::default())
        }
    }

    /// Writes the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| ConfigError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Returns the directory of the tick store.
    #[must_use]
    pub fn ticks_dir(&self) -> PathBuf {
        self.data_dir.join("ticks")
    }

    /// Returns the directory of the durable cache tier.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }
}

/// Returns the default data directory.
///
/// Uses the platform data directory (for example `~/.local/share/tickvault/`
/// on Linux), falling back to `~/.tickvault/`.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", "tickvault")
        .map_or_else(dirs_fallback, |proj_dirs| proj_dirs.data_dir().to_path_buf())
}

fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".tickvault")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::with_data_dir("/tmp/tv");
        assert_eq!(config.ticks_dir(), PathBuf::from("/tmp/tv/ticks"));
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/tv/cache"));
        assert_eq!(config.download.max_concurrent_downloads, 3);
        assert_eq!(config.engine.max_candles, 1000);
        assert_eq!(config.server.client_config().timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_load_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"data_dir": "/data", "download": {"max_concurrent_downloads": 2}, "server": {"base_url": "http://history:9000"}}"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.download.max_concurrent_downloads, 2);
        assert!(config.download.skip_partial_days);
        assert_eq!(config.server.client_config().base_url, "http://history:9000");
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        let mut config = PipelineConfig::with_data_dir(temp_dir.path());
        config.cache.default_ttl_ms = 1000;

        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_errors() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.json");
        assert!(matches!(
            PipelineConfig::load(&missing),
            Err(ConfigError::ReadFile { .. })
        ));

        let invalid = temp_dir.path().join("invalid.json");
        std::fs::write(&invalid, "not json").unwrap();
        assert!(matches!(
            PipelineConfig::load(&invalid),
            Err(ConfigError::Parse { .. })
        ));
    }
}
