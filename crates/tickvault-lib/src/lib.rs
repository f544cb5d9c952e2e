//! Client-side historical market-data pipeline.
//!
//! This is a facade crate that re-exports functionality from the tickvault
//! workspace crates and composes them into a [`MarketDataService`].
//!
//! # Quick Start
//!
//! ```ignore
//! use tickvault_lib::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::load_or_default(None)?;
//!     let source = Arc::new(HttpTickSource::new(config.server.client_config())?);
//!     let service = MarketDataService::open(config, source).await?;
//!
//!     let range = DateRange::new(
//!         chrono::NaiveDate::from_ymd_opt(2026, 1, 19).unwrap(),
//!         chrono::NaiveDate::from_ymd_opt(2026, 1, 20).unwrap(),
//!     )?;
//!     let id = service.downloads().download_data("EURUSD", range, None);
//!     service.downloads().wait_for_task(&id).await;
//!
//!     let candles = service.load_candles("EURUSD", Timeframe::Minute5, 100).await?;
//!     println!("{} candles", candles.len());
//!     Ok(())
//! }
//! ```

#![doc(issue_tracker_base_url = "https://github.com/tickvault/tickvault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod service;

pub use config::{CONFIG_FILE_NAME, PipelineConfig, ServerSettings, default_data_dir};
pub use error::{ConfigError, Result, ServiceError};
pub use loader::{StoreCandleLoader, history_end_ms, load_engine};
pub use service::MarketDataService;

// Re-export core types
pub use tickvault_types::*;

// Re-export component crates
pub use tickvault_aggregate::{
    Candle, CandleEngine, EngineConfig, EngineError, EngineStats, TickUpdate, TimeframeChange,
    aggregate_ticks, calculate_heikin_ashi, merge_historical_and_live, resample_ohlc,
};
pub use tickvault_cache::{
    CacheConfig, CacheEntry, CacheError, CacheLoader, CacheStats, Cacheable, KeyPattern,
    TieredCache, candle_key,
};
pub use tickvault_download::{
    DownloadConfig, DownloadError, DownloadEvent, DownloadManager, DownloadTask,
    EstimateConfidence, ProgressCallback, TaskId, TaskStatus, TickEstimate, estimate_ticks,
};
pub use tickvault_fetch::{
    CancellationToken, ChunkStream, ClientConfig, FetchError, HttpTickSource, MemoryTickSource,
    TickChunk, TickSource,
};
pub use tickvault_store::{
    FileBackend, MemoryBackend, PartitionMeta, StorageBackend, StorageStats, StoreError,
    SymbolStorage, TickStore,
};

/// Prelude module for convenient imports.
///
/// ```
/// use tickvault_lib::prelude::*;
/// ```
pub mod prelude {
    pub use tickvault_types::{
        Category, DateRange, DateRangeError, SymbolInfo, TickRecord, Timeframe, Timestamped,
    };

    pub use tickvault_aggregate::{Candle, CandleEngine, TickUpdate};
    pub use tickvault_cache::{KeyPattern, TieredCache};
    pub use tickvault_download::{DownloadEvent, DownloadManager, DownloadTask, TaskId, TaskStatus};
    pub use tickvault_fetch::{HttpTickSource, TickSource};
    pub use tickvault_store::TickStore;

    pub use crate::{MarketDataService, PipelineConfig};
}
