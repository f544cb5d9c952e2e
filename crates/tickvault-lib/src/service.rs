//! Explicit composition of the pipeline components.

use std::sync::Arc;
use tickvault_aggregate::{Candle, CandleEngine, EngineConfig};
use tickvault_cache::{TieredCache, candle_key};
use tickvault_download::DownloadManager;
use tickvault_fetch::TickSource;
use tickvault_store::{FileBackend, StorageBackend, TickStore};
use tickvault_types::Timeframe;
use tracing::{debug, info};

use crate::{PipelineConfig, Result, StoreCandleLoader, load_engine};

/// The tick store, cache and download manager of one data directory.
///
/// Candles are served cache-first. On a miss they are aggregated from the
/// tick store, cached, and the adjacent timeframes are prefetched in the
/// background.
#[derive(Debug, Clone)]
pub struct MarketDataService {
    config: PipelineConfig,
    store: Arc<TickStore>,
    cache: Arc<TieredCache>,
    downloads: DownloadManager,
}

impl MarketDataService {
    /// Opens file-backed storage under `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directories cannot be opened.
    pub async fn open(config: PipelineConfig, source: Arc<dyn TickSource>) -> Result<Self> {
        let ticks: Arc<dyn StorageBackend> = Arc::new(FileBackend::new(config.ticks_dir()).await?);
        let cache: Arc<dyn StorageBackend> = Arc::new(FileBackend::new(config.cache_dir()).await?);
        info!(data_dir = %config.data_dir.display(), "opening market data service");
        Self::with_backends(config, ticks, cache, source).await
    }

    /// Builds the service over the given storage backends.
    ///
    /// # Errors
    ///
    /// Returns an error if the tick store index cannot be loaded.
    pub async fn with_backends(
        config: PipelineConfig,
        ticks: Arc<dyn StorageBackend>,
        cache: Arc<dyn StorageBackend>,
        source: Arc<dyn TickSource>,
    ) -> Result<Self> {
        let store = Arc::new(TickStore::open(ticks).await?);
        let cache = Arc::new(TieredCache::new(cache, config.cache));
        let downloads = DownloadManager::new(Arc::clone(&store), source, config.download);
        Ok(Self {
            config,
            store,
            cache,
            downloads,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the tick store.
    #[must_use]
    pub const fn store(&self) -> &Arc<TickStore> {
        &self.store
    }

    /// Returns the cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Returns the download manager.
    #[must_use]
    pub const fn downloads(&self) -> &DownloadManager {
        &self.downloads
    }

    const fn engine_config(&self) -> EngineConfig {
        self.config.engine
    }

    /// Returns the last `limit` closed candles of `symbol` at `timeframe`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache fails.
    pub async fn load_candles(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let key = candle_key(symbol, timeframe);
        if let Some(candles) = self.cache.get::<Vec<Candle>>(&key).await? {
            debug!(symbol, %timeframe, "candles served from cache");
            return Ok(last(candles, limit));
        }

        let config = self.engine_config();
        let engine = load_engine(&self.store, symbol, timeframe, config.max_candles, config).await;
        let candles = engine.get_historical_candles();
        if candles.is_empty() {
            return Ok(candles);
        }

        self.cache.set(&key, candles.clone()).await?;
        self.spawn_prefetch(symbol, timeframe);
        Ok(last(candles, limit))
    }

    /// Returns an engine initialised with the last `limit` candles, ready
    /// for live ticks.
    pub async fn live_engine(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> CandleEngine {
        load_engine(&self.store, symbol, timeframe, limit, self.engine_config()).await
    }

    fn spawn_prefetch(&self, symbol: &str, timeframe: Timeframe) {
        let cache = Arc::clone(&self.cache);
        let loader = StoreCandleLoader::new(Arc::clone(&self.store), self.engine_config());
        let symbol = symbol.to_string();
        tokio::spawn(async move {
            cache.prefetch(&symbol, timeframe, &loader).await;
        });
    }

    /// Removes the cached candles of `symbol` for every timeframe.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache fails.
    pub async fn invalidate_candles(&self, symbol: &str) -> Result<usize> {
        let mut removed = 0;
        for timeframe in Timeframe::all() {
            if self.cache.delete(&candle_key(symbol, *timeframe)).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn last(mut candles: Vec<Candle>, limit: usize) -> Vec<Candle> {
    if candles.len() > limit {
        candles.drain(..candles.len() - limit);
    }
    candles
}
