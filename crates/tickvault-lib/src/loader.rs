//! Candle building from stored ticks.

use async_trait::async_trait;
use std::sync::Arc;
use tickvault_aggregate::{Candle, CandleEngine, EngineConfig};
use tickvault_cache::{CacheLoader, Result};
use tickvault_store::TickStore;
use tickvault_types::{Timeframe, now_ms};

/// Returns the exclusive end of the stored history of `symbol`.
///
/// This is one millisecond past the latest stored tick, or now if nothing is
/// stored.
#[must_use]
pub fn history_end_ms(store: &TickStore, symbol: &str) -> u64 {
    store
        .symbol_partitions(symbol)
        .iter()
        .filter_map(|meta| meta.last_tick_ms)
        .max()
        .map_or_else(now_ms, |last| last + 1)
}

/// Builds an engine loaded with the last `limit` candles of stored history.
pub async fn load_engine(
    store: &TickStore,
    symbol: &str,
    timeframe: Timeframe,
    limit: usize,
    config: EngineConfig,
) -> CandleEngine {
    let mut engine = CandleEngine::new(symbol, timeframe, config);
    let end_ms = history_end_ms(store, symbol);
    let range = engine.lookback_range(limit, end_ms);
    let ticks = store.get_ticks(symbol, range, None).await;
    engine.load_historical(&ticks, limit);
    engine
}

/// Prefetch loader that aggregates candles from the tick store.
#[derive(Debug, Clone)]
pub struct StoreCandleLoader {
    store: Arc<TickStore>,
    config: EngineConfig,
}

impl StoreCandleLoader {
    /// Creates a loader over `store`.
    #[must_use]
    pub const fn new(store: Arc<TickStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl CacheLoader for StoreCandleLoader {
    async fn load_candles(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>> {
        let engine = load_engine(
            &self.store,
            symbol,
            timeframe,
            self.config.max_candles,
            self.config,
        )
        .await;
        Ok(engine.get_historical_candles())
    }
}
