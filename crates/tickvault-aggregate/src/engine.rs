//! Stateful candle engine for one symbol and timeframe.

use serde::{Deserialize, Serialize};
use tickvault_types::{DateRange, TickRecord, Timeframe, date_of_ms};
use tracing::{debug, trace};

use crate::{Candle, EngineError, aggregate_ticks, resample_ohlc};

/// Candle engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of closed candles retained; oldest are dropped first.
    pub max_candles: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_candles: 1000 }
    }
}

/// Result of feeding one live tick to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TickUpdate {
    /// Closed candles followed by the forming candle, in order.
    pub candles: Vec<Candle>,
    /// True if the tick opened a new forming candle.
    pub is_new_candle: bool,
    /// Index in `candles` of the candle the tick affected.
    pub index: usize,
    /// False if the tick was dropped as stale.
    pub accepted: bool,
}

/// Outcome of [`CandleEngine::change_timeframe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeframeChange {
    /// The engine already used the requested timeframe.
    Unchanged,
    /// Closed candles were resampled to the coarser timeframe.
    Resampled {
        /// Number of closed candles after resampling.
        candles: usize,
    },
    /// Candles were discarded; historical data must be loaded again.
    ReloadRequired,
}

/// Snapshot of engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Engine symbol.
    pub symbol: String,
    /// Current timeframe.
    pub timeframe: Timeframe,
    /// True once historical data has been loaded.
    pub initialized: bool,
    /// Number of closed candles held.
    pub historical_count: usize,
    /// Whether a forming candle exists.
    pub has_forming: bool,
    /// Live ticks folded into candles.
    pub ticks_processed: u64,
    /// Live ticks dropped as stale.
    pub ticks_dropped: u64,
    /// Timestamp of the newest processed tick.
    pub last_processed_tick_ms: Option<u64>,
}

/// Builds OHLC candles for one symbol from historical and live ticks.
///
/// The engine owns an append-only sequence of closed candles and at most one
/// forming candle. Closed candles are never modified after they are appended;
/// accessors hand out copies.
#[derive(Debug)]
pub struct CandleEngine {
    symbol: String,
    timeframe: Timeframe,
    config: EngineConfig,
    historical: Vec<Candle>,
    forming: Option<Candle>,
    /// The last closed candle came from a batch load or resample and may
    /// still receive ticks from its bucket.
    trailing_open: bool,
    initialized: bool,
    last_processed_tick_ms: Option<u64>,
    ticks_processed: u64,
    ticks_dropped: u64,
}

impl CandleEngine {
    /// Creates an uninitialized engine.
    #[must_use]
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, config: EngineConfig) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            config,
            historical: Vec::new(),
            forming: None,
            trailing_open: false,
            initialized: false,
            last_processed_tick_ms: None,
            ticks_processed: 0,
            ticks_dropped: 0,
        }
    }

    /// Returns the engine symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the current timeframe.
    #[must_use]
    pub const fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Returns true once historical data has been loaded.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the days of ticks needed to build the last `limit` candles
    /// ending at `end_ms`.
    #[must_use]
    pub fn lookback_range(&self, limit: usize, end_ms: u64) -> DateRange {
        let span = (limit as u64).saturating_mul(self.timeframe.milliseconds());
        let start_ms = self.timeframe.bucket_start(end_ms.saturating_sub(span));
        DateRange::covering_ms(start_ms, end_ms)
            .unwrap_or_else(|_| DateRange::single_day(date_of_ms(end_ms)))
    }

    /// Replaces engine state with closed candles folded from `ticks`.
    ///
    /// Ticks may arrive in any order. Only the most recent `limit` candles
    /// (further capped by the retention limit) are kept, and no forming candle
    /// exists afterwards. The newest candle is reopened by a live tick from
    /// its bucket that is newer than every loaded tick.
    pub fn load_historical(&mut self, ticks: &[TickRecord], limit: usize) -> Vec<Candle> {
        let mut candles = aggregate_ticks(ticks, self.timeframe);
        let keep = limit.min(self.config.max_candles);
        if candles.len() > keep {
            candles.drain(..candles.len() - keep);
        }

        self.trailing_open = !candles.is_empty();
        self.historical = candles;
        self.forming = None;
        self.initialized = true;
        self.last_processed_tick_ms = ticks.iter().map(|t| t.timestamp_ms).max();

        debug!(
            symbol = %self.symbol,
            timeframe = %self.timeframe,
            ticks = ticks.len(),
            candles = self.historical.len(),
            "loaded historical candles"
        );
        self.historical.clone()
    }

    /// Folds a live tick into the forming candle.
    ///
    /// A tick in a new bucket closes the forming candle and opens another.
    /// A tick whose bucket precedes the forming candle (or, with no forming
    /// candle, does not follow the last closed candle) is dropped and the
    /// sequence is returned unchanged.
    ///
    /// The exception is the last candle of a batch load or resample: its
    /// bucket was cut off by the end of the data, not by a rollover, so a tick
    /// from the same bucket that is newer than the last processed tick reopens
    /// it as the forming candle.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotInitialized`] before [`Self::load_historical`].
    pub fn process_tick(&mut self, tick: &TickRecord) -> Result<TickUpdate, EngineError> {
        if !self.initialized {
            return Err(EngineError::NotInitialized {
                symbol: self.symbol.clone(),
            });
        }

        let price = tick.mid();
        let bucket = self.timeframe.bucket_start(tick.timestamp_ms);

        let stale = match (self.forming, self.historical.last()) {
            (Some(forming), _) => bucket < forming.bucket_start_ms,
            (None, Some(last)) if self.trailing_open && bucket == last.bucket_start_ms => self
                .last_processed_tick_ms
                .is_some_and(|t| tick.timestamp_ms <= t),
            (None, Some(last)) => bucket <= last.bucket_start_ms,
            (None, None) => false,
        };
        if stale {
            return Ok(self.drop_tick(tick));
        }

        let forming = self.forming.take().or_else(|| self.take_trailing(bucket));
        self.trailing_open = false;
        let is_new_candle = match forming {
            Some(mut forming) if forming.bucket_start_ms == bucket => {
                forming.extend(price, tick.volume);
                self.forming = Some(forming);
                false
            }
            closed => {
                if let Some(closed) = closed {
                    self.close_candle(closed);
                }
                self.forming = Some(Candle::open_at(bucket, price, tick.volume));
                true
            }
        };

        self.ticks_processed += 1;
        self.last_processed_tick_ms = Some(
            self.last_processed_tick_ms
                .map_or(tick.timestamp_ms, |t| t.max(tick.timestamp_ms)),
        );

        let candles = self.get_all_candles();
        Ok(TickUpdate {
            index: candles.len() - 1,
            candles,
            is_new_candle,
            accepted: true,
        })
    }

    fn drop_tick(&mut self, tick: &TickRecord) -> TickUpdate {
        self.ticks_dropped += 1;
        trace!(symbol = %self.symbol, timestamp_ms = tick.timestamp_ms, "dropped stale tick");
        let candles = self.get_all_candles();
        TickUpdate {
            index: candles.len().saturating_sub(1),
            candles,
            is_new_candle: false,
            accepted: false,
        }
    }

    fn take_trailing(&mut self, bucket: u64) -> Option<Candle> {
        let reopen = self.trailing_open
            && self
                .historical
                .last()
                .is_some_and(|c| c.bucket_start_ms == bucket);
        if reopen { self.historical.pop() } else { None }
    }

    fn close_candle(&mut self, candle: Candle) {
        self.historical.push(candle);
        if self.historical.len() > self.config.max_candles {
            let excess = self.historical.len() - self.config.max_candles;
            self.historical.drain(..excess);
        }
    }

    /// Returns closed candles followed by the forming candle.
    #[must_use]
    pub fn get_all_candles(&self) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(self.historical.len() + 1);
        candles.extend_from_slice(&self.historical);
        candles.extend(self.forming);
        candles
    }

    /// Returns the closed candles.
    #[must_use]
    pub fn get_historical_candles(&self) -> Vec<Candle> {
        self.historical.clone()
    }

    /// Returns the forming candle, if any.
    #[must_use]
    pub const fn get_forming_candle(&self) -> Option<Candle> {
        self.forming
    }

    /// Returns the most recent closed candle, if any.
    #[must_use]
    pub fn get_last_closed_candle(&self) -> Option<Candle> {
        self.historical.last().copied()
    }

    /// Returns the last `n` candles, including the forming candle.
    #[must_use]
    pub fn get_last_candles(&self, n: usize) -> Vec<Candle> {
        let all = self.get_all_candles();
        let skip = all.len().saturating_sub(n);
        all[skip..].to_vec()
    }

    /// Returns candles whose bucket start lies in `[start_ms, end_ms]`.
    #[must_use]
    pub fn get_candles_in_range(&self, start_ms: u64, end_ms: u64) -> Vec<Candle> {
        self.historical
            .iter()
            .chain(self.forming.as_ref())
            .filter(|c| (start_ms..=end_ms).contains(&c.bucket_start_ms))
            .copied()
            .collect()
    }

    /// Switches the engine to `timeframe`.
    ///
    /// Closed candles are resampled when `timeframe` is a coarser multiple of
    /// the current one, together with the forming candle; the newest resampled
    /// candle is then rebuilt by the next live tick in its bucket. Otherwise
    /// all candles are discarded and the engine returns to the uninitialized
    /// state.
    pub fn change_timeframe(&mut self, timeframe: Timeframe) -> TimeframeChange {
        if timeframe == self.timeframe {
            return TimeframeChange::Unchanged;
        }

        let previous = self.timeframe;
        self.timeframe = timeframe;
        let forming = self.forming.take();

        if self.initialized && timeframe > previous && timeframe.is_multiple_of(previous) {
            self.historical.extend(forming);
            self.historical = resample_ohlc(&self.historical, timeframe);
            self.trailing_open = !self.historical.is_empty();
            debug!(
                symbol = %self.symbol,
                from = %previous,
                to = %timeframe,
                candles = self.historical.len(),
                "resampled candles"
            );
            TimeframeChange::Resampled {
                candles: self.historical.len(),
            }
        } else {
            self.historical.clear();
            self.trailing_open = false;
            self.initialized = false;
            debug!(symbol = %self.symbol, from = %previous, to = %timeframe, "timeframe change requires reload");
            TimeframeChange::ReloadRequired
        }
    }

    /// Discards all candles and returns to the uninitialized state.
    pub fn reset(&mut self) {
        self.historical.clear();
        self.forming = None;
        self.trailing_open = false;
        self.initialized = false;
        self.last_processed_tick_ms = None;
        self.ticks_processed = 0;
        self.ticks_dropped = 0;
    }

    /// Returns a snapshot of engine state.
    #[must_use]
    pub fn get_stats(&self) -> EngineStats {
        EngineStats {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            initialized: self.initialized,
            historical_count: self.historical.len(),
            has_forming: self.forming.is_some(),
            ticks_processed: self.ticks_processed,
            ticks_dropped: self.ticks_dropped,
            last_processed_tick_ms: self.last_processed_tick_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tickvault_types::day_start_ms;

    const BASE: u64 = 1_768_867_200_000; // 2026-01-20 00:00:00 UTC

    fn tick(offset_s: u64, mid: f64) -> TickRecord {
        TickRecord::new("EURUSD", BASE + offset_s * 1000, mid - 0.00005, mid + 0.00005, 1.0)
    }

    fn engine() -> CandleEngine {
        CandleEngine::new("EURUSD", Timeframe::Minute1, EngineConfig::default())
    }

    #[test]
    fn test_eurusd_scenario() {
        let ticks: Vec<TickRecord> = (0..120u64)
            .step_by(10)
            .enumerate()
            .map(|(i, s)| tick(s, if i % 2 == 0 { 1.04530 } else { 1.04550 }))
            .collect();

        let mut engine = engine();
        let candles = engine.load_historical(&ticks, 100);

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].bucket_start_ms, BASE);
        assert_eq!(candles[1].bucket_start_ms, BASE + 60_000);
        assert_relative_eq!(candles[0].volume, 6.0);
        assert_relative_eq!(candles[1].volume, 6.0);
        assert_relative_eq!(candles[0].high, 1.04550, epsilon = 1e-9);
        assert_relative_eq!(candles[0].low, 1.04530, epsilon = 1e-9);
        assert!(engine.get_forming_candle().is_none());
    }

    #[test]
    fn test_load_historical_clips_to_limit() {
        let ticks: Vec<TickRecord> = (0..10u64).map(|m| tick(m * 60, 1.0)).collect();
        let mut engine = CandleEngine::new("EURUSD", Timeframe::Minute1, EngineConfig { max_candles: 5 });

        assert_eq!(engine.load_historical(&ticks, 8).len(), 5);
        assert_eq!(engine.load_historical(&ticks, 3).len(), 3);
        assert_eq!(
            engine.get_last_closed_candle().unwrap().bucket_start_ms,
            BASE + 9 * 60_000
        );
    }

    #[test]
    fn test_process_tick_requires_initialization() {
        let mut engine = engine();
        let err = engine.process_tick(&tick(0, 1.0)).unwrap_err();
        assert!(matches!(err, EngineError::NotInitialized { .. }));
    }

    #[test]
    fn test_process_tick_lifecycle() {
        let mut engine = engine();
        engine.load_historical(&[tick(0, 1.0)], 100);

        let update = engine.process_tick(&tick(60, 1.1)).unwrap();
        assert!(update.is_new_candle);
        assert_eq!(update.index, 1);
        assert_eq!(update.candles.len(), 2);

        let update = engine.process_tick(&tick(90, 1.3)).unwrap();
        assert!(!update.is_new_candle);
        assert_eq!(update.index, 1);
        let forming = engine.get_forming_candle().unwrap();
        assert_relative_eq!(forming.high, 1.3, epsilon = 1e-9);
        assert_eq!(forming.tick_count, 2);

        let update = engine.process_tick(&tick(120, 1.2)).unwrap();
        assert!(update.is_new_candle);
        assert_eq!(update.index, 2);
        assert_eq!(engine.get_historical_candles().len(), 2);
        assert_relative_eq!(engine.get_last_closed_candle().unwrap().close, 1.3, epsilon = 1e-9);
    }

    #[test]
    fn test_stale_ticks_are_dropped() {
        let mut engine = engine();
        engine.load_historical(&[tick(0, 1.0), tick(60, 1.0), tick(75, 1.0)], 100);

        // Older than the loaded history.
        let update = engine.process_tick(&tick(30, 5.0)).unwrap();
        assert!(!update.accepted);
        let update = engine.process_tick(&tick(70, 5.0)).unwrap();
        assert!(!update.accepted);
        assert_eq!(update.candles, engine.get_historical_candles());

        engine.process_tick(&tick(180, 1.0)).unwrap();
        let update = engine.process_tick(&tick(130, 5.0)).unwrap();
        assert!(!update.accepted);
        assert!(!update.is_new_candle);

        let stats = engine.get_stats();
        assert_eq!(stats.ticks_dropped, 3);
        assert_eq!(stats.ticks_processed, 1);
        assert!(engine.get_all_candles().iter().all(|c| c.high < 2.0));
    }

    #[test]
    fn test_retention_cap() {
        let mut engine = CandleEngine::new("EURUSD", Timeframe::Minute1, EngineConfig { max_candles: 3 });
        engine.load_historical(&[], 10);
        for m in 0..10u64 {
            engine.process_tick(&tick(m * 60, 1.0)).unwrap();
        }

        let historical = engine.get_historical_candles();
        assert_eq!(historical.len(), 3);
        assert_eq!(historical[0].bucket_start_ms, BASE + 6 * 60_000);
        assert_eq!(engine.get_all_candles().len(), 4);
    }

    #[test]
    fn test_last_candles_and_range() {
        let mut engine = engine();
        let ticks: Vec<TickRecord> = (0..5u64).map(|m| tick(m * 60, 1.0)).collect();
        engine.load_historical(&ticks, 100);
        engine.process_tick(&tick(300, 1.0)).unwrap();

        let last = engine.get_last_candles(2);
        assert_eq!(last.len(), 2);
        assert_eq!(last[1].bucket_start_ms, BASE + 300_000);
        assert_eq!(engine.get_last_candles(50).len(), 6);

        let in_range = engine.get_candles_in_range(BASE + 60_000, BASE + 180_000);
        assert_eq!(in_range.len(), 3);
    }

    #[test]
    fn test_change_timeframe_resamples() {
        let mut engine = engine();
        let ticks: Vec<TickRecord> = (0..10u64).map(|m| tick(m * 60, 1.0 + m as f64 * 0.01)).collect();
        engine.load_historical(&ticks, 100);
        engine.process_tick(&tick(600, 2.0)).unwrap();

        let change = engine.change_timeframe(Timeframe::Minute5);
        assert_eq!(change, TimeframeChange::Resampled { candles: 3 });
        assert!(engine.get_forming_candle().is_none());
        assert!(engine.is_initialized());

        let first = engine.get_historical_candles()[0];
        assert_relative_eq!(first.open, 1.0, epsilon = 1e-9);
        assert_relative_eq!(first.close, 1.04, epsilon = 1e-9);
        assert_relative_eq!(first.volume, 5.0);

        // The former forming candle continues at the new granularity.
        let update = engine.process_tick(&tick(660, 2.5)).unwrap();
        assert!(update.accepted);
        assert!(!update.is_new_candle);
        let forming = engine.get_forming_candle().unwrap();
        assert_eq!(forming.bucket_start_ms, BASE + 600_000);
        assert_eq!(forming.tick_count, 2);
        assert_relative_eq!(forming.close, 2.5, epsilon = 1e-9);
        assert_eq!(engine.get_historical_candles().len(), 2);

        assert_eq!(engine.change_timeframe(Timeframe::Minute5), TimeframeChange::Unchanged);
    }

    #[test]
    fn test_live_ticks_continue_resampled_day() {
        let mut engine = CandleEngine::new("EURUSD", Timeframe::Hour1, EngineConfig::default());
        let history: Vec<TickRecord> = [0, 3_600, 7_200].iter().map(|s| tick(*s, 1.0)).collect();
        engine.load_historical(&history, 100);
        engine.change_timeframe(Timeframe::Day1);

        let mut accepted = 0;
        for s in (7_260..80_000).step_by(600) {
            if engine.process_tick(&tick(s, 1.1)).unwrap().accepted {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 122);
        assert_eq!(engine.get_stats().ticks_dropped, 0);
        assert!(engine.get_historical_candles().is_empty());
        let day = engine.get_forming_candle().unwrap();
        assert_eq!(day.bucket_start_ms, BASE);
        assert_eq!(day.tick_count, 125);
        assert_relative_eq!(day.open, 1.0, epsilon = 1e-9);
        assert_relative_eq!(day.close, 1.1, epsilon = 1e-9);
    }

    #[test]
    fn test_trailing_candle_reopens_after_load() {
        let mut engine = engine();
        engine.load_historical(&[tick(0, 1.0), tick(65, 1.0)], 100);

        let update = engine.process_tick(&tick(90, 1.2)).unwrap();
        assert!(update.accepted);
        assert!(!update.is_new_candle);
        assert_eq!(update.index, 1);
        assert_eq!(engine.get_historical_candles().len(), 1);
        assert_eq!(engine.get_forming_candle().unwrap().tick_count, 2);

        // After a rollover the closed candle stays closed.
        engine.process_tick(&tick(120, 1.0)).unwrap();
        assert!(!engine.process_tick(&tick(110, 1.0)).unwrap().accepted);
    }

    #[test]
    fn test_change_to_finer_timeframe_requires_reload() {
        let mut engine = CandleEngine::new("EURUSD", Timeframe::Hour1, EngineConfig::default());
        engine.load_historical(&[tick(0, 1.0)], 100);

        assert_eq!(engine.change_timeframe(Timeframe::Minute15), TimeframeChange::ReloadRequired);
        assert!(!engine.is_initialized());
        assert!(engine.get_all_candles().is_empty());
        assert_eq!(engine.timeframe(), Timeframe::Minute15);
    }

    #[test]
    fn test_reset() {
        let mut engine = engine();
        engine.load_historical(&[tick(0, 1.0)], 100);
        engine.process_tick(&tick(60, 1.0)).unwrap();
        engine.reset();

        let stats = engine.get_stats();
        assert!(!stats.initialized);
        assert_eq!(stats.historical_count, 0);
        assert!(!stats.has_forming);
        assert_eq!(stats.ticks_processed, 0);
    }

    #[test]
    fn test_lookback_range() {
        let engine = CandleEngine::new("EURUSD", Timeframe::Hour1, EngineConfig::default());
        let end = BASE + 3_600_000;

        let range = engine.lookback_range(48, end);
        assert_eq!(range.total_days(), 3);
        assert_eq!(day_start_ms(range.end), BASE);

        let single = engine.lookback_range(0, end);
        assert_eq!(single.total_days(), 1);
    }
}
