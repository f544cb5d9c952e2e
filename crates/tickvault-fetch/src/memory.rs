//! In-process tick source.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tickvault_types::{Category, DateRange, SymbolInfo, TickRecord, day_start_ms};
use tokio_util::sync::CancellationToken;

use crate::{ChunkStream, FetchError, TickChunk, TickSource};

#[derive(Debug, Default)]
struct StreamCounters {
    started: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// Decrements the active stream count when a stream is dropped.
#[derive(Debug)]
struct ActiveStream(Arc<StreamCounters>);

impl ActiveStream {
    fn start(counters: &Arc<StreamCounters>) -> Self {
        counters.started.fetch_add(1, Ordering::SeqCst);
        let active = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak.fetch_max(active, Ordering::SeqCst);
        Self(Arc::clone(counters))
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Tick source serving ticks held in memory.
///
/// Used for offline sessions, benchmarks and tests. Chunk size and a delay
/// between chunks are configurable, individual days can be made to fail, and
/// the number of concurrently open streams is recorded.
#[derive(Debug)]
pub struct MemoryTickSource {
    ticks: RwLock<BTreeMap<String, BTreeMap<u64, TickRecord>>>,
    failing_days: Mutex<HashSet<(String, NaiveDate)>>,
    chunk_size: usize,
    chunk_delay: Duration,
    counters: Arc<StreamCounters>,
}

impl Default for MemoryTickSource {
    fn default() -> Self {
        Self {
            ticks: RwLock::new(BTreeMap::new()),
            failing_days: Mutex::new(HashSet::new()),
            chunk_size: 1000,
            chunk_delay: Duration::ZERO,
            counters: Arc::default(),
        }
    }
}

impl MemoryTickSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of ticks per streamed chunk.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Sets a delay before each streamed chunk.
    #[must_use]
    pub const fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Adds ticks, replacing any with the same symbol and timestamp.
    pub fn insert_ticks(&self, ticks: impl IntoIterator<Item = TickRecord>) {
        let mut map = self.ticks.write().unwrap_or_else(PoisonError::into_inner);
        for tick in ticks {
            map.entry(tick.symbol.clone())
                .or_default()
                .insert(tick.timestamp_ms, tick);
        }
    }

    /// Makes streaming fetches of `(symbol, date)` fail.
    pub fn fail_day(&self, symbol: &str, date: NaiveDate) {
        self.failing_days
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((symbol.to_string(), date));
    }

    /// Number of streaming fetches started so far.
    #[must_use]
    pub fn streams_started(&self) -> usize {
        self.counters.started.load(Ordering::SeqCst)
    }

    /// Number of streams currently open.
    #[must_use]
    pub fn active_streams(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Highest number of streams open at the same time.
    #[must_use]
    pub fn peak_active_streams(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    fn ticks_between(&self, symbol: &str, start_ms: u64, end_ms: u64) -> Option<Vec<TickRecord>> {
        let map = self.ticks.read().unwrap_or_else(PoisonError::into_inner);
        map.get(symbol)
            .map(|ticks| ticks.range(start_ms..end_ms).map(|(_, t)| t.clone()).collect())
    }

    fn describe(symbol: &str, ticks: &BTreeMap<u64, TickRecord>) -> SymbolInfo {
        let mut days: Vec<NaiveDate> = ticks.values().map(TickRecord::partition_date).collect();
        days.dedup();
        SymbolInfo {
            category: Category::from_symbol(symbol),
            earliest_date: days.first().copied(),
            latest_date: days.last().copied(),
            tick_count: ticks.len() as u64,
            available_days: u32::try_from(days.len()).unwrap_or(u32::MAX),
            ..SymbolInfo::new(symbol)
        }
    }
}

struct MemoryCursor {
    symbol: String,
    date: NaiveDate,
    remaining: std::vec::IntoIter<TickRecord>,
    fetched: usize,
    total: usize,
    chunk_size: usize,
    delay: Duration,
    started: bool,
    cancel: CancellationToken,
    _active: ActiveStream,
}

#[async_trait]
impl TickSource for MemoryTickSource {
    async fn fetch_available_symbols(&self) -> Result<Vec<SymbolInfo>, FetchError> {
        let map = self.ticks.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map
            .iter()
            .map(|(symbol, ticks)| Self::describe(symbol, ticks))
            .collect())
    }

    async fn fetch_symbol_info(&self, symbol: &str) -> Result<SymbolInfo, FetchError> {
        let map = self.ticks.read().unwrap_or_else(PoisonError::into_inner);
        map.get(symbol)
            .map(|ticks| Self::describe(symbol, ticks))
            .ok_or_else(|| FetchError::UnknownSymbol(symbol.to_string()))
    }

    fn stream_fetch_ticks(&self, symbol: &str, date: NaiveDate, cancel: CancellationToken) -> ChunkStream {
        let active = ActiveStream::start(&self.counters);

        let failing = self
            .failing_days
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(symbol.to_string(), date));
        if failing {
            let error = FetchError::Unavailable(format!("no data for {symbol} on {date}"));
            return stream::once(async move {
                drop(active);
                Err(error)
            })
            .boxed();
        }

        let start = day_start_ms(date);
        let day = self
            .ticks_between(symbol, start, start + tickvault_types::MS_PER_DAY)
            .unwrap_or_default();
        let cursor = MemoryCursor {
            symbol: symbol.to_string(),
            date,
            total: day.len(),
            remaining: day.into_iter(),
            fetched: 0,
            chunk_size: self.chunk_size,
            delay: self.chunk_delay,
            started: false,
            cancel,
            _active: active,
        };

        stream::try_unfold(cursor, |mut cursor| async move {
            if cursor.started && cursor.fetched >= cursor.total {
                return Ok(None);
            }
            if cursor.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            if !cursor.delay.is_zero() {
                tokio::select! {
                    () = cursor.cancel.cancelled() => return Err(FetchError::Cancelled),
                    () = tokio::time::sleep(cursor.delay) => {}
                }
            }

            let ticks: Vec<TickRecord> = cursor.remaining.by_ref().take(cursor.chunk_size).collect();
            cursor.fetched += ticks.len();
            cursor.started = true;
            let chunk = TickChunk {
                symbol: cursor.symbol.clone(),
                date: cursor.date,
                ticks,
                fetched: cursor.fetched,
                total: Some(cursor.total),
            };
            Ok(Some((chunk, cursor)))
        })
        .boxed()
    }

    async fn fetch_ticks_in_range(&self, symbol: &str, range: DateRange) -> Result<Vec<TickRecord>, FetchError> {
        self.ticks_between(symbol, range.start_ms(), range.end_ms_exclusive())
            .ok_or_else(|| FetchError::UnknownSymbol(symbol.to_string()))
    }
}
