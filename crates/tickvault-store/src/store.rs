//! Partitioned tick store.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tickvault_types::{DateRange, TickRecord, now_ms};
use tracing::{debug, error, info, warn};

use crate::{PartitionMeta, Result, StorageBackend, StorageStats, StoreError};

/// Namespace holding serialized tick segments.
pub const TICKS_NAMESPACE: &str = "ticks";
/// Namespace holding partition metadata.
pub const META_NAMESPACE: &str = "meta";

type PartitionIndex = BTreeMap<String, BTreeMap<NaiveDate, PartitionMeta>>;

/// Durable tick storage partitioned by `(symbol, UTC day)`.
///
/// Partition metadata is mirrored in an in-memory index so that presence
/// checks and statistics never touch tick records. Writes to the same
/// partition are serialized through a per-partition async lock; writes to
/// different partitions proceed concurrently.
///
/// A partition is a list of segments, each a sorted JSON array of ticks
/// stored under `{symbol}/{date}/{segment}`. A write whose ticks all follow
/// the stored ones appends a segment, so a streamed day costs one write per
/// chunk. Any other write compacts the partition into a single new segment.
/// The metadata record names the live segments and is written after them,
/// so an interrupted write leaves the previous state readable.
///
/// Reads degrade to empty results when the backend fails (the error is
/// logged), while writes propagate [`StoreError`] so that callers can retry.
#[derive(Debug)]
pub struct TickStore {
    backend: Arc<dyn StorageBackend>,
    index: RwLock<PartitionIndex>,
    write_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TickStore {
    /// Opens a tick store over `backend`, loading partition metadata.
    ///
    /// Partitions whose metadata is missing or unreadable are recounted from
    /// their stored ticks.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be scanned.
    pub async fn open(backend: Arc<dyn StorageBackend>) -> Result<Self> {
        let store = Self {
            backend,
            index: RwLock::new(BTreeMap::new()),
            write_locks: Mutex::new(HashMap::new()),
        };
        store.load_index().await?;
        Ok(store)
    }

    /// Returns the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    async fn load_index(&self) -> Result<()> {
        let mut index = PartitionIndex::new();

        for key in self.backend.scan(META_NAMESPACE, "").await? {
            let Some(bytes) = self.backend.get(META_NAMESPACE, &key).await? else {
                continue;
            };
            match serde_json::from_slice::<PartitionMeta>(&bytes) {
                Ok(meta) => {
                    index
                        .entry(meta.symbol.clone())
                        .or_default()
                        .insert(meta.date, meta);
                }
                Err(e) => warn!(key = %key, error = %e, "skipping unreadable partition metadata"),
            }
        }

        let mut unindexed: BTreeMap<(String, NaiveDate), Vec<u32>> = BTreeMap::new();
        let mut orphans = 0usize;
        for key in self.backend.scan(TICKS_NAMESPACE, "").await? {
            let Some((symbol, date, segment)) = parse_segment_key(&key) else {
                warn!(key = %key, "ignoring tick segment with malformed key");
                continue;
            };
            match index.get(symbol).and_then(|days| days.get(&date)) {
                Some(meta) if meta.segments.contains(&segment) => {}
                Some(_) => {
                    // Left behind by an interrupted write or compaction.
                    self.backend.delete(TICKS_NAMESPACE, &key).await?;
                    orphans += 1;
                }
                None => unindexed
                    .entry((symbol.to_string(), date))
                    .or_default()
                    .push(segment),
            }
        }

        let mut recounted = 0usize;
        for ((symbol, date), mut segments) in unindexed {
            segments.sort_unstable();
            let ticks = self.read_segments(&symbol, date, &segments).await?;
            let mut meta = PartitionMeta::from_ticks(&symbol, date, &ticks, now_ms());
            meta.segments = segments;
            self.write_meta(&meta).await?;
            index.entry(symbol).or_default().insert(date, meta);
            recounted += 1;
        }

        let partitions: usize = index.values().map(BTreeMap::len).sum();
        info!(
            symbols = index.len(),
            partitions, recounted, orphans, "tick store index loaded"
        );
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = index;
        Ok(())
    }

    /// Upserts ticks into the `(symbol, date)` partition.
    ///
    /// Ticks are keyed by timestamp: a tick whose timestamp is already stored
    /// replaces the stored one, so repeating a write is idempotent. Ticks
    /// whose timestamp falls outside `date` are dropped with a warning.
    ///
    /// Ticks that all follow the latest stored tick are appended as a new
    /// segment without reading the partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition cannot be read or written.
    pub async fn store_ticks(&self, symbol: &str, date: NaiveDate, ticks: &[TickRecord]) -> Result<()> {
        let lock = self.partition_lock(symbol, date);
        let result = {
            let _guard = lock.lock().await;
            self.write_partition(symbol, date, ticks).await
        };
        self.release_partition_lock(symbol, date, lock);
        result
    }

    async fn write_partition(&self, symbol: &str, date: NaiveDate, ticks: &[TickRecord]) -> Result<()> {
        let mut chunk: BTreeMap<u64, TickRecord> = BTreeMap::new();
        let mut rejected = 0usize;
        for tick in ticks {
            if tick.partition_date() != date {
                rejected += 1;
                continue;
            }
            let mut tick = tick.clone();
            if tick.symbol != symbol {
                symbol.clone_into(&mut tick.symbol);
            }
            chunk.insert(tick.timestamp_ms, tick);
        }
        if rejected > 0 {
            warn!(symbol, %date, rejected, "dropped ticks outside partition day");
        }
        if chunk.is_empty() {
            return Ok(());
        }

        let meta = match self.partition_meta(symbol, date) {
            Some(previous)
                if previous
                    .last_tick_ms
                    .zip(chunk.first_key_value())
                    .is_some_and(|(last, (first, _))| *first <= last) =>
            {
                self.compact_partition(symbol, date, previous, chunk).await?
            }
            previous => {
                let meta = previous.unwrap_or_else(|| PartitionMeta::from_ticks(symbol, date, &[], now_ms()));
                self.append_partition(symbol, date, meta, chunk).await?
            }
        };
        self.insert_meta(meta);
        Ok(())
    }

    async fn append_partition(
        &self,
        symbol: &str,
        date: NaiveDate,
        mut meta: PartitionMeta,
        chunk: BTreeMap<u64, TickRecord>,
    ) -> Result<PartitionMeta> {
        let segment = meta.next_segment();
        let ticks: Vec<TickRecord> = chunk.into_values().collect();
        self.put_segment(symbol, date, segment, &ticks).await?;
        meta.append_segment(segment, &ticks, now_ms());
        self.write_meta(&meta).await?;
        debug!(symbol, %date, segment, ticks = ticks.len(), "partition segment appended");
        Ok(meta)
    }

    async fn compact_partition(
        &self,
        symbol: &str,
        date: NaiveDate,
        previous: PartitionMeta,
        mut chunk: BTreeMap<u64, TickRecord>,
    ) -> Result<PartitionMeta> {
        let mut merged: BTreeMap<u64, TickRecord> = self
            .read_segments(symbol, date, &previous.segments)
            .await?
            .into_iter()
            .map(|tick| (tick.timestamp_ms, tick))
            .collect();
        merged.append(&mut chunk);
        let merged: Vec<TickRecord> = merged.into_values().collect();

        let segment = previous.next_segment();
        self.put_segment(symbol, date, segment, &merged).await?;
        let mut meta = PartitionMeta::from_ticks(symbol, date, &merged, now_ms());
        meta.complete = previous.complete;
        meta.segments = vec![segment];
        self.write_meta(&meta).await?;
        for stale in &previous.segments {
            let key = segment_key(symbol, date, *stale);
            if let Err(e) = self.backend.delete(TICKS_NAMESPACE, &key).await {
                // Unlisted segments are removed on the next open.
                warn!(key = %key, error = %e, "failed to delete compacted segment");
            }
        }
        debug!(
            symbol,
            %date,
            segments = previous.segments.len(),
            ticks = meta.tick_count,
            "partition compacted"
        );
        Ok(meta)
    }

    /// Marks a partition as fully downloaded, creating empty metadata if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be written.
    pub async fn mark_complete(&self, symbol: &str, date: NaiveDate) -> Result<()> {
        let lock = self.partition_lock(symbol, date);
        let result = {
            let _guard = lock.lock().await;
            let mut meta = self
                .partition_meta(symbol, date)
                .unwrap_or_else(|| PartitionMeta::from_ticks(symbol, date, &[], now_ms()));
            meta.complete = true;
            self.write_meta(&meta).await.map(|()| self.insert_meta(meta))
        };
        self.release_partition_lock(symbol, date, lock);
        result
    }

    /// Returns ticks for the days in `range`, ascending by timestamp.
    ///
    /// At most `limit` ticks are returned when given (the earliest ones).
    /// Partitions without data contribute nothing; a failing partition read is
    /// logged and skipped.
    pub async fn get_ticks(&self, symbol: &str, range: DateRange, limit: Option<usize>) -> Vec<TickRecord> {
        let dates: Vec<NaiveDate> = self
            .get_downloaded_dates(symbol)
            .into_iter()
            .filter(|d| range.contains(*d))
            .collect();

        let mut ticks = Vec::new();
        for date in dates {
            if limit.is_some_and(|l| ticks.len() >= l) {
                break;
            }
            ticks.extend(self.get_ticks_by_date(symbol, date).await);
        }
        if let Some(limit) = limit {
            ticks.truncate(limit);
        }
        ticks
    }

    /// Returns ticks with `start_ms <= timestamp < end_ms`, ascending.
    pub async fn get_ticks_between(&self, symbol: &str, start_ms: u64, end_ms: u64) -> Vec<TickRecord> {
        if end_ms <= start_ms {
            return Vec::new();
        }
        let Ok(range) = DateRange::covering_ms(start_ms, end_ms - 1) else {
            return Vec::new();
        };
        let mut ticks = self.get_ticks(symbol, range, None).await;
        ticks.retain(|t| t.timestamp_ms >= start_ms && t.timestamp_ms < end_ms);
        ticks
    }

    /// Returns the ticks of a single partition, ascending by timestamp.
    pub async fn get_ticks_by_date(&self, symbol: &str, date: NaiveDate) -> Vec<TickRecord> {
        let Some(meta) = self.partition_meta(symbol, date).filter(PartitionMeta::has_data) else {
            return Vec::new();
        };
        match self.read_segments(symbol, date, &meta.segments).await {
            Ok(ticks) => ticks,
            Err(e) => {
                error!(symbol, %date, error = %e, "failed to read tick partition");
                Vec::new()
            }
        }
    }

    /// Returns true if the partition holds at least one tick.
    #[must_use]
    pub fn has_data(&self, symbol: &str, date: NaiveDate) -> bool {
        self.with_index(|index| {
            index
                .get(symbol)
                .and_then(|days| days.get(&date))
                .is_some_and(PartitionMeta::has_data)
        })
    }

    /// Returns true if a full-day download finished for the partition.
    #[must_use]
    pub fn is_complete(&self, symbol: &str, date: NaiveDate) -> bool {
        self.partition_meta(symbol, date).is_some_and(|m| m.complete)
    }

    /// Returns the metadata of a partition, if it exists.
    #[must_use]
    pub fn partition_meta(&self, symbol: &str, date: NaiveDate) -> Option<PartitionMeta> {
        self.with_index(|index| index.get(symbol).and_then(|days| days.get(&date)).cloned())
    }

    /// Returns the metadata of all partitions of a symbol, ascending by date.
    #[must_use]
    pub fn symbol_partitions(&self, symbol: &str) -> Vec<PartitionMeta> {
        self.with_index(|index| {
            index
                .get(symbol)
                .map(|days| days.values().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// Returns the days with persisted ticks for a symbol, ascending.
    #[must_use]
    pub fn get_downloaded_dates(&self, symbol: &str) -> Vec<NaiveDate> {
        self.with_index(|index| {
            index
                .get(symbol)
                .map(|days| {
                    days.values()
                        .filter(|m| m.has_data())
                        .map(|m| m.date)
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    /// Returns all symbols with at least one partition of data.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        self.with_index(|index| {
            index
                .iter()
                .filter(|(_, days)| days.values().any(PartitionMeta::has_data))
                .map(|(symbol, _)| symbol.clone())
                .collect()
        })
    }

    /// Deletes a single partition and its metadata.
    ///
    /// Returns true if any tick segment was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend delete fails.
    pub async fn delete_ticks(&self, symbol: &str, date: NaiveDate) -> Result<bool> {
        let lock = self.partition_lock(symbol, date);
        let result = {
            let _guard = lock.lock().await;
            self.remove_partition(symbol, date).await
        };
        self.release_partition_lock(symbol, date, lock);
        result
    }

    async fn remove_partition(&self, symbol: &str, date: NaiveDate) -> Result<bool> {
        let prefix = format!("{}/", partition_key(symbol, date));
        let mut removed = false;
        for key in self.backend.scan(TICKS_NAMESPACE, &prefix).await? {
            removed |= self.backend.delete(TICKS_NAMESPACE, &key).await?;
        }
        self.backend
            .delete(META_NAMESPACE, &partition_key(symbol, date))
            .await?;

        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(days) = index.get_mut(symbol) {
            days.remove(&date);
            if days.is_empty() {
                index.remove(symbol);
            }
        }
        Ok(removed)
    }

    /// Deletes every partition of a symbol, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend delete fails.
    pub async fn clear_symbol(&self, symbol: &str) -> Result<usize> {
        let prefix = format!("{symbol}/");
        let mut dates: Vec<NaiveDate> = self
            .symbol_partitions(symbol)
            .into_iter()
            .map(|m| m.date)
            .collect();
        for key in self.backend.scan(TICKS_NAMESPACE, &prefix).await? {
            if let Some((_, date, _)) = parse_segment_key(&key) {
                dates.push(date);
            }
        }
        dates.sort_unstable();
        dates.dedup();

        let mut removed = 0;
        for date in dates {
            if self.delete_ticks(symbol, date).await? {
                removed += 1;
            }
        }
        info!(symbol, removed, "cleared symbol");
        Ok(removed)
    }

    /// Deletes all partitions and metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be cleared.
    pub async fn clear_all(&self) -> Result<()> {
        self.backend.clear(TICKS_NAMESPACE).await?;
        self.backend.clear(META_NAMESPACE).await?;
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        info!("cleared all tick partitions");
        Ok(())
    }

    /// Returns storage statistics aggregated from partition metadata.
    #[must_use]
    pub fn get_storage_stats(&self) -> StorageStats {
        self.with_index(|index| StorageStats::from_partitions(index.values().flat_map(BTreeMap::values)))
    }

    /// Reads segments in order and merges them by timestamp; later segments win.
    async fn read_segments(&self, symbol: &str, date: NaiveDate, segments: &[u32]) -> Result<Vec<TickRecord>> {
        let mut merged = BTreeMap::new();
        for segment in segments {
            let Some(ticks) = self.read_segment(symbol, date, *segment).await? else {
                warn!(symbol, %date, segment, "tick segment missing");
                continue;
            };
            merged.extend(ticks.into_iter().map(|tick| (tick.timestamp_ms, tick)));
        }
        Ok(merged.into_values().collect())
    }

    async fn read_segment(&self, symbol: &str, date: NaiveDate, segment: u32) -> Result<Option<Vec<TickRecord>>> {
        let key = segment_key(symbol, date, segment);
        let Some(bytes) = self.backend.get(TICKS_NAMESPACE, &key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                namespace: TICKS_NAMESPACE.to_string(),
                key,
                source: e,
            })
    }

    async fn put_segment(&self, symbol: &str, date: NaiveDate, segment: u32, ticks: &[TickRecord]) -> Result<()> {
        self.backend
            .put(
                TICKS_NAMESPACE,
                &segment_key(symbol, date, segment),
                serde_json::to_vec(ticks)?,
            )
            .await
    }

    async fn write_meta(&self, meta: &PartitionMeta) -> Result<()> {
        let key = partition_key(&meta.symbol, meta.date);
        self.backend
            .put(META_NAMESPACE, &key, serde_json::to_vec(meta)?)
            .await
    }

    fn insert_meta(&self, meta: PartitionMeta) {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        index
            .entry(meta.symbol.clone())
            .or_default()
            .insert(meta.date, meta);
    }

    fn with_index<R>(&self, f: impl FnOnce(&PartitionIndex) -> R) -> R {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        f(&index)
    }

    fn partition_lock(&self, symbol: &str, date: NaiveDate) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(partition_key(symbol, date)).or_default())
    }

    /// Drops the map entry of a partition lock once no task holds it.
    fn release_partition_lock(&self, symbol: &str, date: NaiveDate, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let mut locks = self
            .write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let key = partition_key(symbol, date);
        if locks.get(&key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&key);
        }
    }

    #[cfg(test)]
    fn write_lock_count(&self) -> usize {
        self.write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Builds the metadata key of a partition: `{symbol}/{YYYY-MM-DD}`.
#[must_use]
pub fn partition_key(symbol: &str, date: NaiveDate) -> String {
    format!("{symbol}/{date}")
}

/// Builds the backend key of one tick segment of a partition.
#[must_use]
pub fn segment_key(symbol: &str, date: NaiveDate, segment: u32) -> String {
    format!("{symbol}/{date}/{segment:08}")
}

fn parse_segment_key(key: &str) -> Option<(&str, NaiveDate, u32)> {
    let (partition, segment) = key.rsplit_once('/')?;
    let (symbol, date) = partition.rsplit_once('/')?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some((symbol, date, segment.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileBackend, MemoryBackend};
    use tempfile::TempDir;
    use tickvault_types::day_start_ms;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn ticks_for(symbol: &str, date: NaiveDate, offsets_s: &[u64]) -> Vec<TickRecord> {
        offsets_s
            .iter()
            .map(|s| TickRecord::new(symbol, day_start_ms(date) + s * 1000, 1.0, 1.1, 1.0))
            .collect()
    }

    async fn memory_store() -> (Arc<MemoryBackend>, TickStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = TickStore::open(backend.clone()).await.unwrap();
        (backend, store)
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let (_, store) = memory_store().await;
        let ticks = ticks_for("EURUSD", day(20), &[30, 10, 20]);

        store.store_ticks("EURUSD", day(20), &ticks).await.unwrap();
        store.store_ticks("EURUSD", day(20), &ticks).await.unwrap();

        let stored = store.get_ticks_by_date("EURUSD", day(20)).await;
        let times: Vec<u64> = stored.iter().map(|t| t.timestamp_ms).collect();
        assert_eq!(stored.len(), 3);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(store.partition_meta("EURUSD", day(20)).unwrap().tick_count, 3);
    }

    #[tokio::test]
    async fn test_overlapping_write_replaces_by_key() {
        let (_, store) = memory_store().await;
        store
            .store_ticks("EURUSD", day(20), &ticks_for("EURUSD", day(20), &[1, 2]))
            .await
            .unwrap();

        let mut update = ticks_for("EURUSD", day(20), &[2, 3]);
        update[0].bid = 2.0;
        store.store_ticks("EURUSD", day(20), &update).await.unwrap();

        let stored = store.get_ticks_by_date("EURUSD", day(20)).await;
        assert_eq!(stored.len(), 3);
        assert!((stored[1].bid - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_sequential_chunks_append_segments() {
        let (backend, store) = memory_store().await;
        store
            .store_ticks("EURUSD", day(20), &ticks_for("EURUSD", day(20), &[1, 2]))
            .await
            .unwrap();
        let first_key = segment_key("EURUSD", day(20), 0);
        let first = backend.get(TICKS_NAMESPACE, &first_key).await.unwrap();

        store
            .store_ticks("EURUSD", day(20), &ticks_for("EURUSD", day(20), &[4, 3]))
            .await
            .unwrap();

        let meta = store.partition_meta("EURUSD", day(20)).unwrap();
        assert_eq!(meta.segments, vec![0, 1]);
        assert_eq!(meta.tick_count, 4);
        assert_eq!(meta.last_tick_ms, Some(day_start_ms(day(20)) + 4_000));
        assert_eq!(backend.get(TICKS_NAMESPACE, &first_key).await.unwrap(), first);

        let stored = store.get_ticks_by_date("EURUSD", day(20)).await;
        let times: Vec<u64> = stored
            .iter()
            .map(|t| (t.timestamp_ms - day_start_ms(day(20))) / 1000)
            .collect();
        assert_eq!(times, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_out_of_order_chunk_compacts_partition() {
        let (backend, store) = memory_store().await;
        for offsets in [&[1, 2][..], &[3][..], &[5][..]] {
            store
                .store_ticks("EURUSD", day(20), &ticks_for("EURUSD", day(20), offsets))
                .await
                .unwrap();
        }
        store.mark_complete("EURUSD", day(20)).await.unwrap();

        store
            .store_ticks("EURUSD", day(20), &ticks_for("EURUSD", day(20), &[4]))
            .await
            .unwrap();

        let meta = store.partition_meta("EURUSD", day(20)).unwrap();
        assert_eq!(meta.segments, vec![3]);
        assert_eq!(meta.tick_count, 5);
        assert!(meta.complete);
        assert_eq!(
            backend.scan(TICKS_NAMESPACE, "").await.unwrap(),
            vec![segment_key("EURUSD", day(20), 3)]
        );
        assert_eq!(store.get_ticks_by_date("EURUSD", day(20)).await.len(), 5);
    }

    #[tokio::test]
    async fn test_unlisted_segments_removed_on_open() {
        let backend = Arc::new(MemoryBackend::new());
        {
            let store = TickStore::open(backend.clone()).await.unwrap();
            store
                .store_ticks("EURUSD", day(20), &ticks_for("EURUSD", day(20), &[1, 2]))
                .await
                .unwrap();
        }
        // A segment whose metadata update never landed.
        let stray = serde_json::to_vec(&ticks_for("EURUSD", day(20), &[9])).unwrap();
        backend
            .put(TICKS_NAMESPACE, &segment_key("EURUSD", day(20), 1), stray)
            .await
            .unwrap();

        let store = TickStore::open(backend.clone()).await.unwrap();
        assert_eq!(store.get_ticks_by_date("EURUSD", day(20)).await.len(), 2);
        assert_eq!(backend.scan(TICKS_NAMESPACE, "").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_partition_locks_are_released() {
        let (_, store) = memory_store().await;
        for d in [20, 21, 22] {
            store
                .store_ticks("EURUSD", day(d), &ticks_for("EURUSD", day(d), &[1]))
                .await
                .unwrap();
        }
        store.mark_complete("EURUSD", day(20)).await.unwrap();
        assert_eq!(store.write_lock_count(), 0);

        let lock = store.partition_lock("EURUSD", day(21));
        assert!(store.delete_ticks("EURUSD", day(22)).await.unwrap());
        assert_eq!(store.write_lock_count(), 1);
        drop(lock);
        store.clear_all().await.unwrap();
        assert_eq!(store.write_lock_count(), 0);
    }

    #[tokio::test]
    async fn test_ticks_outside_partition_are_dropped() {
        let (_, store) = memory_store().await;
        let mut ticks = ticks_for("EURUSD", day(20), &[1]);
        ticks.extend(ticks_for("EURUSD", day(21), &[1]));

        store.store_ticks("EURUSD", day(20), &ticks).await.unwrap();
        assert_eq!(store.get_ticks_by_date("EURUSD", day(20)).await.len(), 1);
        assert!(!store.has_data("EURUSD", day(21)));
    }

    #[tokio::test]
    async fn test_get_ticks_across_partitions() {
        let (_, store) = memory_store().await;
        for d in [19, 21, 20] {
            store
                .store_ticks("EURUSD", day(d), &ticks_for("EURUSD", day(d), &[5, 1]))
                .await
                .unwrap();
        }

        let range = DateRange::new(day(18), day(22)).unwrap();
        let ticks = store.get_ticks("EURUSD", range, None).await;
        assert_eq!(ticks.len(), 6);
        assert!(ticks.windows(2).all(|w| w[0].timestamp_ms < w[1].timestamp_ms));

        let limited = store.get_ticks("EURUSD", range, Some(3)).await;
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[2].partition_date(), day(20));

        let empty = store
            .get_ticks("EURUSD", DateRange::single_day(day(1)), None)
            .await;
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_get_ticks_between() {
        let (_, store) = memory_store().await;
        store
            .store_ticks("EURUSD", day(20), &ticks_for("EURUSD", day(20), &[0, 10, 20]))
            .await
            .unwrap();

        let start = day_start_ms(day(20)) + 5_000;
        let end = day_start_ms(day(20)) + 20_000;
        let ticks = store.get_ticks_between("EURUSD", start, end).await;
        assert_eq!(ticks.len(), 1);
        assert!(store.get_ticks_between("EURUSD", end, start).await.is_empty());
    }

    #[tokio::test]
    async fn test_downloaded_dates_and_delete() {
        let (_, store) = memory_store().await;
        for d in [22, 20, 21] {
            store
                .store_ticks("EURUSD", day(d), &ticks_for("EURUSD", day(d), &[1]))
                .await
                .unwrap();
        }
        assert_eq!(store.get_downloaded_dates("EURUSD"), vec![day(20), day(21), day(22)]);

        assert!(store.delete_ticks("EURUSD", day(21)).await.unwrap());
        assert!(!store.has_data("EURUSD", day(21)));
        assert_eq!(store.get_downloaded_dates("EURUSD"), vec![day(20), day(22)]);

        assert_eq!(store.clear_symbol("EURUSD").await.unwrap(), 2);
        assert!(store.get_downloaded_dates("EURUSD").is_empty());
        assert!(store.symbols().is_empty());
    }

    #[tokio::test]
    async fn test_storage_stats() {
        let (_, store) = memory_store().await;
        store
            .store_ticks("EURUSD", day(20), &ticks_for("EURUSD", day(20), &[1, 2]))
            .await
            .unwrap();
        store
            .store_ticks("GBPUSD", day(21), &ticks_for("GBPUSD", day(21), &[1]))
            .await
            .unwrap();

        let stats = store.get_storage_stats();
        assert_eq!(stats.symbol_count, 2);
        assert_eq!(stats.tick_count, 3);
        assert!(stats.total_size_bytes > 0);

        store.clear_all().await.unwrap();
        assert_eq!(store.get_storage_stats(), StorageStats::default());
    }

    #[tokio::test]
    async fn test_mark_complete() {
        let (_, store) = memory_store().await;

        store.mark_complete("EURUSD", day(17)).await.unwrap();
        assert!(store.is_complete("EURUSD", day(17)));
        assert!(!store.has_data("EURUSD", day(17)));

        store
            .store_ticks("EURUSD", day(20), &ticks_for("EURUSD", day(20), &[1]))
            .await
            .unwrap();
        store.mark_complete("EURUSD", day(20)).await.unwrap();
        // A later write keeps the flag.
        store
            .store_ticks("EURUSD", day(20), &ticks_for("EURUSD", day(20), &[2]))
            .await
            .unwrap();
        assert!(store.is_complete("EURUSD", day(20)));
    }

    #[tokio::test]
    async fn test_write_error_propagates_and_read_degrades() {
        let (backend, store) = memory_store().await;
        store
            .store_ticks("EURUSD", day(20), &ticks_for("EURUSD", day(20), &[1]))
            .await
            .unwrap();

        backend.set_offline(true);
        let err = store
            .store_ticks("EURUSD", day(21), &ticks_for("EURUSD", day(21), &[1]))
            .await;
        assert!(matches!(err, Err(StoreError::Unavailable(_))));
        assert!(store.get_ticks_by_date("EURUSD", day(20)).await.is_empty());
        assert!(store.has_data("EURUSD", day(20)));
    }

    #[tokio::test]
    async fn test_quota_error_propagates() {
        let backend = Arc::new(MemoryBackend::with_quota(64));
        let store = TickStore::open(backend).await.unwrap();
        let ticks = ticks_for("EURUSD", day(20), &[1, 2, 3, 4, 5]);

        let err = store.store_ticks("EURUSD", day(20), &ticks).await;
        assert!(matches!(err, Err(StoreError::QuotaExceeded { .. })));
        assert!(!store.has_data("EURUSD", day(20)));
    }

    #[tokio::test]
    async fn test_concurrent_writes_same_partition() {
        let (_, store) = memory_store().await;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let ticks = ticks_for("EURUSD", day(20), &[i]);
                    store.store_ticks("EURUSD", day(20), &ticks).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get_ticks_by_date("EURUSD", day(20)).await.len(), 8);
        assert_eq!(store.partition_meta("EURUSD", day(20)).unwrap().tick_count, 8);
    }

    #[tokio::test]
    async fn test_reopen_rebuilds_index() {
        let temp_dir = TempDir::new().unwrap();
        {
            let backend = Arc::new(FileBackend::new(temp_dir.path()).await.unwrap());
            let store = TickStore::open(backend).await.unwrap();
            store
                .store_ticks("EURUSD", day(20), &ticks_for("EURUSD", day(20), &[1, 2]))
                .await
                .unwrap();
            store.mark_complete("EURUSD", day(20)).await.unwrap();
        }

        let backend = Arc::new(FileBackend::new(temp_dir.path()).await.unwrap());
        let store = TickStore::open(backend).await.unwrap();
        assert!(store.has_data("EURUSD", day(20)));
        assert!(store.is_complete("EURUSD", day(20)));
        assert_eq!(store.get_ticks_by_date("EURUSD", day(20)).await.len(), 2);
    }

    #[tokio::test]
    async fn test_lost_metadata_is_recounted() {
        let backend = Arc::new(MemoryBackend::new());
        {
            let store = TickStore::open(backend.clone()).await.unwrap();
            store
                .store_ticks("EURUSD", day(20), &ticks_for("EURUSD", day(20), &[1, 2, 3]))
                .await
                .unwrap();
        }
        backend.clear(META_NAMESPACE).await.unwrap();

        let store = TickStore::open(backend).await.unwrap();
        assert_eq!(store.partition_meta("EURUSD", day(20)).unwrap().tick_count, 3);
    }
}
