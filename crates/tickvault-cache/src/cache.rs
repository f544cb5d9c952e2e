//! Two-tier cache over a memory map and a durable backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tickvault_aggregate::Candle;
use tickvault_store::StorageBackend;
use tickvault_types::{Timeframe, now_ms};
use tracing::{debug, info, warn};

use crate::entry::EntryHeader;
use crate::memory::MemoryTier;
use crate::{CacheEntry, CacheError, Cacheable, KeyPattern, Result};

/// Namespace of the durable tier.
pub const CACHE_NAMESPACE: &str = "cache";

/// Cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Byte budget of the memory tier.
    pub max_memory_bytes: u64,
    /// TTL applied by [`TieredCache::set`], in milliseconds.
    pub default_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: 50 * 1024 * 1024,
            default_ttl_ms: 3_600_000,
        }
    }
}

/// Cache occupancy and counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Bytes held in the memory tier.
    pub memory_size: u64,
    /// Entries held in the memory tier.
    pub memory_count: usize,
    /// Bytes held in the durable tier.
    pub disk_size: u64,
    /// Entries held in the durable tier.
    pub disk_count: usize,
    /// Reads that returned a value.
    pub hits: u64,
    /// Reads that found nothing usable.
    pub misses: u64,
    /// Entries evicted from the memory tier to make room.
    pub evictions: u64,
}

impl CacheStats {
    /// Returns hits / (hits + misses), or 0 when nothing was read.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Builds candles for a symbol and timeframe on behalf of [`TieredCache::prefetch`].
#[async_trait]
pub trait CacheLoader: Send + Sync {
    /// Loads candles; an empty result is not cached.
    async fn load_candles(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>>;
}

/// Returns the cache key of a symbol's candles at a timeframe.
#[must_use]
pub fn candle_key(symbol: &str, timeframe: Timeframe) -> String {
    format!("candles:{symbol}:{timeframe}")
}

/// Memory cache bounded by a byte budget, backed by a durable tier.
///
/// Every `set` is written to the durable tier. The memory tier keeps what
/// fits, evicting the oldest writes first; eviction happens under the same
/// lock as the insert that caused it. Reads check memory first and promote
/// durable hits only when they fit in the free budget. Expired entries found
/// on read are removed from both tiers.
///
/// Writes, deletes and durable reads of one key are serialized through a
/// per-key async lock, so the memory tier always holds the value of the last
/// durable write of a key or nothing.
#[derive(Debug)]
pub struct TieredCache {
    backend: Arc<dyn StorageBackend>,
    memory: Mutex<MemoryTier>,
    key_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TieredCache {
    /// Creates a cache over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, config: CacheConfig) -> Self {
        Self {
            backend,
            memory: Mutex::new(MemoryTier::new(config.max_memory_bytes)),
            key_locks: Mutex::new(HashMap::new()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the cache configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn memory(&self) -> MutexGuard<'_, MemoryTier> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `op` while holding the lock of `key`.
    async fn locked<R>(&self, key: &str, op: impl Future<Output = R>) -> R {
        let lock = Arc::clone(
            self.key_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key.to_string())
                .or_default(),
        );
        let result = {
            let _guard = lock.lock().await;
            op.await
        };
        drop(lock);

        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
        result
    }

    /// Reads a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable tier fails or holds a value that is
    /// not a `T`.
    pub async fn get<T: Cacheable>(&self, key: &str) -> Result<Option<T>> {
        let now = now_ms();
        let fresh = self
            .memory()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.value.downcast_ref::<T>().cloned());
        if let Some(value) = fresh {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(value));
        }
        self.locked(key, self.read_through(key, now)).await
    }

    async fn read_through<T: Cacheable>(&self, key: &str, now: u64) -> Result<Option<T>> {
        let cached = self
            .memory()
            .get(key)
            .map(|entry| (entry.is_expired(now), Arc::clone(&entry.value)));

        let expired_in_memory = match cached {
            Some((true, _)) => {
                self.memory().remove(key);
                true
            }
            Some((false, value)) => {
                // A value of another type falls through to the durable tier.
                if let Some(value) = value.downcast_ref::<T>() {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(value.clone()));
                }
                false
            }
            None => false,
        };
        if expired_in_memory {
            self.backend.delete(CACHE_NAMESPACE, key).await?;
            debug!(key, "expired cache entry removed on read");
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let Some(bytes) = self.backend.get(CACHE_NAMESPACE, key).await? else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };
        let entry: CacheEntry<T> = serde_json::from_slice(&bytes).map_err(|e| CacheError::Decode {
            key: key.to_string(),
            source: e,
        })?;

        if entry.is_expired(now) {
            self.backend.delete(CACHE_NAMESPACE, key).await?;
            debug!(key, "expired cache entry removed on read");
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let promoted = self.memory().insert_if_fits(
            key,
            Arc::new(entry.data.clone()),
            entry.expires_at,
            entry.size_bytes,
        );
        debug!(key, promoted, "durable cache hit");
        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(entry.data))
    }

    /// Writes a value with the default TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable write fails.
    pub async fn set<T: Cacheable>(&self, key: &str, data: T) -> Result<()> {
        self.set_with_ttl(key, data, self.config.default_ttl_ms).await
    }

    /// Writes a value that expires `ttl_ms` milliseconds from now.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable write fails.
    pub async fn set_with_ttl<T: Cacheable>(&self, key: &str, data: T, ttl_ms: u64) -> Result<()> {
        let written_at = now_ms();
        let entry = CacheEntry {
            key: key.to_string(),
            size_bytes: data.size_bytes() + key.len() as u64,
            data,
            written_at,
            expires_at: written_at.saturating_add(ttl_ms),
        };

        let bytes = serde_json::to_vec(&entry)?;
        self.locked(key, self.write_through(entry, bytes)).await
    }

    async fn write_through<T: Cacheable>(&self, entry: CacheEntry<T>, bytes: Vec<u8>) -> Result<()> {
        let key = entry.key.as_str();
        self.backend.put(CACHE_NAMESPACE, key, bytes).await?;

        let insert = self.memory().insert(
            key,
            Arc::new(entry.data),
            entry.expires_at,
            entry.size_bytes,
        );
        if !insert.evicted.is_empty() {
            self.evictions
                .fetch_add(insert.evicted.len() as u64, Ordering::Relaxed);
            debug!(key, evicted = ?insert.evicted, "evicted cache entries from memory");
        }
        if !insert.stored {
            debug!(key, size_bytes = entry.size_bytes, "cache entry exceeds memory budget; stored durably only");
        }
        Ok(())
    }

    /// Removes a key from both tiers, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable delete fails.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.locked(key, async {
            let in_memory = self.memory().remove(key);
            let in_durable = self.backend.delete(CACHE_NAMESPACE, key).await?;
            Ok(in_memory || in_durable)
        })
        .await
    }

    /// Removes every entry from both tiers.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable tier cannot be cleared.
    pub async fn clear(&self) -> Result<()> {
        self.memory().clear();
        let removed = self.backend.clear(CACHE_NAMESPACE).await?;
        info!(removed, "cache cleared");
        Ok(())
    }

    async fn keys(&self) -> Result<BTreeSet<String>> {
        let mut keys: BTreeSet<String> = self
            .backend
            .scan(CACHE_NAMESPACE, "")
            .await?
            .into_iter()
            .collect();
        keys.extend(self.memory().keys().cloned());
        Ok(keys)
    }

    /// Returns all live entries whose key starts with `prefix`, sorted by key.
    ///
    /// Entries that cannot be decoded as `T` are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable tier fails.
    pub async fn get_by_prefix<T: Cacheable>(&self, prefix: &str) -> Result<Vec<(String, T)>> {
        let keys: Vec<String> = self
            .keys()
            .await?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect();

        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            match self.get::<T>(&key).await {
                Ok(Some(value)) => values.push((key, value)),
                Ok(None) => {}
                Err(CacheError::Decode { key, source }) => {
                    warn!(key = %key, error = %source, "skipping cache entry of another type");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(values)
    }

    /// Removes every key selected by `pattern` from both tiers.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable tier fails.
    pub async fn invalidate(&self, pattern: &KeyPattern) -> Result<usize> {
        let keys: Vec<String> = self
            .keys()
            .await?
            .into_iter()
            .filter(|key| pattern.matches(key))
            .collect();

        for key in &keys {
            self.delete(key).await?;
        }
        debug!(invalidated = keys.len(), ?pattern, "cache entries invalidated");
        Ok(keys.len())
    }

    /// Populates candles for the timeframes adjacent to `timeframe`.
    ///
    /// Timeframes already cached are skipped. Loader and cache failures are
    /// logged and otherwise ignored. Returns the number of entries written.
    pub async fn prefetch<L>(&self, symbol: &str, timeframe: Timeframe, loader: &L) -> usize
    where
        L: CacheLoader + ?Sized,
    {
        let mut written = 0;
        for adjacent in timeframe.adjacent() {
            let key = candle_key(symbol, adjacent);
            match self.contains(&key).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "prefetch lookup failed");
                    continue;
                }
            }

            let candles = match loader.load_candles(symbol, adjacent).await {
                Ok(candles) if candles.is_empty() => continue,
                Ok(candles) => candles,
                Err(e) => {
                    warn!(key = %key, error = %e, "prefetch load failed");
                    continue;
                }
            };
            match self.set(&key, candles).await {
                Ok(()) => written += 1,
                Err(e) => warn!(key = %key, error = %e, "prefetch write failed"),
            }
        }
        debug!(symbol, %timeframe, written, "prefetch finished");
        written
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        let now = now_ms();
        if let Some(entry) = self.memory().get(key) {
            if !entry.is_expired(now) {
                return Ok(true);
            }
        }
        match self.backend.get(CACHE_NAMESPACE, key).await? {
            Some(bytes) => Ok(serde_json::from_slice::<EntryHeader>(&bytes)
                .is_ok_and(|header| !header.is_expired(now))),
            None => Ok(false),
        }
    }

    /// Removes expired entries from both tiers, returning how many keys were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable tier fails.
    pub async fn cleanup(&self) -> Result<usize> {
        let now = now_ms();
        let mut removed: BTreeSet<String> = self.memory().remove_expired(now).into_iter().collect();

        for key in self.backend.scan(CACHE_NAMESPACE, "").await? {
            if self.locked(&key, self.remove_if_expired(&key, now)).await? {
                removed.insert(key);
            }
        }

        info!(removed = removed.len(), "cache cleanup finished");
        Ok(removed.len())
    }

    async fn remove_if_expired(&self, key: &str, now: u64) -> Result<bool> {
        let Some(bytes) = self.backend.get(CACHE_NAMESPACE, key).await? else {
            return Ok(false);
        };
        let expired = match serde_json::from_slice::<EntryHeader>(&bytes) {
            Ok(header) => header.is_expired(now),
            Err(e) => {
                warn!(key, error = %e, "removing unreadable cache entry");
                true
            }
        };
        if expired {
            self.backend.delete(CACHE_NAMESPACE, key).await?;
        }
        Ok(expired)
    }

    /// Returns occupancy of both tiers and the hit, miss and eviction counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable tier fails.
    pub async fn get_stats(&self) -> Result<CacheStats> {
        let mut disk_size = 0;
        let mut disk_count = 0;
        for key in self.backend.scan(CACHE_NAMESPACE, "").await? {
            if let Some(bytes) = self.backend.get(CACHE_NAMESPACE, &key).await? {
                disk_count += 1;
                if let Ok(header) = serde_json::from_slice::<EntryHeader>(&bytes) {
                    disk_size += header.size_bytes;
                }
            }
        }

        let memory = self.memory();
        Ok(CacheStats {
            memory_size: memory.used_bytes(),
            memory_count: memory.len(),
            disk_size,
            disk_count,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}
