//! Durable key-value backend abstraction.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::{Result, StoreError};

/// A namespaced put/get/delete/scan store.
///
/// Both the tick store and the durable cache tier sit on top of this trait;
/// any embedded key-value or file-based store can implement it. Values are
/// opaque bytes and keys are arbitrary UTF-8 strings.
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Writes `value` under `key`, replacing any previous value.
    async fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<()>;

    /// Reads the value under `key`, or `None` if absent.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Deletes `key`, returning whether it existed.
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool>;

    /// Returns all keys in `namespace` starting with `prefix`, sorted ascending.
    async fn scan(&self, namespace: &str, prefix: &str) -> Result<Vec<String>>;

    /// Deletes every key in `namespace`, returning how many were removed.
    async fn clear(&self, namespace: &str) -> Result<usize>;
}

/// In-process backend keeping everything in a sorted map.
///
/// Used for tests and for sessions that do not need persistence. An optional
/// byte quota makes it possible to exercise quota failures.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    quota_bytes: Option<u64>,
    offline: AtomicBool,
}

impl MemoryBackend {
    /// Creates an empty, unbounded backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty backend that rejects writes beyond `quota_bytes`.
    #[must_use]
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Simulates the backend going away; every call fails while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Total bytes currently stored across all namespaces.
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().map(|v| v.len() as u64).sum()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory backend is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put(&self, namespace: &str, key: &str, value: Vec<u8>) -> Result<()> {
        self.check_online()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let map_key = (namespace.to_string(), key.to_string());

        if let Some(quota) = self.quota_bytes {
            let replaced = entries.get(&map_key).map_or(0, |v| v.len() as u64);
            let used: u64 = entries.values().map(|v| v.len() as u64).sum::<u64>() - replaced;
            let requested = value.len() as u64;
            if used + requested > quota {
                return Err(StoreError::QuotaExceeded {
                    used,
                    requested,
                    quota,
                });
            }
        }

        entries.insert(map_key, value);
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_online()?;
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        self.check_online()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .remove(&(namespace.to_string(), key.to_string()))
            .is_some())
    }

    async fn scan(&self, namespace: &str, prefix: &str) -> Result<Vec<String>> {
        self.check_online()?;
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .keys()
            .filter(|(ns, key)| ns == namespace && key.starts_with(prefix))
            .map(|(_, key)| key.clone())
            .collect())
    }

    async fn clear(&self, namespace: &str) -> Result<usize> {
        self.check_online()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(ns, _), _| ns != namespace);
        Ok(before - entries.len())
    }
}
