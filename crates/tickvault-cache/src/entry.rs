//! Cache entries and structural size estimation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tickvault_aggregate::Candle;
use tickvault_types::TickRecord;

/// A value that can be cached in both tiers.
///
/// The size estimate drives memory-tier eviction and is computed from the
/// value's structure rather than by serializing it.
pub trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Estimated in-memory size in bytes.
    fn size_bytes(&self) -> u64;
}

impl Cacheable for TickRecord {
    fn size_bytes(&self) -> u64 {
        Self::size_bytes(self)
    }
}

impl Cacheable for Candle {
    fn size_bytes(&self) -> u64 {
        size_of::<Self>() as u64
    }
}

impl Cacheable for String {
    fn size_bytes(&self) -> u64 {
        (size_of::<Self>() + self.len()) as u64
    }
}

impl<T: Cacheable> Cacheable for Vec<T> {
    fn size_bytes(&self) -> u64 {
        size_of::<Self>() as u64 + self.iter().map(Cacheable::size_bytes).sum::<u64>()
    }
}

/// A cached value with its timing metadata, as stored in the durable tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// Entry key.
    pub key: String,
    /// Cached value.
    pub data: T,
    /// Unix milliseconds of the write.
    pub written_at: u64,
    /// Unix milliseconds after which the entry is expired.
    pub expires_at: u64,
    /// Estimated size of key and value.
    pub size_bytes: u64,
}

impl<T> CacheEntry<T> {
    /// Returns true if the entry is expired at `now_ms`.
    #[must_use]
    pub const fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }
}

/// The metadata of a durable entry, read without decoding its value.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EntryHeader {
    pub(crate) expires_at: u64,
    pub(crate) size_bytes: u64,
}

impl EntryHeader {
    pub(crate) const fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }
}
