//! Two-tier cache for computed market data.
//!
//! [`TieredCache`] keeps recently written values in a byte-bounded memory
//! tier and every value in a durable
//! [`StorageBackend`](tickvault_store::StorageBackend) namespace. Entries
//! carry a TTL and are dropped lazily on read or in bulk by
//! [`TieredCache::cleanup`].

#![doc(issue_tracker_base_url = "https://github.com/tickvault/tickvault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cache;
mod entry;
mod error;
mod memory;
mod pattern;

pub use cache::{CACHE_NAMESPACE, CacheConfig, CacheLoader, CacheStats, TieredCache, candle_key};
pub use entry::{CacheEntry, Cacheable};
pub use error::{CacheError, Result};
pub use pattern::KeyPattern;
