//! Partitioned durable tick store for the tickvault market-data pipeline.
//!
//! This crate provides the persistence layer of the pipeline:
//!
//! - [`StorageBackend`] - Namespaced put/get/delete/scan interface
//! - [`FileBackend`] - One JSON file per key, written atomically
//! - [`MemoryBackend`] - In-process backend with an optional quota
//! - [`TickStore`] - Tick partitions keyed by `(symbol, UTC day)`
//! - [`PartitionMeta`] / [`StorageStats`] - Derived metadata and statistics

#![doc(issue_tracker_base_url = "https://github.com/tickvault/tickvault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod backend;
mod error;
mod file;
mod meta;
mod store;

pub use backend::{MemoryBackend, StorageBackend};
pub use error::{Result, StoreError};
pub use file::FileBackend;
pub use meta::{PartitionMeta, StorageStats, SymbolStorage};
pub use store::{META_NAMESPACE, TICKS_NAMESPACE, TickStore, partition_key, segment_key};
