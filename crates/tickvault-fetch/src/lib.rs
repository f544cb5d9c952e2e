//! Tick source collaborators for the tickvault market-data pipeline.
//!
//! This crate provides the sources the pipeline downloads from:
//!
//! - [`TickSource`] - Symbol listing, chunked day streaming and range fetch
//! - [`HttpTickSource`] - History API client with retries and backoff
//! - [`MemoryTickSource`] - In-process source for offline use and tests
//! - [`TickChunk`] - One streamed batch of a day's ticks

#![doc(issue_tracker_base_url = "https://github.com/tickvault/tickvault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod memory;
mod source;
mod wire;

pub use client::{ClientConfig, HttpTickSource};
pub use error::FetchError;
pub use memory::MemoryTickSource;
pub use source::{ChunkStream, TickChunk, TickSource};
pub use tokio_util::sync::CancellationToken;
