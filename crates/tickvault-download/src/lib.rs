//! Download orchestration for the tickvault market-data pipeline.
//!
//! This crate reconciles what is stored against what is requested:
//!
//! - [`DownloadManager`] - FIFO task queue with a concurrency bound
//! - [`DownloadTask`] / [`TaskStatus`] - Per-task state machine and progress
//! - [`DownloadEvent`] - Notifications published to subscribers
//! - [`estimate_ticks`] - Tick-count estimation from stored partitions

#![doc(issue_tracker_base_url = "https://github.com/tickvault/tickvault/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod estimate;
mod event;
mod manager;
mod task;

pub use config::DownloadConfig;
pub use error::{DownloadError, Result};
pub use estimate::{EstimateConfidence, TickEstimate, estimate_ticks};
pub use event::DownloadEvent;
pub use manager::DownloadManager;
pub use task::{DownloadTask, ProgressCallback, TaskId, TaskStatus};
