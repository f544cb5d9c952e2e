//! Error types for download orchestration.

use thiserror::Error;
use tickvault_fetch::FetchError;
use tickvault_store::StoreError;

use crate::{TaskId, TaskStatus};

/// Errors that can occur in download operations.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// No task with the given id exists.
    #[error("Download task not found: {0}")]
    TaskNotFound(TaskId),

    /// The requested action is not valid in the task's current state.
    #[error("Cannot {action} task {id} while it is {status}")]
    InvalidTransition {
        /// Task id.
        id: TaskId,
        /// Current status of the task.
        status: TaskStatus,
        /// The rejected action.
        action: &'static str,
    },

    /// The tick source failed.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The tick store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for download operations.
pub type Result<T> = std::result::Result<T, DownloadError>;
