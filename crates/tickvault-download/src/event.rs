//! Download lifecycle notifications.

use crate::{DownloadTask, TaskId};

/// A change in the task table, published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// A task was created and queued.
    Queued(TaskId),
    /// A task took a download slot.
    Started(TaskId),
    /// A task stored ticks or finished a day.
    Progress(DownloadTask),
    /// A task was paused.
    Paused(TaskId),
    /// A paused task was queued again.
    Resumed(TaskId),
    /// A task finished every day of its range.
    Completed(DownloadTask),
    /// A task stopped on an error.
    Failed {
        /// Task id.
        id: TaskId,
        /// Error message.
        error: String,
    },
    /// A task was cancelled and removed.
    Cancelled(TaskId),
}

impl DownloadEvent {
    /// Returns the id of the task the event is about.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        match self {
            Self::Queued(id)
            | Self::Started(id)
            | Self::Paused(id)
            | Self::Resumed(id)
            | Self::Cancelled(id)
            | Self::Failed { id, .. } => id,
            Self::Progress(task) | Self::Completed(task) => &task.id,
        }
    }
}
