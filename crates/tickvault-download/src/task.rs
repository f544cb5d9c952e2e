//! Download task definitions and types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tickvault_types::DateRange;

/// Unique identifier for a download task.
///
/// Formatted as `{symbol}:{start}:{end}:{created_ms}-{seq}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub(crate) fn new(symbol: &str, range: DateRange, created_ms: u64, seq: u64) -> Self {
        Self(format!(
            "{symbol}:{}:{}:{created_ms}-{seq}",
            range.start, range.end
        ))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Status of a download task.
///
/// `Pending -> Downloading -> {Completed | Failed | Paused}` and
/// `Paused -> Pending`. Cancelled tasks are removed rather than kept in a
/// cancelled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Queued, waiting for a download slot.
    #[default]
    Pending,
    /// Holding a download slot.
    Downloading,
    /// Stopped by the user; resumable.
    Paused,
    /// All days are stored.
    Completed,
    /// A day failed to download.
    Failed,
}

impl TaskStatus {
    /// Returns true if the task reached a terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the task is queued or running.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::Pending | Self::Downloading)
    }

    /// Returns the status as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Callback invoked with a snapshot of the task after every progress update.
pub type ProgressCallback = Arc<dyn Fn(&DownloadTask) + Send + Sync>;

/// A download of one symbol over a range of days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// Symbol to download.
    pub symbol: String,
    /// Days to download.
    pub range: DateRange,
    /// Current status.
    pub status: TaskStatus,
    /// Percentage of the range processed, in `[0, 100]`.
    pub progress: f64,
    /// Ticks stored by this task.
    pub downloaded_ticks: u64,
    /// Estimated ticks in the whole range.
    pub total_estimate: u64,
    /// Days processed, including skipped ones.
    pub days_completed: usize,
    /// Days in the range.
    pub days_total: usize,
    /// Days skipped because they were already stored.
    pub days_skipped: usize,
    /// Error message if the task failed.
    pub error: Option<String>,
    /// Unix milliseconds when the task was created.
    pub created_at_ms: u64,
    /// Unix milliseconds when the task last started downloading.
    pub started_at_ms: Option<u64>,
    /// Unix milliseconds when the task completed or failed.
    pub finished_at_ms: Option<u64>,
    /// Part of `downloaded_ticks` stored for the day in progress.
    #[serde(skip)]
    pub(crate) day_ticks: u64,
}

impl DownloadTask {
    pub(crate) fn new(id: TaskId, symbol: &str, range: DateRange, total_estimate: u64, created_at_ms: u64) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            range,
            status: TaskStatus::Pending,
            progress: 0.0,
            downloaded_ticks: 0,
            total_estimate,
            days_completed: 0,
            days_total: range.total_days(),
            days_skipped: 0,
            error: None,
            created_at_ms,
            started_at_ms: None,
            finished_at_ms: None,
            day_ticks: 0,
        }
    }

    /// Returns true if this task downloads exactly `symbol` over `range`.
    #[must_use]
    pub fn is_equivalent(&self, symbol: &str, range: DateRange) -> bool {
        self.symbol == symbol && self.range == range
    }

    /// Returns true if both tasks touch a common `(symbol, day)` partition.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.symbol == other.symbol && self.range.overlaps(&other.range)
    }

    /// Recomputes `progress` from the days processed and the current day's
    /// fraction.
    pub(crate) fn set_progress(&mut self, day_fraction: f64) {
        if self.days_total == 0 {
            self.progress = 100.0;
            return;
        }
        let done = self.days_completed as f64 + day_fraction.clamp(0.0, 1.0);
        self.progress = (done / self.days_total as f64 * 100.0).clamp(0.0, 100.0);
    }

    pub(crate) fn record_ticks(&mut self, count: u64) {
        self.downloaded_ticks += count;
        self.day_ticks += count;
    }

    pub(crate) fn complete_day(&mut self) {
        self.days_completed += 1;
        self.day_ticks = 0;
        self.set_progress(0.0);
    }

    /// Forgets the ticks counted for the day in progress, which is fetched
    /// again from its start.
    pub(crate) fn restart_day(&mut self) {
        self.downloaded_ticks = self.downloaded_ticks.saturating_sub(self.day_ticks);
        self.day_ticks = 0;
    }

    pub(crate) fn mark_started(&mut self, now_ms: u64) {
        self.status = TaskStatus::Downloading;
        self.started_at_ms = Some(now_ms);
        self.error = None;
    }

    pub(crate) fn mark_completed(&mut self, now_ms: u64) {
        self.status = TaskStatus::Completed;
        self.progress = 100.0;
        self.days_completed = self.days_total;
        self.finished_at_ms = Some(now_ms);
    }

    pub(crate) fn mark_failed(&mut self, error: String, now_ms: u64) {
        self.status = TaskStatus::Failed;
        self.error = Some(error);
        self.finished_at_ms = Some(now_ms);
    }

    /// Returns the day currently being processed, if any.
    #[must_use]
    pub fn current_day(&self) -> Option<NaiveDate> {
        if self.status != TaskStatus::Downloading {
            return None;
        }
        self.range.days().nth(self.days_completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
    }

    fn task(symbol: &str, start: u32, end: u32) -> DownloadTask {
        let range = DateRange::new(date(start), date(end)).unwrap();
        DownloadTask::new(TaskId::new(symbol, range, 1000, 0), symbol, range, 0, 1000)
    }

    #[test]
    fn test_task_id_format() {
        let range = DateRange::new(date(20), date(21)).unwrap();
        let id = TaskId::new("EURUSD", range, 1_768_867_200_000, 3);
        assert_eq!(id.as_str(), "EURUSD:2026-01-20:2026-01-21:1768867200000-3");
    }

    #[test]
    fn test_status_predicates() {
        assert!(TaskStatus::Pending.is_in_flight());
        assert!(TaskStatus::Downloading.is_in_flight());
        assert!(!TaskStatus::Paused.is_in_flight());
        assert!(!TaskStatus::Paused.is_finished());
        assert!(TaskStatus::Completed.is_finished());
        assert!(TaskStatus::Failed.is_finished());
        assert_eq!(TaskStatus::Downloading.to_string(), "downloading");
    }

    #[test]
    fn test_overlap() {
        let a = task("EURUSD", 1, 10);
        assert!(a.overlaps(&task("EURUSD", 10, 12)));
        assert!(!a.overlaps(&task("EURUSD", 11, 12)));
        assert!(!a.overlaps(&task("GBPUSD", 1, 10)));
    }

    #[test]
    fn test_progress() {
        let mut t = task("EURUSD", 1, 4);
        assert_eq!(t.days_total, 4);

        t.days_completed = 1;
        t.set_progress(0.5);
        assert!((t.progress - 37.5).abs() < 1e-9);

        t.mark_completed(2000);
        assert!((t.progress - 100.0).abs() < 1e-9);
        assert_eq!(t.days_completed, 4);
    }

    #[test]
    fn test_restarted_day_is_not_counted_twice() {
        let mut t = task("EURUSD", 1, 2);
        t.record_ticks(40);
        t.complete_day();
        t.record_ticks(25);
        assert_eq!(t.downloaded_ticks, 65);

        t.restart_day();
        assert_eq!(t.downloaded_ticks, 40);
        t.record_ticks(60);
        t.complete_day();
        assert_eq!(t.downloaded_ticks, 100);
        assert_eq!(t.days_completed, 2);

        t.restart_day();
        assert_eq!(t.downloaded_ticks, 100);
    }

    #[test]
    fn test_lifecycle() {
        let mut t = task("EURUSD", 1, 2);
        assert_eq!(t.status, TaskStatus::Pending);
        assert!(t.current_day().is_none());

        t.mark_started(1500);
        assert_eq!(t.status, TaskStatus::Downloading);
        assert_eq!(t.current_day(), Some(date(1)));

        t.mark_failed("boom".to_string(), 1600);
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.error.as_deref(), Some("boom"));
        assert_eq!(t.finished_at_ms, Some(1600));
    }
}
