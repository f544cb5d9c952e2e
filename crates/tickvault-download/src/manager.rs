//! Queue-driven download manager.

use chrono::NaiveDate;
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tickvault_fetch::{CancellationToken, FetchError, TickSource};
use tickvault_store::TickStore;
use tickvault_types::{DateRange, TickRecord, now_ms};
use tokio::sync::{Notify, broadcast};
use tracing::{debug, error, info, warn};

use crate::{
    DownloadConfig, DownloadError, DownloadEvent, DownloadTask, ProgressCallback, Result, TaskId,
    TaskStatus, TickEstimate, estimate_ticks,
};

/// Downloads symbol/day ranges from a [`TickSource`] into a [`TickStore`].
///
/// Tasks wait in a FIFO queue. At most
/// [`max_concurrent_downloads`](DownloadConfig::max_concurrent_downloads)
/// tasks hold a download slot at once, and a task never starts while another
/// task of the same symbol with an overlapping range is downloading. Every
/// slot release immediately starts the next eligible task.
///
/// Each task walks its range day by day. Days already stored are skipped;
/// the others are streamed in chunks, and every chunk is written before the
/// next one is requested.
///
/// Running tasks are spawned on the current Tokio runtime, so the manager
/// must be used from within one.
#[derive(Debug, Clone)]
pub struct DownloadManager {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    store: Arc<TickStore>,
    source: Arc<dyn TickSource>,
    config: DownloadConfig,
    state: Mutex<TaskTable>,
    events: broadcast::Sender<DownloadEvent>,
    changed: Notify,
    next_seq: AtomicU64,
}

#[derive(Debug, Default)]
struct TaskTable {
    tasks: HashMap<TaskId, TaskEntry>,
    queue: VecDeque<TaskId>,
}

struct TaskEntry {
    task: DownloadTask,
    seq: u64,
    /// Incremented on every start so a stale runner can recognise itself.
    run: u64,
    cancel: Option<CancellationToken>,
    on_progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEntry")
            .field("task", &self.task)
            .field("seq", &self.seq)
            .field("run", &self.run)
            .field("has_callback", &self.on_progress.is_some())
            .finish_non_exhaustive()
    }
}

impl TaskTable {
    fn downloading(&self) -> impl Iterator<Item = &DownloadTask> {
        self.tasks
            .values()
            .map(|entry| &entry.task)
            .filter(|task| task.status == TaskStatus::Downloading)
    }
}

/// A task taken out of the queue, ready to be spawned.
#[derive(Debug)]
struct Run {
    id: TaskId,
    run: u64,
    symbol: String,
    range: DateRange,
    /// Index of the first day not yet processed by earlier runs.
    resume_from: usize,
    cancel: CancellationToken,
}

/// How a runner stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Finished,
    Interrupted,
}

impl DownloadManager {
    /// Creates a manager writing into `store` from `source`.
    #[must_use]
    pub fn new(store: Arc<TickStore>, source: Arc<dyn TickSource>, config: DownloadConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                store,
                source,
                config,
                state: Mutex::new(TaskTable::default()),
                events,
                changed: Notify::new(),
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the manager configuration.
    #[must_use]
    pub fn config(&self) -> &DownloadConfig {
        &self.inner.config
    }

    /// Returns the store downloads are written to.
    #[must_use]
    pub fn store(&self) -> &Arc<TickStore> {
        &self.inner.store
    }

    /// Returns the tick source downloads are read from.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn TickSource> {
        &self.inner.source
    }

    /// Subscribes to task events. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.inner.events.subscribe()
    }

    /// Requests a download of `symbol` over `range`.
    ///
    /// If a pending or downloading task for the same symbol and range exists,
    /// its id is returned and no task is created. `on_progress` is attached
    /// to the reused task only if it has no callback yet.
    pub fn download_data(&self, symbol: &str, range: DateRange, on_progress: Option<ProgressCallback>) -> TaskId {
        let id = {
            let mut state = self.inner.lock();
            let existing = state.tasks.iter_mut().find(|(_, entry)| {
                entry.task.status.is_in_flight() && entry.task.is_equivalent(symbol, range)
            });
            if let Some((id, entry)) = existing {
                if entry.on_progress.is_none() {
                    entry.on_progress = on_progress;
                }
                debug!(task = %id, "reusing in-flight download task");
                return id.clone();
            }

            let created_at_ms = now_ms();
            let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
            let id = TaskId::new(symbol, range, created_at_ms, seq);
            let estimate = self.estimate(symbol, range);
            let task = DownloadTask::new(id.clone(), symbol, range, estimate.estimated_ticks, created_at_ms);

            state.tasks.insert(
                id.clone(),
                TaskEntry {
                    task,
                    seq,
                    run: 0,
                    cancel: None,
                    on_progress,
                },
            );
            state.queue.push_back(id.clone());
            id
        };

        info!(task = %id, symbol, %range, "download queued");
        self.inner.publish(DownloadEvent::Queued(id.clone()));
        Inner::pump(&self.inner);
        id
    }

    /// Requests a download of a single day.
    pub fn download_date(&self, symbol: &str, date: NaiveDate, on_progress: Option<ProgressCallback>) -> TaskId {
        self.download_data(symbol, DateRange::single_day(date), on_progress)
    }

    /// Pauses a downloading task, cancelling its fetch and freeing its slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist or is not downloading.
    pub fn pause_download(&self, id: &TaskId) -> Result<()> {
        {
            let mut state = self.inner.lock();
            let entry = state
                .tasks
                .get_mut(id)
                .ok_or_else(|| DownloadError::TaskNotFound(id.clone()))?;
            if entry.task.status != TaskStatus::Downloading {
                return Err(DownloadError::InvalidTransition {
                    id: id.clone(),
                    status: entry.task.status,
                    action: "pause",
                });
            }
            entry.task.status = TaskStatus::Paused;
            if let Some(cancel) = entry.cancel.take() {
                cancel.cancel();
            }
        }

        info!(task = %id, "download paused");
        self.inner.publish(DownloadEvent::Paused(id.clone()));
        Inner::pump(&self.inner);
        Ok(())
    }

    /// Queues a paused task again.
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist or is not paused.
    pub fn resume_download(&self, id: &TaskId) -> Result<()> {
        {
            let mut state = self.inner.lock();
            let entry = state
                .tasks
                .get_mut(id)
                .ok_or_else(|| DownloadError::TaskNotFound(id.clone()))?;
            if entry.task.status != TaskStatus::Paused {
                return Err(DownloadError::InvalidTransition {
                    id: id.clone(),
                    status: entry.task.status,
                    action: "resume",
                });
            }
            entry.task.status = TaskStatus::Pending;
            entry.task.restart_day();
            state.queue.push_back(id.clone());
        }

        info!(task = %id, "download resumed");
        self.inner.publish(DownloadEvent::Resumed(id.clone()));
        Inner::pump(&self.inner);
        Ok(())
    }

    /// Cancels a task and removes it from the table along with its callback.
    ///
    /// Ticks already written stay stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the task does not exist or already finished.
    pub fn cancel_download(&self, id: &TaskId) -> Result<()> {
        {
            let mut state = self.inner.lock();
            let status = state
                .tasks
                .get(id)
                .map(|entry| entry.task.status)
                .ok_or_else(|| DownloadError::TaskNotFound(id.clone()))?;
            if status.is_finished() {
                return Err(DownloadError::InvalidTransition {
                    id: id.clone(),
                    status,
                    action: "cancel",
                });
            }
            if let Some(cancel) = state.tasks.remove(id).and_then(|entry| entry.cancel) {
                cancel.cancel();
            }
            state.queue.retain(|queued| queued != id);
        }

        info!(task = %id, "download cancelled");
        self.inner.publish(DownloadEvent::Cancelled(id.clone()));
        Inner::pump(&self.inner);
        Ok(())
    }

    /// Returns a snapshot of every task, oldest first.
    #[must_use]
    pub fn get_download_tasks(&self) -> Vec<DownloadTask> {
        let state = self.inner.lock();
        let ordered: BTreeMap<u64, &DownloadTask> = state
            .tasks
            .values()
            .map(|entry| (entry.seq, &entry.task))
            .collect();
        ordered.into_values().cloned().collect()
    }

    /// Returns a snapshot of one task.
    #[must_use]
    pub fn get_download_task(&self, id: &TaskId) -> Option<DownloadTask> {
        self.inner.lock().tasks.get(id).map(|entry| entry.task.clone())
    }

    /// Removes completed and failed tasks, returning how many were removed.
    pub fn clear_finished(&self) -> usize {
        let mut state = self.inner.lock();
        let before = state.tasks.len();
        state.tasks.retain(|_, entry| !entry.task.status.is_finished());
        let removed = before - state.tasks.len();
        debug!(removed, "cleared finished download tasks");
        removed
    }

    /// Estimates the ticks in `range` from the symbol's stored days.
    #[must_use]
    pub fn estimate(&self, symbol: &str, range: DateRange) -> TickEstimate {
        estimate_ticks(
            &self.inner.store,
            symbol,
            range,
            self.inner.config.default_ticks_per_day,
        )
    }

    /// Waits until a task is completed, failed or paused.
    ///
    /// Returns the task snapshot, or `None` if the task does not exist or is
    /// cancelled while waiting.
    pub async fn wait_for_task(&self, id: &TaskId) -> Option<DownloadTask> {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let task = self.get_download_task(id)?;
            if !task.status.is_in_flight() {
                return Some(task);
            }
            notified.await;
        }
    }

    /// Returns ticks for `symbol` over `range`.
    ///
    /// Served from the store when every day of the range is stored. Otherwise
    /// the range is fetched from the source in one call and written to the
    /// store on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails.
    pub async fn get_ticks(&self, symbol: &str, range: DateRange) -> Result<Vec<TickRecord>> {
        let store = &self.inner.store;
        if range.days().all(|date| store.has_data(symbol, date) || store.is_complete(symbol, date)) {
            return Ok(store.get_ticks(symbol, range, None).await);
        }

        debug!(symbol, %range, "ticks not stored; fetching range");
        let ticks = self.inner.source.fetch_ticks_in_range(symbol, range).await?;

        let mut by_day: BTreeMap<NaiveDate, Vec<TickRecord>> = BTreeMap::new();
        for tick in &ticks {
            by_day
                .entry(tick.partition_date())
                .or_default()
                .push(tick.clone());
        }
        for (date, day) in by_day {
            if let Err(e) = store.store_ticks(symbol, date, &day).await {
                warn!(symbol, %date, error = %e, "failed to store fetched ticks");
            }
        }
        Ok(ticks)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, TaskTable> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: DownloadEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
        self.changed.notify_waiters();
    }

    /// Starts queued tasks while slots are free.
    fn pump(inner: &Arc<Self>) {
        let runs = inner.take_runnable();
        for run in runs {
            info!(task = %run.id, symbol = %run.symbol, range = %run.range, "download started");
            inner.publish(DownloadEvent::Started(run.id.clone()));
            let inner = Arc::clone(inner);
            tokio::spawn(async move {
                inner.execute(run).await;
            });
        }
    }

    fn take_runnable(&self) -> Vec<Run> {
        let mut state = self.lock();
        let mut active: Vec<DownloadTask> = state.downloading().cloned().collect();
        let mut runs = Vec::new();

        let mut index = 0;
        while active.len() < self.config.max_concurrent_downloads && index < state.queue.len() {
            let id = state.queue[index].clone();
            let Some(entry) = state.tasks.get(&id) else {
                state.queue.remove(index);
                continue;
            };
            if entry.task.status != TaskStatus::Pending {
                state.queue.remove(index);
                continue;
            }
            if active.iter().any(|running| running.overlaps(&entry.task)) {
                index += 1;
                continue;
            }

            state.queue.remove(index);
            let Some(entry) = state.tasks.get_mut(&id) else {
                continue;
            };
            let cancel = CancellationToken::new();
            entry.run += 1;
            entry.cancel = Some(cancel.clone());
            entry.task.mark_started(now_ms());
            active.push(entry.task.clone());
            runs.push(Run {
                id,
                run: entry.run,
                symbol: entry.task.symbol.clone(),
                range: entry.task.range,
                resume_from: entry.task.days_completed,
                cancel,
            });
        }
        runs
    }

    async fn execute(self: Arc<Self>, run: Run) {
        let result = self.download_range(&run).await;
        self.finish(&run, result);
        Self::pump(&self);
    }

    /// Applies `update` to the task if `run` still owns it.
    ///
    /// Returns false if the task was paused, cancelled or restarted.
    fn update(&self, run: &Run, update: impl FnOnce(&mut DownloadTask)) -> bool {
        let (snapshot, callback) = {
            let mut state = self.lock();
            let Some(entry) = state.tasks.get_mut(&run.id) else {
                return false;
            };
            if entry.run != run.run || entry.task.status != TaskStatus::Downloading {
                return false;
            }
            update(&mut entry.task);
            (entry.task.clone(), entry.on_progress.clone())
        };

        if let Some(callback) = callback {
            callback(&snapshot);
        }
        self.publish(DownloadEvent::Progress(snapshot));
        true
    }

    fn should_skip(&self, symbol: &str, date: NaiveDate) -> bool {
        if self.store.is_complete(symbol, date) {
            return true;
        }
        self.config.skip_partial_days && self.store.has_data(symbol, date)
    }

    async fn download_range(&self, run: &Run) -> Result<Outcome> {
        let symbol = run.symbol.as_str();

        for (index, date) in run.range.days().enumerate().skip(run.resume_from) {
            if run.cancel.is_cancelled() {
                return Ok(Outcome::Interrupted);
            }

            // A resumed run refetches the day it was interrupted in, even
            // though that day already holds some ticks.
            let interrupted_day = run.run > 1 && index == run.resume_from;
            if !interrupted_day && self.should_skip(symbol, date) {
                debug!(task = %run.id, %date, "day already stored; skipping");
                let owned = self.update(run, |task| {
                    task.days_skipped += 1;
                    task.complete_day();
                });
                if !owned {
                    return Ok(Outcome::Interrupted);
                }
                continue;
            }

            if self.download_day(run, date).await? == Outcome::Interrupted {
                return Ok(Outcome::Interrupted);
            }
        }
        Ok(Outcome::Finished)
    }

    async fn download_day(&self, run: &Run, date: NaiveDate) -> Result<Outcome> {
        let symbol = run.symbol.as_str();
        let mut stream = self.source.stream_fetch_ticks(symbol, date, run.cancel.clone());
        let mut stored = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(FetchError::Cancelled) => return Ok(Outcome::Interrupted),
                Err(e) => return Err(e.into()),
            };
            if run.cancel.is_cancelled() {
                return Ok(Outcome::Interrupted);
            }

            if !chunk.is_empty() {
                self.store.store_ticks(symbol, date, &chunk.ticks).await?;
                stored += chunk.len();
            }

            let fraction = chunk.day_progress().unwrap_or(0.0);
            let owned = self.update(run, |task| {
                task.record_ticks(chunk.len() as u64);
                task.set_progress(fraction);
            });
            if !owned {
                return Ok(Outcome::Interrupted);
            }
        }

        if run.cancel.is_cancelled() {
            return Ok(Outcome::Interrupted);
        }
        self.store.mark_complete(symbol, date).await?;
        debug!(task = %run.id, %date, ticks = stored, "day downloaded");

        let owned = self.update(run, DownloadTask::complete_day);
        Ok(if owned {
            Outcome::Finished
        } else {
            Outcome::Interrupted
        })
    }

    fn finish(&self, run: &Run, result: Result<Outcome>) {
        let event = {
            let mut state = self.lock();
            let Some(entry) = state.tasks.get_mut(&run.id) else {
                return;
            };
            if entry.run != run.run || entry.task.status != TaskStatus::Downloading {
                return;
            }
            entry.cancel = None;
            match result {
                Ok(Outcome::Finished) => {
                    entry.task.mark_completed(now_ms());
                    info!(
                        task = %run.id,
                        ticks = entry.task.downloaded_ticks,
                        skipped = entry.task.days_skipped,
                        "download completed"
                    );
                    DownloadEvent::Completed(entry.task.clone())
                }
                Ok(Outcome::Interrupted) => {
                    // The source stopped without being asked to.
                    entry.task.mark_failed("download interrupted".to_string(), now_ms());
                    warn!(task = %run.id, "download interrupted");
                    DownloadEvent::Failed {
                        id: run.id.clone(),
                        error: "download interrupted".to_string(),
                    }
                }
                Err(e) => {
                    let message = match entry.task.current_day() {
                        Some(day) => format!("{day}: {e}"),
                        None => e.to_string(),
                    };
                    error!(task = %run.id, error = %message, "download failed");
                    entry.task.mark_failed(message.clone(), now_ms());
                    DownloadEvent::Failed {
                        id: run.id.clone(),
                        error: message,
                    }
                }
            }
        };
        self.publish(event);
    }
}
