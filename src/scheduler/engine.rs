//! Scheduler execution engine

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::entry::{Schedule, ScheduleEntry};
use crate::error::{AutomationError, Result};
use crate::task::{Task, TaskStatus};

/// Outcome of firing one schedule entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FireOutcome {
    /// The task ran and succeeded
    Completed,
    /// The task ran and failed, retry budget exhausted
    Failed,
    /// The task was not runnable (cancelled); the entry is dropped
    Skipped,
}

/// Polling engine that fires tasks when their time arrives
///
/// Holds references to tasks, never ownership; the manager's registry
/// owns them. One `run` loop per instance.
pub struct Scheduler {
    check_interval_secs: u64,
    max_retries: u32,
    entries: RwLock<Vec<ScheduleEntry>>,
    cancel: std::sync::Mutex<CancellationToken>,
    running: AtomicBool,
    next_seq: AtomicU64,
}

impl Scheduler {
    /// Create a new scheduler.
    ///
    /// `check_interval_secs` is the poll period of [`run`](Self::run);
    /// `max_retries` bounds immediate retries of a failed scheduled fire.
    pub fn new(check_interval_secs: u64, max_retries: u32) -> Self {
        Self {
            check_interval_secs,
            max_retries,
            entries: RwLock::new(Vec::new()),
            cancel: std::sync::Mutex::new(CancellationToken::new()),
            running: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a schedule entry for a task. Validates the schedule and
    /// returns the entry id; never executes synchronously.
    pub async fn schedule(&self, task: Arc<Mutex<Task>>, schedule: Schedule) -> Result<Uuid> {
        let now = Utc::now();
        let (next_fire_at, every) = schedule.resolve(now)?;
        let task_name = task.lock().await.name.clone();

        let entry = ScheduleEntry {
            id: Uuid::new_v4(),
            task_name: task_name.clone(),
            task,
            next_fire_at,
            every,
            repeat: schedule.repeat,
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
        };
        let id = entry.id;

        self.entries.write().await.push(entry);
        info!("Scheduled task: {} (next fire at {})", task_name, next_fire_at);
        Ok(id)
    }

    /// Scan all entries and fire the due ones, in ascending fire time,
    /// ties broken by registration order. Execution is synchronous with
    /// respect to this call. Failures are recovered locally: a failing
    /// task never crashes the scheduler.
    pub async fn run_once(&self) {
        let now = Utc::now();

        let mut due: Vec<_> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .filter(|e| e.is_due(now))
                .map(|e| (e.next_fire_at, e.seq, e.id, e.task.clone(), e.task_name.clone()))
                .collect()
        };

        if due.is_empty() {
            debug!("No entries due");
            return;
        }

        due.sort_by_key(|(fire_at, seq, ..)| (*fire_at, *seq));
        debug!("Firing {} due entries", due.len());

        for (_, _, id, task, task_name) in due {
            let outcome = self.fire(&task_name, &task).await;
            self.rearm_or_remove(id, outcome).await;
        }
    }

    /// Execute one due task under its lock, retrying immediate failures
    /// up to the retry budget.
    async fn fire(&self, task_name: &str, task: &Arc<Mutex<Task>>) -> FireOutcome {
        let mut task = task.lock().await;

        if task.status == TaskStatus::Cancelled {
            debug!("Dropping entry for cancelled task: {}", task_name);
            return FireOutcome::Skipped;
        }

        let mut attempts_left = self.max_retries;
        loop {
            match task.execute().await {
                Ok(_) => return FireOutcome::Completed,
                Err(AutomationError::InvalidStateTransition(msg)) => {
                    warn!("Skipping scheduled task {}: {}", task_name, msg);
                    return FireOutcome::Skipped;
                }
                Err(e) => {
                    if attempts_left == 0 {
                        error!(
                            "Scheduled task {} failed, retry budget exhausted: {}",
                            task_name, e
                        );
                        return FireOutcome::Failed;
                    }
                    attempts_left -= 1;
                    warn!("Scheduled task {} failed, retrying: {}", task_name, e);
                }
            }
        }
    }

    /// Advance a repeating entry from its scheduled fire time, or remove
    /// the entry if it was one-shot or its task is no longer runnable.
    async fn rearm_or_remove(&self, id: Uuid, outcome: FireOutcome) {
        let mut entries = self.entries.write().await;
        let Some(pos) = entries.iter().position(|e| e.id == id) else {
            // Unscheduled while firing
            return;
        };

        if entries[pos].repeat && outcome != FireOutcome::Skipped {
            entries[pos].advance();
        } else {
            entries.remove(pos);
        }
    }

    /// Cooperative polling loop. Sleeps `check_interval` between
    /// [`run_once`](Self::run_once) calls and honors [`stop`](Self::stop)
    /// within one interval in the worst case. Starting a second loop on
    /// the same instance is an error.
    pub async fn run(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AutomationError::InvalidConfig(
                "scheduler loop is already running".to_string(),
            ));
        }

        // Re-arm after a previous stop so the loop can be restarted
        let token = {
            let mut cancel = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
            if cancel.is_cancelled() {
                *cancel = CancellationToken::new();
            }
            cancel.clone()
        };

        info!(
            "Scheduler started (check interval: {}s)",
            self.check_interval_secs
        );
        let check_interval = tokio::time::Duration::from_secs(self.check_interval_secs);

        // Stop is checked both before sleeping and after waking
        while !token.is_cancelled() {
            self.run_once().await;

            tokio::select! {
                _ = tokio::time::sleep(check_interval) => {}
                _ = token.cancelled() => break,
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Scheduler stopped");
        Ok(())
    }

    /// Signal the polling loop to stop. Cooperative: an in-flight
    /// execution is allowed to finish.
    ///
    /// Only affects a live loop. A stop issued while no loop is running
    /// is discarded: the next [`run`](Self::run) re-arms the signal and
    /// starts normally.
    pub fn stop(&self) {
        info!("Scheduler stop requested");
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }

    /// Whether the polling loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of active schedule entries.
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Names of scheduled tasks that have not run yet.
    pub async fn pending_entries(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut pending = Vec::new();
        for entry in entries.iter() {
            if entry.task.lock().await.status == TaskStatus::Pending {
                pending.push(entry.task_name.clone());
            }
        }
        pending
    }

    /// Drop all entries for a task. Returns the number removed.
    pub async fn unschedule_task(&self, task_name: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.task_name != task_name);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Unscheduled {} entries for task: {}", removed, task_name);
        }
        removed
    }

    /// Drop one-shot entries whose task already completed, e.g. through a
    /// manual execution that beat the scheduled fire.
    pub async fn clear_finished(&self) {
        let mut entries = self.entries.write().await;
        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries.drain(..) {
            let completed =
                !entry.repeat && entry.task.lock().await.status == TaskStatus::Completed;
            if !completed {
                kept.push(entry);
            }
        }
        *entries = kept;
    }
}
