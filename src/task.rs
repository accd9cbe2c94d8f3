//! Task state machine
//!
//! A [`Task`] is a named, stateful unit of deferred work. The work itself
//! is an async callable closed over its arguments at creation time; the
//! task records the outcome of the most recent execution attempt.
//!
//! States: `pending → running → {completed, failed}` with
//! `pending → cancelled` as the terminal alternate path. A `failed` task
//! may be re-executed (retry), and a `completed` task may be re-executed
//! by a recurring schedule; both reset `result`/`error` on entry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{AutomationError, Result};

/// Future type produced by a unit of work
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// A unit of work: an async callable with its arguments captured
pub type TaskWork = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Wrap an async closure into a [`TaskWork`].
pub fn work<F, Fut>(f: F) -> TaskWork
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// Task execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet executed
    Pending,
    /// An execution attempt is in flight
    Running,
    /// The most recent attempt succeeded
    Completed,
    /// The most recent attempt failed
    Failed,
    /// Cancelled before ever running; terminal
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A named, stateful unit of deferred work
pub struct Task {
    /// Unique name within a manager's registry
    pub name: String,
    /// Free-text description, no semantic effect
    pub description: String,
    work: TaskWork,
    /// Current status
    pub status: TaskStatus,
    /// Value produced by the last successful execution
    pub result: Option<Value>,
    /// Failure detail from the last failed execution
    pub error: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Start of the most recent execution attempt
    pub started_at: Option<DateTime<Utc>>,
    /// End of the most recent execution attempt
    pub finished_at: Option<DateTime<Utc>>,
    /// Total execution attempts, manual and scheduled
    pub attempts: u32,
}

impl Task {
    /// Create a new task in `pending` state.
    pub fn new(name: impl Into<String>, work: TaskWork) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            work,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            attempts: 0,
        }
    }

    /// Set the task description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Execute the unit of work and record the outcome.
    ///
    /// Rejected while `running` or after `cancelled`. Re-entrant from
    /// `failed` (retry) and `completed` (recurring re-fire); both reset
    /// `result`/`error` before the attempt. After any attempt exactly one
    /// of `result`/`error` is set and `started_at <= finished_at`.
    pub async fn execute(&mut self) -> Result<Value> {
        match self.status {
            TaskStatus::Running => {
                return Err(AutomationError::InvalidStateTransition(format!(
                    "task '{}' is already running",
                    self.name
                )))
            }
            TaskStatus::Cancelled => {
                return Err(AutomationError::InvalidStateTransition(format!(
                    "task '{}' was cancelled",
                    self.name
                )))
            }
            _ => {}
        }

        debug!("Executing task: {}", self.name);
        self.result = None;
        self.error = None;
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        self.attempts += 1;

        let outcome = (self.work)().await;
        self.finished_at = Some(Utc::now());

        match outcome {
            Ok(value) => {
                self.result = Some(value.clone());
                self.status = TaskStatus::Completed;
                info!("Task completed: {}", self.name);
                Ok(value)
            }
            Err(e) => {
                // Store and surface the work's own message, not a
                // Display-wrapped copy of it
                let message = match e {
                    AutomationError::Execution(msg) => msg,
                    other => other.to_string(),
                };
                self.error = Some(message.clone());
                self.status = TaskStatus::Failed;
                error!("Task failed: {} - {}", self.name, message);
                Err(AutomationError::Execution(message))
            }
        }
    }

    /// Cancel the task. Valid only while `pending`; anything else is an
    /// [`AutomationError::InvalidStateTransition`] and leaves status
    /// unchanged.
    pub fn cancel(&mut self) -> Result<()> {
        if self.status != TaskStatus::Pending {
            return Err(AutomationError::InvalidStateTransition(format!(
                "cannot cancel task '{}' in state '{}'",
                self.name, self.status
            )));
        }
        self.status = TaskStatus::Cancelled;
        info!("Task cancelled: {}", self.name);
        Ok(())
    }

    /// Duration of the most recent execution attempt, if one finished.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Read-only copy of the task's observable state.
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            name: self.name.clone(),
            description: self.description.clone(),
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            attempts: self.attempts,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

/// Serializable read-only view of a [`Task`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task name
    pub name: String,
    /// Task description
    pub description: String,
    /// Status at snapshot time
    pub status: TaskStatus,
    /// Result of the last successful execution
    pub result: Option<Value>,
    /// Error of the last failed execution
    pub error: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Start of the most recent attempt
    pub started_at: Option<DateTime<Utc>>,
    /// End of the most recent attempt
    pub finished_at: Option<DateTime<Utc>>,
    /// Total execution attempts
    pub attempts: u32,
}

impl TaskSnapshot {
    /// Duration of the most recent execution attempt, if one finished.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adder(x: i64, y: i64) -> TaskWork {
        work(move || async move { Ok(json!(x + y)) })
    }

    fn failing(message: &'static str) -> TaskWork {
        work(move || async move { Err(AutomationError::Execution(message.to_string())) })
    }

    #[test]
    fn test_task_creation() {
        let task = Task::new("test_task", adder(5, 3)).with_description("Test task");

        assert_eq!(task.name, "test_task");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.description, "Test task");
        assert!(task.result.is_none());
        assert!(task.error.is_none());
        assert_eq!(task.attempts, 0);
    }

    #[tokio::test]
    async fn test_task_execution() {
        let mut task = Task::new("test_task", adder(5, 3));

        let result = task.execute().await.unwrap();

        assert_eq!(result, json!(8));
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result, Some(json!(8)));
        assert!(task.error.is_none());
        assert_eq!(task.attempts, 1);
        assert!(task.started_at.is_some());
        assert!(task.finished_at.is_some());
        assert!(task.started_at.unwrap() <= task.finished_at.unwrap());
        assert!(task.duration().is_some());
    }

    #[tokio::test]
    async fn test_task_failure() {
        let mut task = Task::new("failing_task", failing("Test error"));

        let result = task.execute().await;

        assert!(matches!(result, Err(AutomationError::Execution(_))));
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.result.is_none());
        assert!(task.error.as_deref().unwrap().contains("Test error"));
        assert!(task.started_at.unwrap() <= task.finished_at.unwrap());
    }

    #[tokio::test]
    async fn test_failure_message_is_not_rewrapped() {
        let mut task = Task::new("failing_task", failing("nope"));

        let err = task.execute().await.unwrap_err();

        // The recorded and propagated message is the work's own, with no
        // error-type prefix baked in
        assert_eq!(task.error.as_deref(), Some("nope"));
        match err {
            AutomationError::Execution(msg) => assert_eq!(msg, "nope"),
            other => panic!("expected Execution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retry_after_failure_resets_error() {
        let mut task = Task::new("flaky", failing("first"));
        task.execute().await.unwrap_err();
        assert_eq!(task.status, TaskStatus::Failed);

        // Swap in a succeeding body to model an externally-fixed retry
        task.work = adder(1, 1);
        let result = task.execute().await.unwrap();

        assert_eq!(result, json!(2));
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.error.is_none());
        assert_eq!(task.attempts, 2);
    }

    #[tokio::test]
    async fn test_reexecution_after_completion() {
        let mut task = Task::new("recurring", adder(2, 2));
        task.execute().await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);

        // A recurring schedule re-fires completed tasks
        let result = task.execute().await.unwrap();
        assert_eq!(result, json!(4));
        assert_eq!(task.attempts, 2);
    }

    #[test]
    fn test_task_cancel() {
        let mut task = Task::new("test_task", adder(1, 2));

        task.cancel().unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_non_pending_fails() {
        let mut task = Task::new("test_task", adder(1, 2));
        task.execute().await.unwrap();

        let result = task.cancel();
        assert!(matches!(
            result,
            Err(AutomationError::InvalidStateTransition(_))
        ));
        // Status unchanged
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_execute_after_cancel_fails() {
        let mut task = Task::new("test_task", adder(1, 2));
        task.cancel().unwrap();

        let result = task.execute().await;
        assert!(matches!(
            result,
            Err(AutomationError::InvalidStateTransition(_))
        ));
        assert_eq!(task.status, TaskStatus::Cancelled);
    }

    #[test]
    fn test_duration_unset_before_execution() {
        let task = Task::new("test_task", adder(1, 2));
        assert!(task.duration().is_none());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TaskStatus::Pending.to_string(), "pending");
        assert_eq!(TaskStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TaskStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
        let status: TaskStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_snapshot() {
        let mut task = Task::new("snap", adder(3, 4)).with_description("snapshot me");
        task.execute().await.unwrap();

        let snapshot = task.snapshot();
        assert_eq!(snapshot.name, "snap");
        assert_eq!(snapshot.status, TaskStatus::Completed);
        assert_eq!(snapshot.result, Some(json!(7)));
        assert!(snapshot.duration().is_some());
    }
}
