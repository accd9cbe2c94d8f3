//! Schedule descriptions and active entries

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{AutomationError, Result};
use crate::task::Task;

/// Caller-facing description of when a task should fire
///
/// Exactly one of `at` / `every_secs` must be set. `repeat` requires
/// `every_secs`; a non-repeating schedule with `every_secs` fires once at
/// now + interval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    /// Absolute instant to fire at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    /// Relative interval in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub every_secs: Option<u64>,
    /// Re-arm after each fire
    #[serde(default)]
    pub repeat: bool,
}

impl Schedule {
    /// One-shot schedule at an absolute instant.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            at: Some(instant),
            every_secs: None,
            repeat: false,
        }
    }

    /// One-shot schedule firing once at now + `secs`.
    pub fn after_secs(secs: u64) -> Self {
        Self {
            at: None,
            every_secs: Some(secs),
            repeat: false,
        }
    }

    /// Recurring schedule firing every `secs`, first fire at now + `secs`.
    pub fn every_secs(secs: u64) -> Self {
        Self {
            at: None,
            every_secs: Some(secs),
            repeat: true,
        }
    }

    /// Validate and resolve into a first fire time and optional
    /// recurrence interval.
    pub(crate) fn resolve(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, Option<Duration>)> {
        match (self.at, self.every_secs) {
            (Some(_), Some(_)) => Err(AutomationError::InvalidStateTransition(
                "schedule must set exactly one of `at` and `every_secs`, not both".to_string(),
            )),
            (None, None) => Err(AutomationError::InvalidStateTransition(
                "schedule must set one of `at` or `every_secs`".to_string(),
            )),
            (Some(instant), None) => {
                if self.repeat {
                    return Err(AutomationError::InvalidStateTransition(
                        "repeating schedule requires `every_secs`".to_string(),
                    ));
                }
                Ok((instant, None))
            }
            (None, Some(secs)) => {
                if secs == 0 {
                    return Err(AutomationError::InvalidStateTransition(
                        "schedule interval must be positive".to_string(),
                    ));
                }
                let interval = Duration::seconds(secs as i64);
                let recurrence = self.repeat.then_some(interval);
                Ok((now + interval, recurrence))
            }
        }
    }
}

/// An active binding of a task to a future fire time
pub(crate) struct ScheduleEntry {
    /// Entry identity
    pub id: Uuid,
    /// Name of the owning task
    pub task_name: String,
    /// Reference to the task; the registry owns it
    pub task: Arc<Mutex<Task>>,
    /// Absolute instant this entry becomes due
    pub next_fire_at: DateTime<Utc>,
    /// Recurrence interval; set iff `repeat`
    pub every: Option<Duration>,
    /// Re-arm after each fire
    pub repeat: bool,
    /// Registration order, used as the tie-breaker when several entries
    /// are due in the same cycle
    pub seq: u64,
}

impl ScheduleEntry {
    /// Whether the entry is due as of `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_fire_at <= now
    }

    /// Re-arm a repeating entry from its scheduled time. Keeps recurrence
    /// drift-free: skew from a late poll never accumulates.
    pub fn advance(&mut self) {
        if let Some(every) = self.every {
            self.next_fire_at += every;
        }
    }
}
