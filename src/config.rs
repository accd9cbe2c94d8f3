//! Configuration types
//!
//! Configuration is consumed, not owned: the host supplies values (retry
//! budget, poll period, timeouts) and this crate reads them. Every field
//! has a serde default so partial files work.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AutomationError, Result};

/// Top-level configuration for an [`AutomationManager`](crate::AutomationManager)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// General automation settings
    #[serde(default)]
    pub automation: AutomationSection,
    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerSection,
    /// Task settings
    #[serde(default)]
    pub tasks: TaskSection,
}

/// General automation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationSection {
    /// Whether the scheduler may be started
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Advisory log level for the host's tracing subscriber
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Retry budget for failed scheduled executions
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    /// Poll period of the scheduler loop, in seconds
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

/// Task settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSection {
    /// Advisory timeout for units of work, in seconds. Not enforced by
    /// this crate; callers wrapping blocking work are expected to apply it.
    #[serde(default = "default_timeout")]
    pub default_timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_check_interval() -> u64 {
    60
}

fn default_timeout() -> u64 {
    300
}

impl Default for AutomationSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            log_level: default_log_level(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
        }
    }
}

impl Default for TaskSection {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout(),
        }
    }
}

impl AutomationConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing or unparseable file is an error; callers that want
    /// built-in defaults use [`AutomationConfig::default`].
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AutomationError::InvalidConfig(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        toml::from_str(&content)
            .map_err(|e| AutomationError::InvalidConfig(format!("failed to parse config: {}", e)))
    }
}
