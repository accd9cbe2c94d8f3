//! Error types for automation-core
//!
//! One taxonomy covers the registry, the task state machine, and the
//! scheduler; callers match on variants rather than strings.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, AutomationError>;

/// Automation error types
#[derive(Debug, Error)]
pub enum AutomationError {
    /// A task with this name already exists in the registry
    #[error("duplicate task: {0}")]
    DuplicateTask(String),

    /// No task with this name exists in the registry
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// The requested state transition or schedule shape is not allowed
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// The wrapped unit of work failed
    #[error("execution error: {0}")]
    Execution(String),

    /// Invalid configuration (unreadable file, double start, bad value)
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AutomationError {
    /// Whether this error came from the unit of work itself rather than
    /// the surrounding machinery.
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }
}
