//! Automation Core - task registry, manager, and polling scheduler
//!
//! This crate provides a single-process, in-memory task automation
//! subsystem:
//! - **Task**: a named, stateful unit of deferred work with a single
//!   current execution outcome (`task`)
//! - **Scheduler**: one-time and recurring triggers fired by a
//!   cooperative polling loop (`scheduler`)
//! - **AutomationManager**: the façade owning the registry and the
//!   scheduler lifecycle (`manager`)
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │ AutomationManager │  Registry + lifecycle façade
//! └─────────┬─────────┘
//!           │
//!           ▼
//! ┌───────────────────┐
//! │     Scheduler     │  Due-entry scan + polling loop
//! └─────────┬─────────┘
//!           │
//!           ▼
//! ┌───────────────────┐
//! │       Task        │  State machine around a unit of work
//! └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use automation_core::{task, AutomationManager, Schedule};
//! use serde_json::json;
//!
//! let manager = AutomationManager::default();
//!
//! manager
//!     .create_task("ping", "connectivity probe", task::work(|| async { Ok(json!("pong")) }))
//!     .await?;
//!
//! // Run on demand
//! let result = manager.execute_task("ping").await?;
//!
//! // Or every hour
//! manager.schedule_task("ping", Schedule::every_secs(3600)).await?;
//! manager.start_scheduler().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod manager;
pub mod scheduler;
pub mod task;

pub use config::AutomationConfig;
pub use error::{AutomationError, Result};
pub use manager::AutomationManager;
pub use scheduler::{Schedule, Scheduler};
pub use task::{Task, TaskSnapshot, TaskStatus, TaskWork};
