//! Trigger and poll engine
//!
//! The scheduler holds a set of (task, trigger) pairs and a polling loop
//! that fires the ones whose time has arrived:
//!
//! - **One-time triggers**: a single execution at an absolute instant, or
//!   at now + interval.
//! - **Recurring triggers**: re-armed drift-free after each fire
//!   (`next_fire_at += interval`, computed from the scheduled time rather
//!   than the actual fire time).
//!
//! Execution inside the poll cycle is synchronous with respect to the
//! loop: a slow task delays the next cycle, bounding concurrency to one
//! in-flight execution per scheduler instance. Stopping is cooperative
//! via a [`CancellationToken`](tokio_util::sync::CancellationToken) and
//! never preempts an in-flight execution.
//!
//! # Example
//!
//! ```ignore
//! use automation_core::{Schedule, Scheduler};
//!
//! let scheduler = Scheduler::new(60, 3);
//! scheduler.schedule(task, Schedule::every_secs(3600)).await?;
//!
//! // Run the polling loop until stop() is signaled
//! scheduler.run().await?;
//! ```

mod engine;
mod entry;

pub use engine::Scheduler;
pub use entry::Schedule;
