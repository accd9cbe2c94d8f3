//! Automation manager - façade and registry
//!
//! [`AutomationManager`] owns the task registry and the scheduler, and is
//! the surface external callers use: create tasks, execute them on
//! demand, schedule them, query status, and drive the scheduler
//! lifecycle. An explicit instance, never a process-wide singleton:
//! independent managers coexist without interference.

use std::collections::HashMap;
use std::sync::Arc;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AutomationConfig;
use crate::error::{AutomationError, Result};
use crate::scheduler::{Schedule, Scheduler};
use crate::task::{Task, TaskSnapshot, TaskStatus, TaskWork};

/// Façade over the task registry and scheduler
pub struct AutomationManager {
    config: AutomationConfig,
    tasks: Arc<RwLock<HashMap<String, Arc<Mutex<Task>>>>>,
    scheduler: Arc<Scheduler>,
    loop_handle: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl AutomationManager {
    /// Create a manager from configuration.
    pub fn new(config: AutomationConfig) -> Self {
        let scheduler = Arc::new(Scheduler::new(
            config.scheduler.check_interval_secs,
            config.automation.max_retries,
        ));
        info!("AutomationManager initialized");
        Self {
            config,
            tasks: Arc::new(RwLock::new(HashMap::new())),
            scheduler,
            loop_handle: Mutex::new(None),
        }
    }

    /// Create a manager from a TOML configuration file.
    pub fn from_config_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Ok(Self::new(AutomationConfig::from_path(path)?))
    }

    /// The configuration this manager was built from.
    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// The underlying scheduler, for hosts that drive the loop themselves.
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Register a new task in `pending` state.
    ///
    /// Fails with [`AutomationError::DuplicateTask`] if the name is taken;
    /// an existing task is never silently overwritten.
    pub async fn create_task(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        work: TaskWork,
    ) -> Result<TaskSnapshot> {
        let name = name.into();
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&name) {
            return Err(AutomationError::DuplicateTask(name));
        }

        let task = Task::new(name.clone(), work).with_description(description);
        let snapshot = task.snapshot();
        tasks.insert(name.clone(), Arc::new(Mutex::new(task)));
        info!("Created task: {}", name);
        Ok(snapshot)
    }

    /// Execute a task immediately and return its result.
    ///
    /// Propagates the task's outcome: a failing unit of work surfaces as
    /// [`AutomationError::Execution`]. Manual executions never consume
    /// the scheduled retry budget.
    pub async fn execute_task(&self, name: &str) -> Result<Value> {
        let task = self.get(name).await?;
        let mut task = task.lock().await;
        task.execute().await
    }

    /// Register a schedule entry for a task. Returns the entry id.
    pub async fn schedule_task(&self, name: &str, schedule: Schedule) -> Result<Uuid> {
        let task = self.get(name).await?;
        self.scheduler.schedule(task, schedule).await
    }

    /// Cancel a pending task and drop its schedule entries.
    pub async fn cancel_task(&self, name: &str) -> Result<()> {
        let task = self.get(name).await?;
        task.lock().await.cancel()?;
        self.scheduler.unschedule_task(name).await;
        Ok(())
    }

    /// Remove a task from the registry, dropping its schedule entries.
    pub async fn remove_task(&self, name: &str) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.remove(name).is_none() {
            return Err(AutomationError::TaskNotFound(name.to_string()));
        }
        drop(tasks);

        self.scheduler.unschedule_task(name).await;
        debug!("Removed task: {}", name);
        Ok(())
    }

    /// Current status of a task.
    pub async fn get_task_status(&self, name: &str) -> Result<TaskStatus> {
        let task = self.get(name).await?;
        let status = task.lock().await.status;
        Ok(status)
    }

    /// Read-only snapshot of a task, including result/error detail.
    pub async fn get_task(&self, name: &str) -> Result<TaskSnapshot> {
        let task = self.get(name).await?;
        let snapshot = task.lock().await.snapshot();
        Ok(snapshot)
    }

    /// Names of all registered tasks, sorted. A snapshot, not a live view.
    pub async fn list_tasks(&self) -> Vec<String> {
        let tasks = self.tasks.read().await;
        let mut names: Vec<String> = tasks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Start the scheduler loop in the background.
    ///
    /// A no-op (logged) when `automation.enabled` is false. Starting
    /// while the loop is already running is an error.
    pub async fn start_scheduler(&self) -> Result<()> {
        if !self.config.automation.enabled {
            info!("Scheduler disabled by configuration");
            return Ok(());
        }

        let mut handle = self.loop_handle.lock().await;
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(AutomationError::InvalidConfig(
                "scheduler is already running".to_string(),
            ));
        }

        info!("Starting scheduler");
        let scheduler = self.scheduler.clone();
        *handle = Some(tokio::spawn(async move { scheduler.run().await }));
        Ok(())
    }

    /// Stop the scheduler loop and wait for it to wind down. An
    /// in-flight task execution is allowed to finish.
    pub async fn stop_scheduler(&self) -> Result<()> {
        info!("Stopping scheduler");
        self.scheduler.stop();

        let handle = self.loop_handle.lock().await.take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| AutomationError::Execution(format!("scheduler loop panicked: {}", e)))??;
        }
        Ok(())
    }

    /// Run the scheduler loop on the caller's task, blocking until
    /// [`stop_scheduler`](Self::stop_scheduler) (or
    /// [`Scheduler::stop`]) is signaled.
    pub async fn run_scheduler(&self) -> Result<()> {
        if !self.config.automation.enabled {
            info!("Scheduler disabled by configuration");
            return Ok(());
        }
        self.scheduler.run().await
    }

    async fn get(&self, name: &str) -> Result<Arc<Mutex<Task>>> {
        let tasks = self.tasks.read().await;
        tasks
            .get(name)
            .cloned()
            .ok_or_else(|| AutomationError::TaskNotFound(name.to_string()))
    }
}

impl Default for AutomationManager {
    fn default() -> Self {
        Self::new(AutomationConfig::default())
    }
}
