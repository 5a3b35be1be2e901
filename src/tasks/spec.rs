//! # Task specification for supervised execution.
//!
//! [`TaskSpec`] describes how the [`Scheduler`](crate::Scheduler) admits and
//! supervises one run action:
//! - **priority**: lower values are admitted first by `schedule_all` / `readmit_pending`
//! - **power_cost**: share of the scheduler's power budget held while running
//! - **restart** / **max_restarts**: bounded automatic restart after a failure
//! - **backoff**: delay before each restart (immediate by default)
//!
//! The spec is immutable once handed to the scheduler.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use modvisor::{TaskError, TaskFn, TaskRef, TaskSpec};
//!
//! let camera: TaskRef = TaskFn::arc("vision.camera", |ctx: CancellationToken| async move {
//!     ctx.cancelled().await;
//!     Ok::<(), TaskError>(())
//! });
//!
//! let spec = TaskSpec::new(camera)
//!     .with_priority(1)
//!     .with_power_cost(0.3)
//!     .with_max_restarts(5);
//!
//! assert_eq!(spec.name(), "vision.camera");
//! assert!(spec.restart());
//! ```

use crate::policies::BackoffPolicy;
use crate::tasks::task::TaskRef;

/// Specification for running a task under supervision.
#[derive(Clone)]
pub struct TaskSpec {
    task: TaskRef,
    priority: i32,
    power_cost: f64,
    restart: bool,
    max_restarts: u32,
    backoff: BackoffPolicy,
}

impl TaskSpec {
    /// Creates a spec with defaults: priority `0`, power cost `0.0`,
    /// restart enabled with `max_restarts = 3`, immediate re-admission.
    pub fn new(task: TaskRef) -> Self {
        Self {
            task,
            priority: 0,
            power_cost: 0.0,
            restart: true,
            max_restarts: 3,
            backoff: BackoffPolicy::immediate(),
        }
    }

    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Convenience: returns the task name (the scheduler's key).
    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn power_cost(&self) -> f64 {
        self.power_cost
    }

    pub fn restart(&self) -> bool {
        self.restart
    }

    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    /// Lower runs first.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Negative costs are treated as zero.
    pub fn with_power_cost(mut self, power_cost: f64) -> Self {
        self.power_cost = power_cost.max(0.0);
        self
    }

    pub fn with_restart(mut self, restart: bool) -> Self {
        self.restart = restart;
        self
    }

    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

impl std::fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name())
            .field("priority", &self.priority)
            .field("power_cost", &self.power_cost)
            .field("restart", &self.restart)
            .field("max_restarts", &self.max_restarts)
            .finish()
    }
}
