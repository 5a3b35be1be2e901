//! # Task abstractions and specifications.
//!
//! This module provides the task-related types consumed by the [`Scheduler`](crate::Scheduler):
//! - [`Task`] - trait for long-running, cancellable module loops
//! - [`TaskFn`] - closure-backed task implementation
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)
//! - [`TaskSpec`] - task bundled with priority, power cost and restart policy

mod spec;
mod task;
mod task_fn;

pub use spec::TaskSpec;
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;
