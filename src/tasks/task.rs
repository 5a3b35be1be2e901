//! # Task abstraction.
//!
//! A [`Task`] is the resumable run action of a module: a sensor polling loop,
//! a queue drain loop, a status reporter. It receives a [`CancellationToken`]
//! owned by the scheduler and must observe it at its own suspension points.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Shared handle to a task object.
pub type TaskRef = Arc<dyn Task>;

/// # Asynchronous, cancellable unit of work.
///
/// Each call to [`run`](Task::run) is one attempt; the scheduler calls it again on restart.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use modvisor::{Task, TaskError};
///
/// struct Camera;
///
/// #[async_trait]
/// impl Task for Camera {
///     fn name(&self) -> &str { "vision.camera" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
///         ctx.cancelled().await;
///         Err(TaskError::Canceled)
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Stable, unique name; the scheduler keys its state by it.
    fn name(&self) -> &str;

    /// Runs until completion, failure or cancellation.
    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError>;
}
