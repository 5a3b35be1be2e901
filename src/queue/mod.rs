//! # Tick-driven input queues.
//!
//! Consumers that must not process inline in a bus handler buffer items here
//! and drain them on their own cadence.
//!
//! - [`PrioritizedQueue`]: two tiers (high / normal), batch drained on a fixed tick,
//!   high strictly first.
//! - [`InputQueue`]: one FIFO tier drained by a background worker.
//!
//! Both are bounded and shed the oldest work on overflow; `enqueue` never rejects.

mod input;
mod prioritized;

use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::HandlerError;

pub use input::{InputQueue, InputQueueMetrics};
pub use prioritized::{PrioritizedQueue, QueueMetrics};

/// Type-erased async item handler.
pub(crate) type ItemHandler<T> =
    Box<dyn Fn(T) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

pub(crate) fn item_handler<T, H, Fut>(handler: H) -> ItemHandler<T>
where
    H: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Box::new(move |item| handler(item).boxed())
}

/// Runs the handler for one item; a panic is reported as [`HandlerError::Panicked`],
/// whether it happens while building the future or while polling it.
pub(crate) async fn invoke<T>(handler: &ItemHandler<T>, item: T) -> Result<(), HandlerError> {
    match AssertUnwindSafe(async move { handler(item).await })
        .catch_unwind()
        .await
    {
        Ok(res) => res,
        Err(panic) => Err(HandlerError::from_panic(panic.as_ref())),
    }
}
