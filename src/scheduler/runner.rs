//! # Run a single attempt of a scheduled task.
//!
//! Executes one call of [`Task::run`] on a child cancellation token while
//! refreshing the task's heartbeat every `heartbeat_interval`, and classifies
//! how the attempt ended.
//!
//! ```text
//! task.run(child) ─┬─ token cancelled | Err(Canceled) → Attempt::Cancelled
//!                  ├─ Ok(())                          → Attempt::Completed
//!                  ├─ Err(Fail/Fatal)                 → Attempt::Failed(e)
//!                  └─ panic                           → Attempt::Failed(Fail{"panicked: …"})
//! ```
//!
//! ## Rules
//! - Heartbeats stop as soon as the attempt future resolves.
//! - Any result returned after the token fired counts as cancellation
//!   (cancellation-induced errors are swallowed).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::core::Shared;
use crate::error::{panic_message, TaskError};
use crate::tasks::TaskSpec;

/// How one attempt ended.
#[derive(Debug)]
pub(super) enum Attempt {
    Completed,
    Cancelled,
    Failed(TaskError),
}

pub(super) async fn run_once(
    shared: &Arc<Shared>,
    spec: &TaskSpec,
    token: &CancellationToken,
    epoch: u64,
) -> Attempt {
    let child = token.child_token();
    let task = Arc::clone(spec.task());
    let attempt = AssertUnwindSafe(task.run(child)).catch_unwind();
    tokio::pin!(attempt);

    let mut beat = time::interval(shared.cfg.heartbeat_period());
    beat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let res = loop {
        tokio::select! {
            res = &mut attempt => break res,
            _ = beat.tick() => shared.heartbeat(spec.name(), epoch).await,
        }
    };

    match res {
        Ok(_) if token.is_cancelled() => Attempt::Cancelled,
        Ok(Ok(())) => Attempt::Completed,
        Ok(Err(TaskError::Canceled)) => Attempt::Cancelled,
        Ok(Err(e)) => Attempt::Failed(e),
        Err(panic) => {
            let info = panic_message(panic.as_ref());
            Attempt::Failed(TaskError::fail(format!("run action panicked: {info}")))
        }
    }
}
