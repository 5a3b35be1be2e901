//! # Per-name supervision loop.
//!
//! One actor is spawned when a name is admitted and lives until the name
//! reaches a terminal state, loses re-admission, or is cancelled.
//!
//! ```text
//! loop {
//!   ├─► throttle: load > load_threshold ? sleep(throttle_seconds) (cancellable, heartbeats keep ticking)
//!   ├─► run_once(spec) with heartbeats
//!   ├─► shared.finish(attempt)            (releases power exactly once)
//!   │     ├─ Completed / Cancelled / exhausted / fatal ─► exit
//!   │     └─ Restart { delay }
//!   ├─► sleep(delay)                      (cancellable)
//!   └─► shared.readmit()                  (same power-budget check)
//!         ├─ admitted ─► continue
//!         └─ deferred ─► exit, name stays `pending`
//! }
//! ```
//!
//! ## Rules
//! - Attempts for one name run **sequentially**, never in parallel.
//! - Cancellation is observed at every suspension point of the loop itself;
//!   the run action observes it through its own child token.

use std::sync::Arc;

use tokio::select;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::core::{Next, Shared};
use super::runner::{run_once, Attempt};
use crate::tasks::TaskSpec;

pub(super) struct TaskActor {
    shared: Arc<Shared>,
    spec: TaskSpec,
    token: CancellationToken,
    epoch: u64,
}

impl TaskActor {
    pub fn new(shared: Arc<Shared>, spec: TaskSpec, token: CancellationToken, epoch: u64) -> Self {
        Self {
            shared,
            spec,
            token,
            epoch,
        }
    }

    pub async fn run(self) {
        loop {
            let attempt = if self.throttle().await {
                run_once(&self.shared, &self.spec, &self.token, self.epoch).await
            } else {
                Attempt::Cancelled
            };

            match self.shared.finish(&self.spec, attempt, self.epoch).await {
                Next::Stop => return,
                Next::Restart { delay } => {
                    if !delay.is_zero() {
                        select! {
                            _ = time::sleep(delay) => {}
                            _ = self.token.cancelled() => {
                                self.shared.finish(&self.spec, Attempt::Cancelled, self.epoch).await;
                                return;
                            }
                        }
                    }
                    if !self.shared.readmit(&self.spec, &self.token, self.epoch).await {
                        return;
                    }
                }
            }
        }
    }

    /// Delays the attempt while the system is overloaded. Returns `false` if cancelled meanwhile.
    async fn throttle(&self) -> bool {
        let cfg = &self.shared.cfg;
        let load = self.shared.source.load();
        if load > cfg.load_threshold {
            warn!(
                task = self.spec.name(),
                load,
                threshold = cfg.load_threshold,
                delay = ?cfg.throttle_seconds,
                "system load above threshold; throttling run"
            );
            let pause = time::sleep(cfg.throttle_seconds);
            tokio::pin!(pause);
            let mut beat = time::interval(cfg.heartbeat_period());
            beat.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                select! {
                    _ = &mut pause => break,
                    _ = beat.tick() => self.shared.heartbeat(self.spec.name(), self.epoch).await,
                    _ = self.token.cancelled() => return false,
                }
            }
        }
        !self.token.is_cancelled()
    }
}
