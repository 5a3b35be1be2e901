//! # Runtime: one event bus plus one scheduler.
//!
//! [`Runtime`] is the wiring point for an orchestrator: modules subscribe on
//! [`Runtime::bus`] and hand their run loops to [`Runtime::start`].
//!
//! ```text
//! Runtime::new(cfg)
//!   ├─► EventBus::new(cfg.bus)
//!   └─► Scheduler::new(cfg.scheduler)
//!
//! run_until_signal()
//!   ├─► wait for SIGINT / SIGTERM / SIGQUIT (Ctrl-C elsewhere)
//!   ├─► bus.publish("runtime.shutdown", source = "runtime")
//!   └─► scheduler.shutdown()          (grace per task, then abort)
//! ```
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use modvisor::{Runtime, RuntimeConfig, TaskError, TaskFn, TaskSpec};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let runtime = Runtime::new(RuntimeConfig::default());
//! let loop_task = TaskFn::arc("planner", |ctx: CancellationToken| async move {
//!     ctx.cancelled().await;
//!     Ok::<(), TaskError>(())
//! });
//!
//! runtime.start(vec![TaskSpec::new(loop_task)]).await;
//! runtime.shutdown().await;
//! # }
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::events::{Event, EventBus};
use crate::scheduler::{LoadSource, Scheduler};
use crate::signals;
use crate::tasks::TaskSpec;

/// Event type published on the bus right before the scheduler shuts down.
pub const SHUTDOWN_EVENT: &str = "runtime.shutdown";

#[derive(Clone)]
pub struct Runtime {
    bus: EventBus,
    scheduler: Scheduler,
}

impl Runtime {
    pub fn new(cfg: RuntimeConfig) -> Self {
        Self {
            bus: EventBus::new(cfg.bus),
            scheduler: Scheduler::new(cfg.scheduler),
        }
    }

    /// Like [`new`](Self::new) but throttles on `source` instead of the host load average.
    pub fn with_load_source(cfg: RuntimeConfig, source: Arc<dyn LoadSource>) -> Self {
        Self {
            bus: EventBus::new(cfg.bus),
            scheduler: Scheduler::with_load_source(cfg.scheduler, source),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Schedules `specs` in priority order.
    pub async fn start(&self, specs: impl IntoIterator<Item = TaskSpec>) {
        self.scheduler.schedule_all(specs).await;
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        info!("runtime stopped");
    }

    /// Runs until a termination signal arrives, then shuts down.
    ///
    /// If listening for signals fails the runtime is still shut down before the
    /// error is returned.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        let received = signals::termination().await;
        match &received {
            Ok(signal) => info!(signal = *signal, "termination signal received"),
            Err(e) => warn!(label = e.as_label(), error = %e, "cannot listen for signals"),
        }

        self.bus
            .publish(Event::new(SHUTDOWN_EVENT, "runtime"))
            .await;
        self.shutdown().await;
        received.map(|_| ())
    }
}
