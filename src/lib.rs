//! # modvisor
//!
//! **Modvisor** is the concurrency and messaging core for runtimes made of
//! independent modules (sensors, interpreters, a reasoning engine, action
//! executors) that talk only through events and run under a shared resource
//! budget.
//!
//! It provides three building blocks:
//! - an in-process publish/subscribe [`EventBus`] with bounded concurrency,
//!   timeout-based backpressure, bounded history and replay;
//! - a [`Scheduler`] supervising long-running module loops under a priority
//!   order and a power budget, with heartbeats, load throttling and bounded restart;
//! - a two-tier [`PrioritizedQueue`] (plus a single-tier [`InputQueue`]) for
//!   consumers that drain inputs on their own tick.
//!
//! Faults never cross component boundaries: drops, handler failures, timeouts
//! and task crashes are recorded in metrics and health snapshots and logged
//! through `tracing`.
//!
//! ## Architecture
//! ```text
//!   producers ──publish(Event)──► ┌──────────────────────────────────────────┐
//!                                 │ EventBus                                 │
//!                                 │  history ring (max_history)              │
//!                                 │  registry: type → [Handler], "*" → [...] │
//!                                 │  in-flight limiter (max_in_flight)       │
//!                                 └───────┬───────────────┬──────────────────┘
//!                                         ▼               ▼
//!                                  Handler::handle   PrioritizedQueue::enqueue
//!                                                         │ (tick)
//!                                                         ▼
//!                                                    batch handler
//!
//!   orchestrator ──schedule(TaskSpec)──► ┌──────────────────────────────┐
//!                                        │ Scheduler                    │
//!                                        │  power budget admission      │
//!                                        │  TaskActor per name          │
//!                                        │   throttle → run → restart   │
//!                                        │  heartbeats, health snapshot │
//!                                        └──────────────────────────────┘
//! ```
//!
//! ## Task lifecycle
//! ```text
//! pending ──► running ──┬─► completed                 (run returned Ok)
//!    ▲                  ├─► cancelled                 (token fired)
//!    │                  └─► failed ─┬─► running       (restart, budget permitting)
//!    └──────── no budget ───────────┤
//!                                   └─► failed        (fatal / exhausted)
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types                                   |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Events**        | Pub/sub with backpressure, history, replay, metrics.     | [`EventBus`], [`Event`], [`Handler`]        |
//! | **Scheduling**    | Admission control, supervision, health.                  | [`Scheduler`], [`TaskSpec`], [`HealthSnapshot`] |
//! | **Queues**        | Bounded, eviction-based input buffering.                 | [`PrioritizedQueue`], [`InputQueue`]        |
//! | **Policies**      | Restart pacing.                                          | [`BackoffPolicy`], [`JitterPolicy`]         |
//! | **Observers**     | Ready-made wildcard handlers.                            | [`EventLogger`], [`StatusReporter`]         |
//! | **Errors**        | Typed errors with stable labels.                         | [`TaskError`], [`HandlerError`], [`RuntimeError`] |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use modvisor::{Event, HandlerError, HandlerFn, Runtime, RuntimeConfig, TaskError, TaskFn, TaskSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let runtime = Runtime::new(RuntimeConfig::default());
//!
//!     runtime
//!         .bus()
//!         .subscribe("intent.detected", HandlerFn::arc("planner", |ev: Arc<Event>| async move {
//!             println!("intent from {}", ev.source());
//!             Ok::<(), HandlerError>(())
//!         }))
//!         .await;
//!
//!     let bus = runtime.bus().clone();
//!     let interpreter = TaskFn::arc("interpreter", move |ctx: CancellationToken| {
//!         let bus = bus.clone();
//!         async move {
//!             bus.publish(Event::new("intent.detected", "interpreter").with_field("intent", "open"))
//!                 .await;
//!             ctx.cancelled().await;
//!             Ok::<(), TaskError>(())
//!         }
//!     });
//!
//!     runtime.start(vec![TaskSpec::new(interpreter).with_power_cost(0.2)]).await;
//!     runtime.shutdown().await;
//! }
//! ```

mod config;
mod error;
mod events;
mod policies;
mod queue;
mod runtime;
mod scheduler;
mod signals;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use config::{BusConfig, QueueConfig, RuntimeConfig, SchedulerConfig};
pub use error::{HandlerError, RuntimeError, TaskError};
pub use events::{
    BusMetrics, Event, EventBus, Handler, HandlerFn, HandlerRef, HandlerStats, Payload, WILDCARD,
};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use queue::{InputQueue, InputQueueMetrics, PrioritizedQueue, QueueMetrics};
pub use runtime::{Runtime, SHUTDOWN_EVENT};
pub use scheduler::{
    HealthSnapshot, LoadSource, Scheduler, StaticLoad, SystemLoad, TaskHealth, TaskStatus,
};
pub use subscribers::{EventLogger, StatusReporter, StatusSnapshot};
pub use tasks::{Task, TaskFn, TaskRef, TaskSpec};
