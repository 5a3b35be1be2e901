//! # Supervised task scheduling.
//!
//! - [`Scheduler`]: admission control under a power budget, heartbeats, throttling,
//!   bounded restart and graceful shutdown.
//! - [`HealthSnapshot`] / [`TaskHealth`] / [`TaskStatus`]: read-only views for health reporting.
//! - [`LoadSource`]: where throttling reads system load from.
//!
//! Internal modules:
//! - `actor`: per-name supervision loop (throttle, attempt, restart);
//! - `runner`: one attempt with heartbeats and panic isolation;
//! - `state`: the mutable per-name record.

mod actor;
mod core;
mod load;
mod runner;
mod state;

pub use self::core::Scheduler;
pub use load::{LoadSource, StaticLoad, SystemLoad};
pub use state::{HealthSnapshot, TaskHealth, TaskStatus};
