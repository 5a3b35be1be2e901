//! Restart pacing policies.
//!
//! The scheduler decides **whether** a failed task is re-admitted from
//! `TaskSpec::restart` / `max_restarts`; the types here decide **when**.
//!
//! ## Contents
//! - [`BackoffPolicy`] delay before the n-th restart (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization spreading simultaneous restarts apart
//!
//! ## Defaults
//! - `TaskSpec` uses [`BackoffPolicy::immediate`]: a crashed module is re-admitted
//!   as soon as it fails.
//! - `BackoffPolicy::default()` → first=100ms, factor=2.0, max=30s, jitter=None.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
