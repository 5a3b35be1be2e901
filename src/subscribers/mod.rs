//! # Bundled bus observers.
//!
//! Both are ordinary [`Handler`](crate::Handler)s meant to be subscribed under
//! the wildcard type:
//!
//! ```text
//! EventBus ── "*" ──┬──► EventLogger     (one `info` line per event)
//!                   └──► StatusReporter  (counters; periodic `debug` summary via run(ctx))
//! ```

mod log;
mod status;

pub use log::EventLogger;
pub use status::{StatusReporter, StatusSnapshot};
