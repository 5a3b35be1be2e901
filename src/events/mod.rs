//! Events: data model, handlers and the publish/subscribe bus.
//!
//! ## Contents
//! - [`Event`] immutable message with ordered JSON payload
//! - [`Handler`], [`HandlerFn`], [`HandlerRef`] subscriber contract
//! - [`EventBus`] registry, bounded history, in-flight limiter, replay
//! - [`BusMetrics`], [`HandlerStats`] point-in-time counters
//!
//! ## Quick reference
//! - **Publishers**: sensors, interpreters, the reasoning engine (external modules).
//! - **Consumers**: handlers registered with [`EventBus::subscribe`]; latency-sensitive
//!   consumers buffer into a [`PrioritizedQueue`](crate::PrioritizedQueue) instead of
//!   processing inline.

mod bus;
mod event;
mod handler;
mod history;
mod metrics;

pub use bus::EventBus;
pub use event::{Event, Payload, WILDCARD};
pub use handler::{Handler, HandlerFn, HandlerRef};
pub use metrics::{BusMetrics, HandlerStats};
