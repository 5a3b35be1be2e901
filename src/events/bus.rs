//! # In-process publish/subscribe bus with bounded concurrency.
//!
//! [`EventBus`] keeps a registry of handlers per event type (plus the wildcard
//! `"*"`), a bounded history ring, and a counting in-flight limiter shared by
//! every handler invocation on the bus.
//!
//! ## Architecture
//! ```text
//! publish(event)
//!     │
//!     ├─► history.push(event), published += 1
//!     ├─► handlers = registry[event_type] ∪ registry["*"]
//!     │
//!     ├──► [acquire slot ≤ backpressure_timeout] ──► handler1.handle() ─┐
//!     ├──► [acquire slot ≤ backpressure_timeout] ──► handler2.handle() ─┤  (join_all)
//!     └──► [timeout] ──► dropped += 1 (handler not invoked)             │
//!                                                                       ▼
//!                                                     publish returns when every
//!                                                     attempt resolved
//! ```
//!
//! ## Rules
//! - **Best effort, at most once per handler**: a saturated bus sheds deliveries
//!   instead of queuing unbounded work.
//! - **No ordering** between handlers of one event, nor between overlapping
//!   `publish` calls landing on the same handler.
//! - **Isolation**: a failing, panicking or slow handler only moves counters.
//! - **Deadline**: with `handler_timeout` set the bus stops waiting on the
//!   invocation at the deadline and frees its slot; the handler itself keeps running.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{RwLock, Semaphore};
use tokio::time;
use tracing::{debug, error, warn};

use super::event::{Event, WILDCARD};
use super::handler::HandlerRef;
use super::history::History;
use super::metrics::{BusMetrics, Counters, Delivery};
use crate::config::BusConfig;
use crate::error::HandlerError;

/// Cloneable handle to a shared event bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: BusConfig,
    handlers: RwLock<HashMap<String, Vec<HandlerRef>>>,
    history: Mutex<History>,
    in_flight: Arc<Semaphore>,
    counters: Counters,
}

impl EventBus {
    pub fn new(cfg: BusConfig) -> Self {
        let inner = Inner {
            handlers: RwLock::new(HashMap::new()),
            history: Mutex::new(History::new(cfg.history_capacity())),
            in_flight: Arc::new(Semaphore::new(cfg.in_flight_limit())),
            counters: Counters::new(cfg.per_handler_metrics),
            cfg,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns the configuration the bus was built with.
    pub fn config(&self) -> &BusConfig {
        &self.inner.cfg
    }

    /// Registers `handler` for `event_type` (or `"*"` for every type).
    ///
    /// Registering the same handler twice yields two invocations per event.
    pub async fn subscribe(&self, event_type: impl Into<String>, handler: HandlerRef) {
        let event_type = event_type.into();
        debug!(event_type = %event_type, handler = handler.name(), "handler subscribed");
        self.inner
            .handlers
            .write()
            .await
            .entry(event_type)
            .or_default()
            .push(handler);
    }

    /// Number of handlers registered directly under `event_type`.
    pub async fn subscriber_count(&self, event_type: &str) -> usize {
        self.inner
            .handlers
            .read()
            .await
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// Publishes an event and waits until every delivery attempt has resolved.
    ///
    /// Never fails: drops, handler errors and timeouts are only visible through
    /// [`metrics`](Self::metrics) and logs.
    pub async fn publish(&self, event: Event) {
        let started = Instant::now();
        let event = Arc::new(event);

        self.inner.history.lock().push(Arc::clone(&event));
        self.inner.counters.published();

        let handlers = self.handlers_for(event.event_type()).await;
        if handlers.is_empty() {
            return;
        }

        join_all(
            handlers
                .into_iter()
                .map(|handler| self.deliver(handler, Arc::clone(&event), started)),
        )
        .await;

        self.inner.counters.publish_finished(started.elapsed());
    }

    /// Re-delivers history entries to `handler`, oldest first, one at a time.
    ///
    /// Filters by `event_type` (`"*"` = all) and `created_at >= since`; stops after
    /// `limit` matches. Bypasses the in-flight limiter. Returns the number of events
    /// delivered; handler failures are logged and do not stop the walk.
    pub async fn replay(
        &self,
        event_type: &str,
        handler: HandlerRef,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> usize {
        let events = self.inner.history.lock().matching(event_type, since, limit);
        let mut delivered = 0;
        for event in events {
            let event_id = event.event_id().to_string();
            match invoke(&handler, event).await {
                Ok(()) => {}
                Err(e) => warn!(
                    handler = handler.name(),
                    event_id = %event_id,
                    error = %e,
                    "replayed event failed in handler"
                ),
            }
            delivered += 1;
        }
        delivered
    }

    /// Last `limit` events across all types, most recent last.
    pub fn recent_events(&self, limit: usize) -> Vec<Arc<Event>> {
        self.inner.history.lock().recent(limit)
    }

    /// Point-in-time snapshot of the bus counters.
    pub fn metrics(&self) -> BusMetrics {
        let history_size = self.inner.history.lock().len();
        let in_flight = self
            .inner
            .cfg
            .in_flight_limit()
            .saturating_sub(self.inner.in_flight.available_permits());
        self.inner.counters.snapshot(history_size, in_flight)
    }

    async fn handlers_for(&self, event_type: &str) -> Vec<HandlerRef> {
        let registry = self.inner.handlers.read().await;
        let mut handlers: Vec<HandlerRef> =
            registry.get(event_type).cloned().unwrap_or_default();
        if event_type != WILDCARD {
            if let Some(wild) = registry.get(WILDCARD) {
                handlers.extend(wild.iter().cloned());
            }
        }
        handlers
    }

    /// One delivery attempt: acquire a slot, invoke (optionally under deadline), release.
    async fn deliver(&self, handler: HandlerRef, event: Arc<Event>, published_at: Instant) {
        let cfg = &self.inner.cfg;
        let permit = match time::timeout(
            cfg.backpressure_timeout,
            Arc::clone(&self.inner.in_flight).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            // The semaphore is never closed; treat it like saturation if it ever is.
            Ok(Err(_)) | Err(_) => {
                warn!(
                    handler = handler.name(),
                    event_type = event.event_type(),
                    timeout = ?cfg.backpressure_timeout,
                    "dropping delivery: no in-flight slot available"
                );
                self.inner.counters.record(handler.name(), Delivery::Dropped);
                return;
            }
        };

        let lag = published_at.elapsed();
        let event_type = event.event_type().to_string();
        let outcome = match cfg.handler_deadline() {
            Some(deadline) => invoke_with_deadline(&handler, event, deadline).await,
            None => invoke(&handler, event).await,
        };
        drop(permit);

        let delivery = match outcome {
            Ok(()) => Delivery::Completed { lag },
            Err(HandlerError::Timeout { timeout }) => {
                warn!(
                    handler = handler.name(),
                    event_type = %event_type,
                    timeout = ?timeout,
                    "handler exceeded its deadline"
                );
                Delivery::TimedOut { lag }
            }
            Err(e) => {
                error!(
                    handler = handler.name(),
                    event_type = %event_type,
                    error = %e,
                    "handler failed"
                );
                Delivery::Failed { lag }
            }
        };
        self.inner.counters.record(handler.name(), delivery);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

/// Awaits the handler inline, converting a panic into [`HandlerError::Panicked`].
async fn invoke(handler: &HandlerRef, event: Arc<Event>) -> Result<(), HandlerError> {
    match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(HandlerError::from_panic(panic.as_ref())),
    }
}

/// Runs the handler on its own task so that giving up at the deadline does not cancel it.
async fn invoke_with_deadline(
    handler: &HandlerRef,
    event: Arc<Event>,
    deadline: Duration,
) -> Result<(), HandlerError> {
    let h = Arc::clone(handler);
    let join = tokio::spawn(async move { h.handle(event).await });
    match time::timeout(deadline, join).await {
        Ok(Ok(res)) => res,
        Ok(Err(join_err)) if join_err.is_panic() => {
            Err(HandlerError::from_panic(join_err.into_panic().as_ref()))
        }
        Ok(Err(_cancelled)) => Err(HandlerError::fail("handler task was cancelled")),
        Err(_elapsed) => Err(HandlerError::Timeout { timeout: deadline }),
    }
}
