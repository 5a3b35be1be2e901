//! # Status aggregation observer.
//!
//! [`StatusReporter`] counts events per type, remembers when each source was
//! last heard from and keeps the latest payload per type. [`snapshot`] gives a
//! point-in-time copy for health endpoints; [`run`] logs a summary every
//! `interval` and is meant to be supervised by the scheduler.
//!
//! [`snapshot`]: StatusReporter::snapshot
//! [`run`]: StatusReporter::run

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{HandlerError, TaskError};
use crate::events::{Event, Handler};
use crate::tasks::{TaskFn, TaskRef};

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub uptime: Duration,
    pub total_events: u64,
    pub events_by_type: BTreeMap<String, u64>,
    /// When the reporter last received an event from each source.
    pub last_seen_by_source: BTreeMap<String, DateTime<Utc>>,
    /// Latest payload per event type, rendered as JSON.
    pub last_event_payloads: BTreeMap<String, String>,
}

#[derive(Default)]
struct Seen {
    by_type: BTreeMap<String, u64>,
    by_source: BTreeMap<String, DateTime<Utc>>,
    payloads: BTreeMap<String, String>,
}

pub struct StatusReporter {
    interval: Duration,
    started: Instant,
    seen: Mutex<Seen>,
}

impl StatusReporter {
    /// `interval` is clamped to at least 1ms.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            started: Instant::now(),
            seen: Mutex::new(Seen::default()),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let seen = self.seen.lock();
        StatusSnapshot {
            uptime: self.started.elapsed(),
            total_events: seen.by_type.values().sum(),
            events_by_type: seen.by_type.clone(),
            last_seen_by_source: seen.by_source.clone(),
            last_event_payloads: seen.payloads.clone(),
        }
    }

    /// Logs a summary every `interval` until `ctx` is cancelled.
    pub async fn run(&self, ctx: CancellationToken) {
        let mut tick = time::interval_at(time::Instant::now() + self.interval, self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return,
                _ = tick.tick() => {
                    let snap = self.snapshot();
                    debug!(
                        uptime = ?snap.uptime,
                        total = snap.total_events,
                        by_type = ?snap.events_by_type,
                        sources = ?snap.last_seen_by_source.keys().collect::<Vec<_>>(),
                        "status"
                    );
                }
            }
        }
    }

    /// Wraps [`run`](Self::run) as a schedulable task.
    pub fn into_task(self: Arc<Self>, name: impl Into<Cow<'static, str>>) -> TaskRef {
        TaskFn::arc(name, move |ctx: CancellationToken| {
            let reporter = Arc::clone(&self);
            async move {
                reporter.run(ctx).await;
                Ok::<(), TaskError>(())
            }
        })
    }
}

impl Default for StatusReporter {
    /// Summaries every 5 seconds.
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl Handler for StatusReporter {
    async fn handle(&self, event: Arc<Event>) -> Result<(), HandlerError> {
        let payload = event.payload_json();
        let mut seen = self.seen.lock();
        *seen.by_type.entry(event.event_type().to_string()).or_default() += 1;
        seen.by_source.insert(event.source().to_string(), Utc::now());
        seen.payloads.insert(event.event_type().to_string(), payload);
        Ok(())
    }

    fn name(&self) -> &str {
        "status_reporter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusConfig;
    use crate::events::{EventBus, WILDCARD};

    #[tokio::test]
    async fn aggregates_through_the_bus() {
        let bus = EventBus::new(BusConfig::default());
        let reporter = Arc::new(StatusReporter::default());
        bus.subscribe(WILDCARD, reporter.clone()).await;

        bus.publish(Event::new("sensor.audio", "mic").with_field("db", 41))
            .await;
        bus.publish(Event::new("sensor.audio", "mic").with_field("db", 57))
            .await;
        bus.publish(Event::new("intent.detected", "interpreter"))
            .await;

        let snap = reporter.snapshot();
        assert_eq!(snap.total_events, 3);
        assert_eq!(snap.events_by_type.get("sensor.audio"), Some(&2));
        assert_eq!(
            snap.last_event_payloads.get("sensor.audio").map(String::as_str),
            Some(r#"{"db":57}"#)
        );
        assert_eq!(
            snap.last_seen_by_source.keys().collect::<Vec<_>>(),
            vec!["interpreter", "mic"]
        );
    }

    #[tokio::test]
    async fn last_seen_is_the_receipt_time() {
        let reporter = StatusReporter::default();
        let stale = Utc::now() - chrono::Duration::minutes(5);
        let before = Utc::now();

        reporter
            .handle(Arc::new(Event::new("sensor.audio", "mic").with_created_at(stale)))
            .await
            .unwrap();

        let seen = reporter.snapshot().last_seen_by_source.get("mic").copied();
        assert!(seen.is_some_and(|t| t >= before && t <= Utc::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_cancel() {
        let reporter = Arc::new(StatusReporter::new(Duration::from_millis(10)));
        let ctx = CancellationToken::new();
        let task = reporter.into_task("status");

        let handle = tokio::spawn({
            let ctx = ctx.clone();
            async move { task.run(ctx).await }
        });
        time::sleep(Duration::from_millis(55)).await;
        ctx.cancel();

        let res = handle.await;
        assert!(matches!(res, Ok(Ok(()))));
    }
}
