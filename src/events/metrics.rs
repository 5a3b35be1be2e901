//! # Bus counters and snapshots.
//!
//! Monotonic counters are plain atomics so publishers never contend on them;
//! the "last publish" figures and per-handler maps sit behind a short
//! `parking_lot` critical section. [`BusMetrics`] is a point-in-time copy.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Per-handler attribution (only collected when `per_handler_metrics` is on).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HandlerStats {
    /// Invocations actually started.
    pub invocations: u64,
    /// Delay between the start of `publish` and the handler being invoked.
    pub last_lag: Duration,
    /// Invocations that returned an error or panicked.
    pub errors: u64,
    /// Invocations the bus stopped waiting on.
    pub timeouts: u64,
    /// Deliveries shed because no in-flight slot was free in time.
    pub dropped: u64,
}

/// Point-in-time snapshot of bus metrics.
#[derive(Debug, Clone, Serialize)]
pub struct BusMetrics {
    pub published: u64,
    pub dropped: u64,
    pub errors: u64,
    pub timeouts: u64,
    /// Wall time of the most recent completed `publish`.
    pub last_publish_latency: Duration,
    /// When the most recent `publish` completed.
    pub last_publish_time: Option<DateTime<Utc>>,
    pub history_size: usize,
    /// Handler invocations currently holding an in-flight slot.
    pub in_flight: usize,
    /// Empty unless per-handler attribution is enabled.
    pub handlers: BTreeMap<String, HandlerStats>,
}

#[derive(Default)]
struct Detail {
    last_publish_latency: Duration,
    last_publish_time: Option<DateTime<Utc>>,
    handlers: BTreeMap<String, HandlerStats>,
}

/// Outcome of one delivery attempt, for attribution.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Delivery {
    Dropped,
    Completed { lag: Duration },
    Failed { lag: Duration },
    TimedOut { lag: Duration },
}

pub(crate) struct Counters {
    published: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    per_handler: bool,
    detail: Mutex<Detail>,
}

impl Counters {
    pub fn new(per_handler: bool) -> Self {
        Self {
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            per_handler,
            detail: Mutex::new(Detail::default()),
        }
    }

    pub fn published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record(&self, handler: &str, delivery: Delivery) {
        match delivery {
            Delivery::Dropped => self.dropped.fetch_add(1, Ordering::Relaxed),
            Delivery::Failed { .. } => self.errors.fetch_add(1, Ordering::Relaxed),
            Delivery::TimedOut { .. } => self.timeouts.fetch_add(1, Ordering::Relaxed),
            Delivery::Completed { .. } => 0,
        };

        if !self.per_handler {
            return;
        }
        let mut detail = self.detail.lock();
        let stats = detail.handlers.entry(handler.to_string()).or_default();
        match delivery {
            Delivery::Dropped => stats.dropped += 1,
            Delivery::Completed { lag } => {
                stats.invocations += 1;
                stats.last_lag = lag;
            }
            Delivery::Failed { lag } => {
                stats.invocations += 1;
                stats.last_lag = lag;
                stats.errors += 1;
            }
            Delivery::TimedOut { lag } => {
                stats.invocations += 1;
                stats.last_lag = lag;
                stats.timeouts += 1;
            }
        }
    }

    pub fn publish_finished(&self, latency: Duration) {
        let mut detail = self.detail.lock();
        detail.last_publish_latency = latency;
        detail.last_publish_time = Some(Utc::now());
    }

    pub fn snapshot(&self, history_size: usize, in_flight: usize) -> BusMetrics {
        let detail = self.detail.lock();
        BusMetrics {
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            last_publish_latency: detail.last_publish_latency,
            last_publish_time: detail.last_publish_time,
            history_size,
            in_flight,
            handlers: detail.handlers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_counters_ignore_attribution_flag() {
        let c = Counters::new(false);
        c.published();
        c.record("h", Delivery::Dropped);
        c.record("h", Delivery::Failed { lag: Duration::ZERO });
        c.record("h", Delivery::TimedOut { lag: Duration::ZERO });
        c.record("h", Delivery::Completed { lag: Duration::ZERO });

        let m = c.snapshot(1, 0);
        assert_eq!((m.published, m.dropped, m.errors, m.timeouts), (1, 1, 1, 1));
        assert!(m.handlers.is_empty());
        assert!(m.last_publish_time.is_none());
    }

    #[test]
    fn per_handler_stats_accumulate() {
        let c = Counters::new(true);
        let lag = Duration::from_millis(3);
        c.record("a", Delivery::Completed { lag });
        c.record("a", Delivery::Failed { lag });
        c.record("b", Delivery::Dropped);
        c.publish_finished(Duration::from_millis(7));

        let m = c.snapshot(0, 0);
        assert_eq!(
            m.handlers["a"],
            HandlerStats {
                invocations: 2,
                last_lag: lag,
                errors: 1,
                timeouts: 0,
                dropped: 0,
            }
        );
        assert_eq!(m.handlers["b"].dropped, 1);
        assert_eq!(m.handlers["b"].invocations, 0);
        assert_eq!(m.last_publish_latency, Duration::from_millis(7));
        assert!(m.last_publish_time.is_some());
    }
}
