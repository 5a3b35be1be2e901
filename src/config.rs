//! # Runtime configuration.
//!
//! Provides centralized settings for the three runtime components:
//! - [`BusConfig`] for the [`EventBus`](crate::EventBus),
//! - [`SchedulerConfig`] for the [`Scheduler`](crate::Scheduler),
//! - [`QueueConfig`] for the [`PrioritizedQueue`](crate::PrioritizedQueue),
//!
//! and [`RuntimeConfig`] bundling the first two for [`Runtime`](crate::Runtime).
//!
//! ## Sentinel values
//! - `handler_timeout = 0s` → no per-handler deadline
//! - `shutdown_grace = 0s` → shutdown waits for every task indefinitely
//! - capacities of `0` are clamped to `1` by the accessors

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the event bus.
///
/// ## Field semantics
/// - `max_history`: capacity of the replay/history ring (min 1)
/// - `max_in_flight`: concurrently executing handler invocations across the bus (min 1)
/// - `backpressure_timeout`: how long one delivery attempt may wait for an in-flight slot
/// - `handler_timeout`: per-invocation deadline (`0s` = none)
/// - `per_handler_metrics`: track lag/error/timeout counters per handler name
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Number of most recent events retained for replay and context lookups.
    pub max_history: usize,

    /// Maximum number of handler invocations running at the same time.
    pub max_in_flight: usize,

    /// Deadline for acquiring an in-flight slot before the delivery is dropped.
    pub backpressure_timeout: Duration,

    /// Deadline for a single handler invocation.
    ///
    /// On expiry the bus stops waiting and counts a timeout; the handler keeps running.
    pub handler_timeout: Duration,

    /// Enables per-handler attribution in [`BusMetrics`](crate::BusMetrics).
    pub per_handler_metrics: bool,
}

impl BusConfig {
    /// History capacity clamped to a minimum of 1.
    #[inline]
    pub fn history_capacity(&self) -> usize {
        self.max_history.max(1)
    }

    /// In-flight limit clamped to a minimum of 1.
    #[inline]
    pub fn in_flight_limit(&self) -> usize {
        self.max_in_flight.max(1)
    }

    /// Returns the handler deadline as an `Option`.
    ///
    /// - `None` → wait for each handler until it returns
    /// - `Some(d)` → race each invocation against `d`
    #[inline]
    pub fn handler_deadline(&self) -> Option<Duration> {
        if self.handler_timeout == Duration::ZERO {
            None
        } else {
            Some(self.handler_timeout)
        }
    }
}

impl Default for BusConfig {
    /// Default configuration:
    ///
    /// - `max_history = 500`
    /// - `max_in_flight = 64`
    /// - `backpressure_timeout = 250ms`
    /// - `handler_timeout = 0s` (no deadline)
    /// - `per_handler_metrics = false`
    fn default() -> Self {
        Self {
            max_history: 500,
            max_in_flight: 64,
            backpressure_timeout: Duration::from_millis(250),
            handler_timeout: Duration::ZERO,
            per_handler_metrics: false,
        }
    }
}

/// Configuration for the supervised scheduler.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Ceiling for the summed `power_cost` of running tasks.
    pub power_budget: f64,

    /// System load above which each run attempt is delayed by `throttle_seconds`.
    pub load_threshold: f64,

    /// Delay applied before a run attempt while load exceeds `load_threshold`.
    pub throttle_seconds: Duration,

    /// Period of the heartbeat refreshing `last_heartbeat` of running tasks.
    pub heartbeat_interval: Duration,

    /// Maximum wait per task during shutdown before its join handle is aborted.
    pub shutdown_grace: Duration,
}

impl SchedulerConfig {
    /// Heartbeat period clamped to at least 1ms (a zero period would spin).
    #[inline]
    pub fn heartbeat_period(&self) -> Duration {
        self.heartbeat_interval.max(Duration::from_millis(1))
    }

    /// Returns the shutdown grace as an `Option` (`None` = wait forever).
    #[inline]
    pub fn grace(&self) -> Option<Duration> {
        if self.shutdown_grace == Duration::ZERO {
            None
        } else {
            Some(self.shutdown_grace)
        }
    }
}

impl Default for SchedulerConfig {
    /// Default configuration:
    ///
    /// - `power_budget = 1.0`
    /// - `load_threshold = 0.85`
    /// - `throttle_seconds = 500ms`
    /// - `heartbeat_interval = 5s`
    /// - `shutdown_grace = 10s`
    fn default() -> Self {
        Self {
            power_budget: 1.0,
            load_threshold: 0.85,
            throttle_seconds: Duration::from_millis(500),
            heartbeat_interval: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Configuration for a [`PrioritizedQueue`](crate::PrioritizedQueue).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Combined capacity of both tiers.
    pub maxsize: usize,
    /// Maximum items drained per tick.
    pub max_batch: usize,
    /// Period between ticks.
    pub tick_seconds: Duration,
}

impl QueueConfig {
    /// Capacity clamped to a minimum of 1.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.maxsize.max(1)
    }

    /// Batch size clamped to a minimum of 1.
    #[inline]
    pub fn batch(&self) -> usize {
        self.max_batch.max(1)
    }
}

impl Default for QueueConfig {
    /// Default configuration: `maxsize = 200`, `max_batch = 8`, `tick_seconds = 1ms`.
    fn default() -> Self {
        Self {
            maxsize: 200,
            max_batch: 8,
            tick_seconds: Duration::from_millis(1),
        }
    }
}

/// Bundle of bus and scheduler settings used by [`Runtime::new`](crate::Runtime::new).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Event bus settings.
    pub bus: BusConfig,
    /// Scheduler settings.
    pub scheduler: SchedulerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacities_are_clamped() {
        let bus = BusConfig {
            max_history: 0,
            max_in_flight: 0,
            ..BusConfig::default()
        };
        assert_eq!(bus.history_capacity(), 1);
        assert_eq!(bus.in_flight_limit(), 1);

        let queue = QueueConfig {
            maxsize: 0,
            max_batch: 0,
            ..QueueConfig::default()
        };
        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.batch(), 1);
    }

    #[test]
    fn zero_durations_disable_deadlines() {
        assert_eq!(BusConfig::default().handler_deadline(), None);
        let bus = BusConfig {
            handler_timeout: Duration::from_millis(30),
            ..BusConfig::default()
        };
        assert_eq!(bus.handler_deadline(), Some(Duration::from_millis(30)));

        let sched = SchedulerConfig {
            shutdown_grace: Duration::ZERO,
            heartbeat_interval: Duration::ZERO,
            ..SchedulerConfig::default()
        };
        assert_eq!(sched.grace(), None);
        assert_eq!(sched.heartbeat_period(), Duration::from_millis(1));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: RuntimeConfig =
            serde_json::from_str(r#"{"bus": {"max_history": 3}, "scheduler": {"power_budget": 2.5}}"#)
                .unwrap();
        assert_eq!(cfg.bus.max_history, 3);
        assert_eq!(cfg.bus.max_in_flight, 64);
        assert_eq!(cfg.scheduler.power_budget, 2.5);
        assert_eq!(cfg.scheduler.heartbeat_interval, Duration::from_secs(5));
    }
}
