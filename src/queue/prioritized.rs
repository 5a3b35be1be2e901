//! # Two-tier priority queue with tick-driven batch draining.
//!
//! ```text
//! enqueue(item) ─► classify(item) ─┬─ true  ─► high   ┐
//!                                  └─ false ─► normal ┘  (len(high)+len(normal) ≤ maxsize)
//!
//! every tick: batch = high[..max_batch] ++ normal[..remaining]
//!             handler(item) sequentially, high before normal
//! ```
//!
//! ## Overflow
//! When the queue is full the **oldest normal** item is evicted; only when
//! `normal` is empty does the oldest high item go instead. Newest arrivals
//! always survive. Every eviction counts as `dropped`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use modvisor::{HandlerError, PrioritizedQueue, QueueConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let queue = Arc::new(PrioritizedQueue::new(
//!     QueueConfig::default(),
//!     |cmd: &String| cmd.starts_with("urgent:"),
//!     |cmd: String| async move {
//!         println!("handling {cmd}");
//!         Ok::<(), HandlerError>(())
//!     },
//! ));
//!
//! queue.enqueue("telemetry: cpu 12%".to_string());
//! queue.enqueue("urgent: stop".to_string());
//! assert_eq!(queue.process_tick().await, 2);
//! assert_eq!(queue.metrics().processed_high, 1);
//! # }
//! ```

use std::borrow::Cow;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::{invoke, item_handler, ItemHandler};
use crate::config::QueueConfig;
use crate::error::{HandlerError, TaskError};
use crate::tasks::{TaskFn, TaskRef};

/// Point-in-time snapshot of queue metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueMetrics {
    pub enqueued: u64,
    /// Items evicted on overflow.
    pub dropped: u64,
    pub processed: u64,
    pub processed_high: u64,
    pub processed_normal: u64,
    /// Items whose handler failed or panicked (still counted as processed).
    pub errors: u64,
    /// Handler time of the most recently processed item.
    pub last_latency: Duration,
    pub last_processed_time: Option<DateTime<Utc>>,
    /// Largest combined depth ever observed.
    pub max_depth: usize,
    pub high_depth: usize,
    pub normal_depth: usize,
}

struct Tiers<T> {
    high: VecDeque<T>,
    normal: VecDeque<T>,
    metrics: QueueMetrics,
}

impl<T> Tiers<T> {
    fn len(&self) -> usize {
        self.high.len() + self.normal.len()
    }
}

/// Bounded two-tier queue; share it as `Arc<PrioritizedQueue<T>>`.
pub struct PrioritizedQueue<T> {
    cfg: QueueConfig,
    classify: Box<dyn Fn(&T) -> bool + Send + Sync>,
    handler: ItemHandler<T>,
    tiers: Mutex<Tiers<T>>,
}

impl<T: Send + 'static> PrioritizedQueue<T> {
    /// `classify` returns `true` for high-priority items.
    pub fn new<C, H, Fut>(cfg: QueueConfig, classify: C, handler: H) -> Self
    where
        C: Fn(&T) -> bool + Send + Sync + 'static,
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self {
            cfg,
            classify: Box::new(classify),
            handler: item_handler(handler),
            tiers: Mutex::new(Tiers {
                high: VecDeque::new(),
                normal: VecDeque::new(),
                metrics: QueueMetrics::default(),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.cfg
    }

    /// Appends `item` to its tier, evicting first if the queue is full. Never rejects.
    pub fn enqueue(&self, item: T) {
        let high = (self.classify)(&item);
        let mut tiers = self.tiers.lock();

        while tiers.len() >= self.cfg.capacity() {
            let evicted_high = if tiers.normal.pop_front().is_some() {
                false
            } else if tiers.high.pop_front().is_some() {
                true
            } else {
                break;
            };
            tiers.metrics.dropped += 1;
            warn!(
                evicted_high,
                capacity = self.cfg.capacity(),
                "queue full; dropped oldest item"
            );
        }

        if high {
            tiers.high.push_back(item);
        } else {
            tiers.normal.push_back(item);
        }
        tiers.metrics.enqueued += 1;
        let depth = tiers.len();
        tiers.metrics.max_depth = tiers.metrics.max_depth.max(depth);
    }

    pub fn len(&self) -> usize {
        self.tiers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> QueueMetrics {
        let tiers = self.tiers.lock();
        QueueMetrics {
            high_depth: tiers.high.len(),
            normal_depth: tiers.normal.len(),
            ..tiers.metrics.clone()
        }
    }

    /// Takes up to `max_batch` items, every available high item before any normal one.
    fn dequeue_batch(&self) -> Vec<(T, bool)> {
        let max = self.cfg.batch();
        let mut tiers = self.tiers.lock();
        let mut batch = Vec::with_capacity(max.min(tiers.len()));

        while batch.len() < max {
            match tiers.high.pop_front() {
                Some(item) => batch.push((item, true)),
                None => break,
            }
        }
        while batch.len() < max {
            match tiers.normal.pop_front() {
                Some(item) => batch.push((item, false)),
                None => break,
            }
        }
        batch
    }

    /// Drains and handles one batch without sleeping. Returns how many items were handled.
    pub async fn process_tick(&self) -> usize {
        let batch = self.dequeue_batch();
        let count = batch.len();

        for (item, high) in batch {
            let started = Instant::now();
            let res = invoke(&self.handler, item).await;
            let latency = started.elapsed();

            let mut tiers = self.tiers.lock();
            let m = &mut tiers.metrics;
            m.processed += 1;
            if high {
                m.processed_high += 1;
            } else {
                m.processed_normal += 1;
            }
            m.last_latency = latency;
            m.last_processed_time = Some(Utc::now());
            if let Err(e) = res {
                m.errors += 1;
                drop(tiers);
                error!(label = e.as_label(), error = %e, high, "queue handler failed");
            }
        }
        count
    }

    /// Processes one batch per `tick_seconds` until `ctx` is cancelled.
    ///
    /// The tick sleep follows every batch, empty or not, so a burst can never
    /// hold the loop for more than `max_batch` items.
    pub async fn run(&self, ctx: CancellationToken) {
        while !ctx.is_cancelled() {
            self.process_tick().await;
            tokio::select! {
                _ = time::sleep(self.cfg.tick_seconds) => {}
                _ = ctx.cancelled() => break,
            }
        }
    }

    /// Wraps [`run`](Self::run) as a schedulable task.
    pub fn into_task(self: Arc<Self>, name: impl Into<Cow<'static, str>>) -> TaskRef {
        TaskFn::arc(name, move |ctx: CancellationToken| {
            let queue = Arc::clone(&self);
            async move {
                queue.run(ctx).await;
                Ok::<(), TaskError>(())
            }
        })
    }
}
