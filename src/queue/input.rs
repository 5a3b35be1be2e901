//! # Single-tier input queue with a background worker.
//!
//! Producers call [`InputQueue::enqueue`] from anywhere (it is synchronous);
//! one worker spawned by [`InputQueue::start`] wakes on every arrival and
//! hands up to `max_batch` items at a time to the handler, in FIFO order.
//! A full queue drops its oldest item to make room.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{invoke, item_handler, ItemHandler};
use crate::error::HandlerError;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InputQueueMetrics {
    pub enqueued: u64,
    pub dropped: u64,
    pub processed: u64,
    pub errors: u64,
    pub last_latency: Duration,
    pub last_processed_time: Option<DateTime<Utc>>,
    pub max_depth: usize,
    pub depth: usize,
}

struct Inner<T> {
    maxsize: usize,
    max_batch: usize,
    handler: ItemHandler<T>,
    items: Mutex<VecDeque<T>>,
    metrics: Mutex<InputQueueMetrics>,
    wake: Notify,
}

impl<T: Send + 'static> Inner<T> {
    fn take_batch(&self) -> Vec<T> {
        let mut items = self.items.lock();
        let n = self.max_batch.min(items.len());
        items.drain(..n).collect()
    }

    /// Puts an unprocessed batch back at the front, oldest first, then restores
    /// the capacity bound by dropping the oldest items.
    fn requeue(&self, rest: VecDeque<T>) {
        let overflow = {
            let mut items = self.items.lock();
            for item in rest.into_iter().rev() {
                items.push_front(item);
            }
            let overflow = items.len().saturating_sub(self.maxsize);
            items.drain(..overflow);
            overflow
        };
        if overflow > 0 {
            self.metrics.lock().dropped += overflow as u64;
            warn!(overflow, capacity = self.maxsize, "input queue full after requeue; dropped oldest items");
        }
    }

    async fn work(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let mut batch: VecDeque<T> = self.take_batch().into();
            if batch.is_empty() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    _ = self.wake.notified() => continue,
                }
            }

            while let Some(item) = batch.pop_front() {
                if cancel.is_cancelled() {
                    batch.push_front(item);
                    self.requeue(batch);
                    return;
                }
                let started = Instant::now();
                let res = invoke(&self.handler, item).await;

                let mut m = self.metrics.lock();
                m.processed += 1;
                m.last_latency = started.elapsed();
                m.last_processed_time = Some(Utc::now());
                if let Err(e) = res {
                    m.errors += 1;
                    drop(m);
                    error!(label = e.as_label(), error = %e, "input handler failed");
                }
            }
        }
    }
}

struct Worker {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Bounded FIFO drained by one background worker.
pub struct InputQueue<T> {
    inner: Arc<Inner<T>>,
    worker: Mutex<Option<Worker>>,
}

impl<T: Send + 'static> InputQueue<T> {
    /// `maxsize` and `max_batch` are clamped to at least 1.
    pub fn new<H, Fut>(maxsize: usize, max_batch: usize, handler: H) -> Self
    where
        H: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                maxsize: maxsize.max(1),
                max_batch: max_batch.max(1),
                handler: item_handler(handler),
                items: Mutex::new(VecDeque::new()),
                metrics: Mutex::new(InputQueueMetrics::default()),
                wake: Notify::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Appends `item`, dropping the oldest queued item if full. Never rejects.
    pub fn enqueue(&self, item: T) {
        let (dropped, depth) = {
            let mut items = self.inner.items.lock();
            let dropped = if items.len() >= self.inner.maxsize {
                items.pop_front().is_some()
            } else {
                false
            };
            items.push_back(item);
            (dropped, items.len())
        };

        {
            let mut m = self.inner.metrics.lock();
            m.enqueued += 1;
            m.max_depth = m.max_depth.max(depth);
            if dropped {
                m.dropped += 1;
            }
        }
        if dropped {
            warn!(capacity = self.inner.maxsize, "input queue full; dropped oldest item");
        }
        self.inner.wake.notify_one();
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawns the worker; no-op while one is already running.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.join.is_finished()) {
            return;
        }
        let cancel = CancellationToken::new();
        let join = tokio::spawn(Arc::clone(&self.inner).work(cancel.clone()));
        *worker = Some(Worker { cancel, join });
        debug!("input queue worker started");
    }

    /// Cancels the worker and waits for it.
    ///
    /// The item being handled finishes; the rest of its batch goes back to the
    /// front of the queue.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        worker.cancel.cancel();
        if let Err(e) = worker.join.await {
            warn!(error = %e, "input queue worker ended abnormally");
        }
        debug!("input queue worker stopped");
    }

    pub fn metrics(&self) -> InputQueueMetrics {
        let depth = self.len();
        InputQueueMetrics {
            depth,
            ..self.inner.metrics.lock().clone()
        }
    }
}
