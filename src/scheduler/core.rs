//! # Scheduler: admission control and supervision of long-running tasks.
//!
//! The scheduler owns one table of per-name records. Each admitted name gets a
//! [`TaskActor`] running on its own tokio task with a child of the scheduler's
//! root [`CancellationToken`].
//!
//! ```text
//! schedule(spec) ──► table.lock()
//!                      ├─ used + cost > budget ─► pending (warn)
//!                      └─ otherwise ─► charge, running, spawn TaskActor
//!
//! TaskActor ──► finish(attempt) ──► release power (exactly once)
//!                 ├─ Completed ─► completed
//!                 ├─ Cancelled ─► cancelled
//!                 └─ Failed    ─► failed ─► restart? ─► readmit (same budget check)
//!
//! shutdown() ──► cancel root ─► epoch += 1 ─► drain table ─► join (grace, then abort)
//! ```
//!
//! ## Rules
//! - `power_used` only ever holds the cost of names whose record is charged;
//!   every charge is released exactly once, by `finish` or by `shutdown`.
//! - Work from a previous epoch (an actor still unwinding after `shutdown`)
//!   never touches the table again.
//! - Pending names are not rescanned automatically; see [`Scheduler::readmit_pending`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::actor::TaskActor;
use super::load::{LoadSource, SystemLoad};
use super::runner::Attempt;
use super::state::{HealthSnapshot, TaskState, TaskStatus};
use crate::config::SchedulerConfig;
use crate::tasks::TaskSpec;

/// Tolerance for float accumulation in the power budget.
const POWER_EPSILON: f64 = 1e-9;

/// Handle to a live actor.
struct RunHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

struct Entry {
    spec: TaskSpec,
    state: TaskState,
    /// Present while an actor for this name is alive (running or backing off).
    run: Option<RunHandle>,
    /// Whether `spec.power_cost` is currently counted in `power_used`.
    charged: bool,
}

impl Entry {
    fn new(spec: TaskSpec) -> Self {
        Self {
            spec,
            state: TaskState::pending(),
            run: None,
            charged: false,
        }
    }

    fn release(&mut self, power_used: &mut f64) {
        if self.charged {
            *power_used = (*power_used - self.spec.power_cost()).max(0.0);
            self.charged = false;
        }
    }
}

struct Table {
    entries: HashMap<String, Entry>,
    power_used: f64,
    root: CancellationToken,
    epoch: u64,
}

/// What the actor does after an attempt.
pub(super) enum Next {
    Stop,
    Restart { delay: Duration },
}

/// State shared between the [`Scheduler`] handle and its actors.
pub(super) struct Shared {
    pub cfg: SchedulerConfig,
    pub source: Arc<dyn LoadSource>,
    table: Mutex<Table>,
}

impl Shared {
    fn fits(&self, power_used: f64, cost: f64) -> bool {
        power_used + cost <= self.cfg.power_budget + POWER_EPSILON
    }

    /// Tries to start `name`. Caller holds the table lock.
    fn admit_locked(self: &Arc<Self>, table: &mut Table, name: &str) -> bool {
        let Table {
            entries,
            power_used,
            root,
            epoch,
        } = table;
        let Some(entry) = entries.get_mut(name) else {
            return false;
        };

        let cost = entry.spec.power_cost();
        if !self.fits(*power_used, cost) {
            entry.state.status = TaskStatus::Pending;
            warn!(
                task = name,
                cost,
                used = *power_used,
                budget = self.cfg.power_budget,
                "power budget exhausted; task left pending"
            );
            return false;
        }

        *power_used += cost;
        entry.charged = true;
        entry.state.status = TaskStatus::Running;
        entry.state.last_heartbeat = Utc::now();

        let cancel = root.child_token();
        let actor = TaskActor::new(Arc::clone(self), entry.spec.clone(), cancel.clone(), *epoch);
        let join = tokio::spawn(actor.run());
        entry.run = Some(RunHandle { cancel, join });

        info!(task = name, cost, used = *power_used, "task admitted");
        true
    }

    pub async fn heartbeat(&self, name: &str, epoch: u64) {
        let mut table = self.table.lock().await;
        if table.epoch != epoch {
            return;
        }
        if let Some(entry) = table.entries.get_mut(name) {
            if entry.state.status == TaskStatus::Running {
                entry.state.last_heartbeat = Utc::now();
            }
        }
    }

    /// Records the outcome of one attempt and releases its power.
    pub async fn finish(&self, spec: &TaskSpec, attempt: Attempt, epoch: u64) -> Next {
        let mut table = self.table.lock().await;
        if table.epoch != epoch {
            return Next::Stop;
        }
        let Table {
            entries,
            power_used,
            ..
        } = &mut *table;
        let Some(entry) = entries.get_mut(spec.name()) else {
            return Next::Stop;
        };
        entry.release(power_used);

        match attempt {
            Attempt::Completed => {
                entry.state.status = TaskStatus::Completed;
                entry.run = None;
                info!(task = spec.name(), "task completed");
                Next::Stop
            }
            Attempt::Cancelled => {
                entry.state.status = TaskStatus::Cancelled;
                entry.run = None;
                info!(task = spec.name(), "task cancelled");
                Next::Stop
            }
            Attempt::Failed(err) => {
                entry.state.status = TaskStatus::Failed;
                entry.state.last_error = Some(err.to_string());
                error!(
                    task = spec.name(),
                    label = err.as_label(),
                    error = %err,
                    restarts = entry.state.restarts,
                    "task failed"
                );

                let restartable = err.is_retryable() && spec.restart();
                if restartable && entry.state.restarts < spec.max_restarts() {
                    let delay = spec.backoff().next(entry.state.restarts);
                    entry.state.restarts += 1;
                    debug!(
                        task = spec.name(),
                        restart = entry.state.restarts,
                        ?delay,
                        "restart scheduled"
                    );
                    Next::Restart { delay }
                } else {
                    entry.run = None;
                    if restartable {
                        warn!(
                            task = spec.name(),
                            max_restarts = spec.max_restarts(),
                            "restart limit reached; task stays failed"
                        );
                    }
                    Next::Stop
                }
            }
        }
    }

    /// Restart-path admission for an actor that is still alive.
    pub async fn readmit(&self, spec: &TaskSpec, token: &CancellationToken, epoch: u64) -> bool {
        let mut table = self.table.lock().await;
        if table.epoch != epoch {
            return false;
        }
        let Table {
            entries,
            power_used,
            ..
        } = &mut *table;
        let Some(entry) = entries.get_mut(spec.name()) else {
            return false;
        };

        if token.is_cancelled() {
            entry.state.status = TaskStatus::Cancelled;
            entry.run = None;
            return false;
        }

        let cost = spec.power_cost();
        if !self.fits(*power_used, cost) {
            entry.state.status = TaskStatus::Pending;
            entry.run = None;
            warn!(
                task = spec.name(),
                cost,
                used = *power_used,
                budget = self.cfg.power_budget,
                "power budget exhausted; restart deferred"
            );
            return false;
        }

        *power_used += cost;
        entry.charged = true;
        entry.state.status = TaskStatus::Running;
        entry.state.last_heartbeat = Utc::now();
        true
    }
}

/// # Supervisor of long-running module loops.
///
/// Cheap to clone; all clones drive the same table.
///
/// # Example
/// ```rust
/// use tokio_util::sync::CancellationToken;
/// use modvisor::{Scheduler, SchedulerConfig, TaskError, TaskFn, TaskSpec, TaskStatus};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let scheduler = Scheduler::new(SchedulerConfig::default());
/// let sensor = TaskFn::arc("sensor.audio", |ctx: CancellationToken| async move {
///     ctx.cancelled().await;
///     Ok::<(), TaskError>(())
/// });
///
/// scheduler.schedule(TaskSpec::new(sensor).with_power_cost(0.2)).await;
/// let health = scheduler.health_snapshot().await;
/// assert!(health.get("sensor.audio").is_some());
///
/// scheduler.shutdown().await;
/// assert!(scheduler.health_snapshot().await.tasks.is_empty());
/// # }
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Shared>,
}

impl Scheduler {
    /// Creates a scheduler that throttles on the host's load average.
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self::with_load_source(cfg, Arc::new(SystemLoad))
    }

    pub fn with_load_source(cfg: SchedulerConfig, source: Arc<dyn LoadSource>) -> Self {
        Self {
            inner: Arc::new(Shared {
                cfg,
                source,
                table: Mutex::new(Table {
                    entries: HashMap::new(),
                    power_used: 0.0,
                    root: CancellationToken::new(),
                    epoch: 0,
                }),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.cfg
    }

    /// Registers `spec` and tries to admit it right away.
    ///
    /// A name whose actor is still alive is left untouched. A pending name keeps
    /// its record; a terminal one starts over with a fresh record.
    pub async fn schedule(&self, spec: TaskSpec) {
        let name = spec.name().to_string();
        let mut table = self.inner.table.lock().await;

        let existing = table
            .entries
            .get(&name)
            .map(|e| (e.run.is_some(), e.state.status));
        match existing {
            Some((true, status)) => {
                warn!(task = %name, %status, "task already supervised; schedule ignored");
                return;
            }
            Some((false, TaskStatus::Pending)) => {
                if let Some(entry) = table.entries.get_mut(&name) {
                    entry.spec = spec;
                }
            }
            _ => {
                table.entries.insert(name.clone(), Entry::new(spec));
            }
        }

        self.inner.admit_locked(&mut table, &name);
    }

    /// Schedules every spec in ascending priority; equal priorities keep their order.
    pub async fn schedule_all(&self, specs: impl IntoIterator<Item = TaskSpec>) {
        let mut specs: Vec<TaskSpec> = specs.into_iter().collect();
        specs.sort_by_key(|s| s.priority());
        for spec in specs {
            self.schedule(spec).await;
        }
    }

    /// Cooperatively cancels one name.
    ///
    /// Returns `false` if the name is unknown or already terminal. A pending name
    /// becomes `cancelled` immediately; a live one once its actor unwinds.
    pub async fn cancel(&self, name: &str) -> bool {
        let mut table = self.inner.table.lock().await;
        let Some(entry) = table.entries.get_mut(name) else {
            return false;
        };

        if let Some(run) = &entry.run {
            run.cancel.cancel();
            debug!(task = name, "cancellation requested");
            return true;
        }
        if entry.state.status == TaskStatus::Pending {
            entry.state.status = TaskStatus::Cancelled;
            return true;
        }
        false
    }

    /// Re-runs admission for every pending name, lowest priority value first
    /// (ties by name). Returns the names that were admitted.
    pub async fn readmit_pending(&self) -> Vec<String> {
        let mut table = self.inner.table.lock().await;

        let mut pending: Vec<(i32, String)> = table
            .entries
            .iter()
            .filter(|(_, e)| e.state.status == TaskStatus::Pending && e.run.is_none())
            .map(|(name, e)| (e.spec.priority(), name.clone()))
            .collect();
        pending.sort();

        pending
            .into_iter()
            .filter(|(_, name)| self.inner.admit_locked(&mut table, name))
            .map(|(_, name)| name)
            .collect()
    }

    pub async fn power_used(&self) -> f64 {
        self.inner.table.lock().await.power_used
    }

    pub async fn health_snapshot(&self) -> HealthSnapshot {
        let table = self.inner.table.lock().await;
        let tasks: BTreeMap<_, _> = table
            .entries
            .iter()
            .map(|(name, e)| (name.clone(), e.state.health()))
            .collect();
        HealthSnapshot {
            tasks,
            power_used: table.power_used,
            power_budget: self.inner.cfg.power_budget,
        }
    }

    /// Cancels every live task, waits for them and clears all state.
    ///
    /// Each task gets `shutdown_grace` to unwind before its actor is aborted.
    /// Safe to call repeatedly; the scheduler accepts new work afterwards.
    pub async fn shutdown(&self) {
        let live: Vec<(String, RunHandle)> = {
            let mut table = self.inner.table.lock().await;
            table.root.cancel();
            table.root = CancellationToken::new();
            table.epoch += 1;
            table.power_used = 0.0;
            table
                .entries
                .drain()
                .filter_map(|(name, e)| e.run.map(|run| (name, run)))
                .collect()
        };

        if live.is_empty() {
            return;
        }
        info!(tasks = live.len(), "shutting down scheduler");

        let grace = self.inner.cfg.grace();
        join_all(live.into_iter().map(|(name, run)| async move {
            let mut join = run.join;
            match grace {
                Some(grace) => {
                    if time::timeout(grace, &mut join).await.is_err() {
                        join.abort();
                        warn!(task = %name, ?grace, "task ignored cancellation; aborted");
                    }
                }
                None => {
                    if let Err(e) = join.await {
                        debug!(task = %name, error = %e, "actor join failed");
                    }
                }
            }
        }))
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::policies::{BackoffPolicy, JitterPolicy};
    use crate::scheduler::{StaticLoad, TaskHealth};
    use crate::tasks::{TaskFn, TaskRef};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn cfg() -> SchedulerConfig {
        SchedulerConfig {
            heartbeat_interval: Duration::from_millis(10),
            shutdown_grace: Duration::from_secs(1),
            ..SchedulerConfig::default()
        }
    }

    fn scheduler(cfg: SchedulerConfig) -> Scheduler {
        Scheduler::with_load_source(cfg, Arc::new(StaticLoad::new(0.0)))
    }

    fn forever(name: &'static str) -> TaskRef {
        TaskFn::arc(name, |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err::<(), _>(TaskError::Canceled)
        })
    }

    fn counting_failure(name: &'static str, runs: Arc<AtomicU32>) -> TaskRef {
        TaskFn::arc(name, move |_ctx: CancellationToken| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TaskError::fail("sensor offline"))
            }
        })
    }

    async fn wait_for(
        sched: &Scheduler,
        name: &str,
        pred: impl Fn(&TaskHealth) -> bool,
    ) -> TaskHealth {
        for _ in 0..300 {
            if let Some(h) = sched.health_snapshot().await.get(name) {
                if pred(h) {
                    return h.clone();
                }
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition on {name} not reached: {:?}", sched.health_snapshot().await);
    }

    #[tokio::test]
    async fn second_task_over_budget_stays_pending() {
        let sched = scheduler(cfg());
        sched
            .schedule(TaskSpec::new(forever("a")).with_power_cost(0.6))
            .await;
        sched
            .schedule(TaskSpec::new(forever("b")).with_power_cost(0.6))
            .await;

        let snap = sched.health_snapshot().await;
        assert_eq!(snap.get("a").map(|h| h.status), Some(TaskStatus::Running));
        assert_eq!(snap.get("b").map(|h| h.status), Some(TaskStatus::Pending));
        assert!((snap.power_used - 0.6).abs() < 1e-9);

        sched.shutdown().await;
    }

    #[tokio::test]
    async fn restarts_are_bounded() {
        let sched = scheduler(cfg());
        let runs = Arc::new(AtomicU32::new(0));
        sched
            .schedule(
                TaskSpec::new(counting_failure("flaky", runs.clone()))
                    .with_power_cost(0.3)
                    .with_max_restarts(2),
            )
            .await;

        let h = wait_for(&sched, "flaky", |h| {
            h.status == TaskStatus::Failed && h.restarts == 2
        })
        .await;
        assert!(h.last_error.as_deref().is_some_and(|e| e.contains("sensor offline")));

        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        let snap = sched.health_snapshot().await;
        assert_eq!(snap.get("flaky").map(|h| (h.status, h.restarts)), Some((TaskStatus::Failed, 2)));
        assert_eq!(snap.power_used, 0.0);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_scheduler_is_reusable() {
        let sched = scheduler(cfg());
        sched.shutdown().await;

        sched
            .schedule(TaskSpec::new(forever("a")).with_power_cost(0.5))
            .await;
        sched.shutdown().await;
        sched.shutdown().await;

        let snap = sched.health_snapshot().await;
        assert!(snap.tasks.is_empty());
        assert_eq!(snap.power_used, 0.0);

        sched
            .schedule(TaskSpec::new(forever("a")).with_power_cost(0.5))
            .await;
        wait_for(&sched, "a", |h| h.status == TaskStatus::Running).await;
        sched.shutdown().await;
        assert_eq!(sched.power_used().await, 0.0);
    }

    #[tokio::test]
    async fn fatal_error_is_never_restarted() {
        let sched = scheduler(cfg());
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let task = TaskFn::arc("broken", move |_ctx: CancellationToken| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TaskError::fatal("bad calibration"))
            }
        });
        sched.schedule(TaskSpec::new(task)).await;

        let h = wait_for(&sched, "broken", |h| h.status == TaskStatus::Failed).await;
        time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.restarts, 0);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(h.last_error.unwrap_or_default().contains("fatal"));
    }

    #[tokio::test]
    async fn normal_return_completes_and_releases_power() {
        let sched = scheduler(cfg());
        let task = TaskFn::arc("oneshot", |_ctx: CancellationToken| async {
            Ok::<(), TaskError>(())
        });
        sched
            .schedule(TaskSpec::new(task).with_power_cost(0.4))
            .await;

        wait_for(&sched, "oneshot", |h| h.status == TaskStatus::Completed).await;
        assert_eq!(sched.power_used().await, 0.0);
    }

    #[tokio::test]
    async fn cancel_stops_one_task() {
        let sched = scheduler(cfg());
        sched
            .schedule(TaskSpec::new(forever("a")).with_power_cost(0.3))
            .await;
        sched
            .schedule(TaskSpec::new(forever("b")).with_power_cost(0.3))
            .await;

        assert!(sched.cancel("a").await);
        assert!(!sched.cancel("missing").await);

        wait_for(&sched, "a", |h| h.status == TaskStatus::Cancelled).await;
        let snap = sched.health_snapshot().await;
        assert_eq!(snap.get("b").map(|h| h.status), Some(TaskStatus::Running));
        assert!((snap.power_used - 0.3).abs() < 1e-9);
        assert!(!sched.cancel("a").await);

        sched.shutdown().await;
    }

    #[tokio::test]
    async fn readmit_pending_uses_freed_budget() {
        let sched = scheduler(cfg());
        sched
            .schedule(TaskSpec::new(forever("a")).with_power_cost(0.6))
            .await;
        sched
            .schedule(TaskSpec::new(forever("b")).with_power_cost(0.6))
            .await;
        assert!(sched.readmit_pending().await.is_empty());

        sched.cancel("a").await;
        wait_for(&sched, "a", |h| h.status == TaskStatus::Cancelled).await;

        assert_eq!(sched.readmit_pending().await, vec!["b".to_string()]);
        let snap = sched.health_snapshot().await;
        assert_eq!(snap.get("b").map(|h| h.status), Some(TaskStatus::Running));

        sched.shutdown().await;
    }

    #[tokio::test]
    async fn schedule_all_admits_by_priority() {
        let sched = scheduler(cfg());
        sched
            .schedule_all(vec![
                TaskSpec::new(forever("telemetry"))
                    .with_priority(5)
                    .with_power_cost(0.6),
                TaskSpec::new(forever("safety"))
                    .with_priority(1)
                    .with_power_cost(0.6),
            ])
            .await;

        let snap = sched.health_snapshot().await;
        assert_eq!(snap.with_status(TaskStatus::Running), vec!["safety"]);
        assert_eq!(snap.with_status(TaskStatus::Pending), vec!["telemetry"]);

        sched.shutdown().await;
    }

    #[tokio::test]
    async fn heartbeat_advances_while_running() {
        let sched = scheduler(cfg());
        sched.schedule(TaskSpec::new(forever("loop"))).await;

        let first = wait_for(&sched, "loop", |h| h.status == TaskStatus::Running)
            .await
            .last_heartbeat;
        time::sleep(Duration::from_millis(80)).await;
        let later = sched.health_snapshot().await.get("loop").map(|h| h.last_heartbeat);
        assert!(later.is_some_and(|t| t > first));

        sched.shutdown().await;
    }

    #[tokio::test]
    async fn high_load_delays_the_run() {
        let source = Arc::new(StaticLoad::new(2.0));
        let sched = Scheduler::with_load_source(
            SchedulerConfig {
                throttle_seconds: Duration::from_millis(150),
                ..cfg()
            },
            source,
        );
        let started = Arc::new(parking_lot::Mutex::new(None));
        let slot = started.clone();
        let task = TaskFn::arc("late", move |_ctx: CancellationToken| {
            let slot = slot.clone();
            async move {
                *slot.lock() = Some(Instant::now());
                Ok::<(), TaskError>(())
            }
        });

        let scheduled = Instant::now();
        sched.schedule(TaskSpec::new(task)).await;
        wait_for(&sched, "late", |h| h.status == TaskStatus::Completed).await;

        let ran_at = started.lock().take();
        assert!(ran_at.is_some_and(|t| t.duration_since(scheduled) >= Duration::from_millis(150)));
    }

    #[tokio::test]
    async fn restart_without_budget_goes_pending() {
        let sched = scheduler(cfg());
        let runs = Arc::new(AtomicU32::new(0));
        let backoff = BackoffPolicy {
            first: Duration::from_millis(200),
            max: Duration::from_millis(200),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        sched
            .schedule(
                TaskSpec::new(counting_failure("flaky", runs.clone()))
                    .with_power_cost(0.5)
                    .with_backoff(backoff),
            )
            .await;
        sched
            .schedule(TaskSpec::new(forever("steady")).with_power_cost(0.5))
            .await;

        wait_for(&sched, "flaky", |h| h.status == TaskStatus::Failed).await;
        sched
            .schedule(TaskSpec::new(forever("late")).with_power_cost(0.5))
            .await;

        let h = wait_for(&sched, "flaky", |h| h.status == TaskStatus::Pending).await;
        assert_eq!(h.restarts, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!((sched.power_used().await - 1.0).abs() < 1e-9);

        sched.shutdown().await;
    }

    #[tokio::test]
    async fn panicking_task_is_marked_failed() {
        let sched = scheduler(cfg());
        let task = TaskFn::arc("crashy", |_ctx: CancellationToken| async {
            if true {
                panic!("gyro exploded");
            }
            Ok::<(), TaskError>(())
        });
        sched
            .schedule(TaskSpec::new(task).with_restart(false).with_power_cost(0.2))
            .await;

        let h = wait_for(&sched, "crashy", |h| h.status == TaskStatus::Failed).await;
        assert!(h.last_error.unwrap_or_default().contains("gyro exploded"));
        assert_eq!(sched.power_used().await, 0.0);
    }

    #[tokio::test]
    async fn stuck_task_is_aborted_after_grace() {
        let sched = scheduler(SchedulerConfig {
            shutdown_grace: Duration::from_millis(50),
            ..cfg()
        });
        let task = TaskFn::arc("stubborn", |_ctx: CancellationToken| async {
            time::sleep(Duration::from_secs(3600)).await;
            Ok::<(), TaskError>(())
        });
        sched.schedule(TaskSpec::new(task)).await;
        wait_for(&sched, "stubborn", |h| h.status == TaskStatus::Running).await;

        let started = Instant::now();
        sched.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(sched.health_snapshot().await.tasks.is_empty());
    }

    #[tokio::test]
    async fn cancel_during_restart_backoff_releases_power() {
        let sched = scheduler(cfg());
        let runs = Arc::new(AtomicU32::new(0));
        let backoff = BackoffPolicy {
            first: Duration::from_millis(200),
            max: Duration::from_millis(200),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        sched
            .schedule(
                TaskSpec::new(counting_failure("flaky", runs.clone()))
                    .with_power_cost(0.4)
                    .with_backoff(backoff),
            )
            .await;

        wait_for(&sched, "flaky", |h| h.status == TaskStatus::Failed).await;
        assert!(sched.cancel("flaky").await);

        let h = wait_for(&sched, "flaky", |h| h.status == TaskStatus::Cancelled).await;
        assert_eq!(h.restarts, 1);
        assert_eq!(sched.power_used().await, 0.0);

        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(
            sched.health_snapshot().await.get("flaky").map(|h| h.status),
            Some(TaskStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn cancelled_pending_name_is_not_readmitted() {
        let sched = scheduler(cfg());
        sched
            .schedule(TaskSpec::new(forever("a")).with_power_cost(0.6))
            .await;
        sched
            .schedule(TaskSpec::new(forever("b")).with_power_cost(0.6))
            .await;

        assert!(sched.cancel("b").await);
        assert!(!sched.cancel("b").await);
        assert_eq!(
            sched.health_snapshot().await.get("b").map(|h| h.status),
            Some(TaskStatus::Cancelled)
        );

        sched.cancel("a").await;
        wait_for(&sched, "a", |h| h.status == TaskStatus::Cancelled).await;

        assert!(sched.readmit_pending().await.is_empty());
        let snap = sched.health_snapshot().await;
        assert_eq!(snap.get("b").map(|h| h.status), Some(TaskStatus::Cancelled));
        assert_eq!(snap.power_used, 0.0);
    }

    #[tokio::test]
    async fn readmit_respects_a_fired_token_and_the_budget() {
        let sched = scheduler(cfg());
        sched
            .schedule(TaskSpec::new(forever("big")).with_power_cost(0.8))
            .await;
        let b = TaskSpec::new(forever("b")).with_power_cost(0.5);
        let c = TaskSpec::new(forever("c")).with_power_cost(0.5);
        sched.schedule(b.clone()).await;
        sched.schedule(c.clone()).await;
        let epoch = sched.inner.table.lock().await.epoch;

        let fired = CancellationToken::new();
        fired.cancel();
        assert!(!sched.inner.readmit(&b, &fired, epoch).await);

        assert!(!sched.inner.readmit(&c, &CancellationToken::new(), epoch).await);

        let snap = sched.health_snapshot().await;
        assert_eq!(snap.get("b").map(|h| h.status), Some(TaskStatus::Cancelled));
        assert_eq!(snap.get("c").map(|h| h.status), Some(TaskStatus::Pending));
        assert!((snap.power_used - 0.8).abs() < 1e-9);

        sched.shutdown().await;
    }

    #[tokio::test]
    async fn heartbeat_advances_while_throttled() {
        let sched = Scheduler::with_load_source(
            SchedulerConfig {
                heartbeat_interval: Duration::from_millis(20),
                throttle_seconds: Duration::from_millis(300),
                ..cfg()
            },
            Arc::new(StaticLoad::new(2.0)),
        );
        let started = Arc::new(AtomicU32::new(0));
        let flag = started.clone();
        let task = TaskFn::arc("held", move |ctx: CancellationToken| {
            let flag = flag.clone();
            async move {
                flag.fetch_add(1, Ordering::SeqCst);
                ctx.cancelled().await;
                Ok::<(), TaskError>(())
            }
        });

        sched.schedule(TaskSpec::new(task)).await;
        let first = wait_for(&sched, "held", |h| h.status == TaskStatus::Running)
            .await
            .last_heartbeat;
        time::sleep(Duration::from_millis(150)).await;

        let later = sched.health_snapshot().await.get("held").map(|h| h.last_heartbeat);
        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert!(later.is_some_and(|t| t > first));

        sched.shutdown().await;
    }
}

