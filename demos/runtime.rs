use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use modvisor::{
    BackoffPolicy, Event, EventLogger, HandlerError, HandlerFn, PrioritizedQueue, QueueConfig,
    Runtime, RuntimeConfig, StatusReporter, TaskError, TaskFn, TaskRef, TaskSpec, WILDCARD,
};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut cfg = RuntimeConfig::default();
    cfg.bus.max_in_flight = 8;
    cfg.bus.handler_timeout = Duration::from_secs(2);
    cfg.scheduler.heartbeat_interval = Duration::from_secs(1);
    cfg.scheduler.shutdown_grace = Duration::from_secs(3);

    let runtime = Runtime::new(cfg);
    let bus = runtime.bus().clone();

    bus.subscribe(WILDCARD, Arc::new(EventLogger)).await;
    let status = Arc::new(StatusReporter::new(Duration::from_secs(2)));
    bus.subscribe(WILDCARD, status.clone()).await;

    // Commands are buffered and drained on a tick; "stop" jumps the line.
    let commands = Arc::new(PrioritizedQueue::new(
        QueueConfig::default(),
        |cmd: &String| cmd == "stop",
        |cmd: String| async move {
            println!("executing {cmd}");
            Ok::<(), HandlerError>(())
        },
    ));
    {
        let commands = commands.clone();
        bus.subscribe(
            "intent.detected",
            HandlerFn::arc("intent_router", move |ev: Arc<Event>| {
                let commands = commands.clone();
                async move {
                    if let Some(intent) = ev.payload().get("intent").and_then(|v| v.as_str()) {
                        commands.enqueue(intent.to_string());
                    }
                    Ok::<(), HandlerError>(())
                }
            }),
        )
        .await;
    }

    let sensor: TaskRef = {
        let bus = bus.clone();
        TaskFn::arc("sensor.microphone", move |ctx: CancellationToken| {
            let bus = bus.clone();
            async move {
                let mut n = 0u64;
                loop {
                    tokio::select! {
                        _ = ctx.cancelled() => return Ok::<(), TaskError>(()),
                        _ = tokio::time::sleep(Duration::from_millis(500)) => {}
                    }
                    n += 1;
                    let intent = if n % 5 == 0 { "stop" } else { "open" };
                    bus.publish(
                        Event::new("intent.detected", "sensor.microphone")
                            .with_field("intent", intent)
                            .with_field("sample", n),
                    )
                    .await;
                }
            }
        })
    };

    let attempts = Arc::new(AtomicU64::new(0));
    let flaky: TaskRef = {
        let attempts = attempts.clone();
        TaskFn::arc("sensor.camera", move |ctx: CancellationToken| {
            let attempts = attempts.clone();
            async move {
                let this = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                tokio::select! {
                    _ = ctx.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(Duration::from_secs(2)) => {}
                }
                Err(TaskError::fail(format!("camera frame timeout #{this}")))
            }
        })
    };

    runtime
        .start(vec![
            TaskSpec::new(sensor).with_priority(0).with_power_cost(0.2),
            TaskSpec::new(commands.clone().into_task("queue.commands"))
                .with_priority(1)
                .with_power_cost(0.1),
            TaskSpec::new(status.clone().into_task("status.reporter")).with_priority(5),
            TaskSpec::new(flaky)
                .with_priority(2)
                .with_power_cost(0.4)
                .with_max_restarts(2)
                .with_backoff(BackoffPolicy::default()),
        ])
        .await;

    runtime.run_until_signal().await?;

    println!("bus: {:?}", runtime.bus().metrics());
    println!("queue: {:?}", commands.metrics());
    Ok(())
}
