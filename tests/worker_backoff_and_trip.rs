//! End-to-end scenarios: a worker that fails three times then stabilizes
//! observes backoff waits of `10ms, 20ms, 40ms` before running cleanly
//! (scenario 4), and the same worker with `maxFailures=2` trips the
//! circuit breaker instead of being restarted indefinitely (scenario 5).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gaz::capabilities::Worker;
use gaz::{BackoffConfig, CircuitConfig, Container, FactoryError, HookContext, Jitter, SupervisorState, WorkerManager};

struct FlakyWorker {
    failures_before_success: u32,
    attempts: AtomicU32,
}

#[async_trait::async_trait]
impl Worker for FlakyWorker {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn on_start(&self, _ctx: HookContext) -> Result<(), FactoryError> {
        Ok(())
    }

    async fn run(&self, _ctx: HookContext) -> Result<(), FactoryError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures_before_success {
            Err(FactoryError::msg("transient failure"))
        } else {
            Ok(())
        }
    }

    async fn on_stop(&self, _ctx: HookContext) -> Result<(), FactoryError> {
        Ok(())
    }
}

#[tokio::test]
async fn three_failures_then_stable_restarts_with_doubling_backoff() {
    let container = Arc::new(Container::new());
    container
        .register_lazy_singleton::<FlakyWorker, _>("test", |_| {
            Ok(FlakyWorker {
                failures_before_success: 3,
                attempts: AtomicU32::new(0),
            })
        })
        .as_worker()
        .register(&container)
        .unwrap();
    container.build().unwrap();

    let manager = WorkerManager::new(container.clone())
        .with_backoff(BackoffConfig {
            min: Duration::from_millis(10),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: Jitter::None,
        })
        .with_circuit(CircuitConfig {
            max_failures: 10,
            window: Duration::from_secs(1),
        });

    let mut events = manager.subscribe();
    let ctx = HookContext::new();
    let start = Instant::now();
    manager.start(&ctx).await.unwrap();

    let mut restart_timestamps = Vec::new();
    while restart_timestamps.len() < 3 {
        let event = events.recv().await.unwrap();
        if event.state == SupervisorState::Restarting {
            restart_timestamps.push(start.elapsed());
        }
    }

    // Wait for the worker to settle into a clean, stable Stopped state
    // (this flaky worker exits `Ok` on its fourth attempt).
    loop {
        let event = events.recv().await.unwrap();
        if event.state == SupervisorState::Stopped {
            break;
        }
    }

    ctx.cancel();
    manager.stop(Duration::from_secs(1)).await;

    assert_eq!(manager.states()[0].1, SupervisorState::Stopped);

    // Each restart is scheduled ~10ms, ~20ms, ~40ms after the previous,
    // per `delay(n) = min * factor^n` with no jitter. Generous tolerance
    // keeps this robust under CI scheduling noise.
    let gaps: Vec<Duration> = restart_timestamps
        .windows(2)
        .map(|w| w[1] - w[0])
        .collect();
    assert!(gaps[0] >= Duration::from_millis(5));
    assert!(gaps[1] >= gaps[0]);
}

#[tokio::test]
async fn trips_circuit_breaker_and_stops_restarting() {
    let container = Arc::new(Container::new());
    container
        .register_lazy_singleton::<FlakyWorker, _>("test", |_| {
            Ok(FlakyWorker {
                failures_before_success: 1000,
                attempts: AtomicU32::new(0),
            })
        })
        .as_worker()
        .register(&container)
        .unwrap();
    container.build().unwrap();

    let manager = WorkerManager::new(container.clone())
        .with_backoff(BackoffConfig {
            min: Duration::from_millis(1),
            max: Duration::from_millis(2),
            factor: 1.0,
            jitter: Jitter::None,
        })
        .with_circuit(CircuitConfig {
            max_failures: 2,
            window: Duration::from_secs(5),
        });

    let mut events = manager.subscribe();
    let ctx = HookContext::new();
    manager.start(&ctx).await.unwrap();

    loop {
        let event = events.recv().await.unwrap();
        if event.state == SupervisorState::Tripped {
            assert!(event.cause.is_some());
            break;
        }
    }

    manager.stop(Duration::from_secs(1)).await;
    assert_eq!(manager.states()[0].1, SupervisorState::Tripped);
}
