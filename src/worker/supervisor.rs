//! Per-worker supervisor: the restart state machine described in
//! spec.md §4.3.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{error, warn};

use crate::capabilities::Worker;
use crate::context::HookContext;

use super::backoff::BackoffConfig;
use super::bus::{FailureBus, SupervisorEvent};
use super::circuit::{CircuitConfig, RollingWindow};
use super::error::WorkerError;

/// The five states a supervised worker passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running,
    Restarting,
    Tripped,
    Stopped,
}

enum Outcome {
    Clean,
    Failed { detail: String, panicked: bool },
}

/// Drives one worker through its restart lifecycle.
pub(crate) struct Supervisor {
    name: String,
    worker: Arc<dyn Worker>,
    backoff: BackoffConfig,
    circuit: CircuitConfig,
    state: RwLock<SupervisorState>,
    restart_count: AtomicU32,
}

impl Supervisor {
    pub(crate) fn new(worker: Arc<dyn Worker>, backoff: BackoffConfig, circuit: CircuitConfig) -> Self {
        let name = worker.name().to_string();
        Self {
            name,
            worker,
            backoff,
            circuit,
            state: RwLock::new(SupervisorState::Idle),
            restart_count: AtomicU32::new(0),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> SupervisorState {
        *self.state.read()
    }

    fn set_state(&self, state: SupervisorState) {
        *self.state.write() = state;
    }

    fn publish(&self, bus: &FailureBus, detail: Option<String>, cause: Option<Arc<WorkerError>>) {
        bus.publish(SupervisorEvent {
            worker_name: self.name.clone(),
            state: self.state(),
            restart_count: self.restart_count.load(Ordering::Acquire),
            detail,
            cause,
        });
    }

    /// Runs this worker under supervision until it stops cleanly, trips,
    /// or `ctx` is cancelled.
    pub(crate) async fn supervise(self: Arc<Self>, ctx: HookContext, bus: Arc<FailureBus>) {
        let mut window = RollingWindow::new(self.circuit);

        loop {
            if ctx.is_cancelled() {
                self.set_state(SupervisorState::Stopped);
                self.publish(&bus, None, None);
                let _ = self.worker.on_stop(ctx.child()).await;
                return;
            }

            self.set_state(SupervisorState::Running);
            self.publish(&bus, None, None);

            if let Err(e) = self.worker.on_start(ctx.child()).await {
                if self
                    .handle_failure(&ctx, &bus, &mut window, e.to_string(), false)
                    .await
                {
                    return;
                }
                continue;
            }

            let running_since = Instant::now();
            let outcome = self.run_once(&ctx).await;

            if running_since.elapsed() >= self.circuit.window {
                window.reset();
                self.restart_count.store(0, Ordering::Release);
            }

            match outcome {
                Outcome::Clean => {
                    self.set_state(SupervisorState::Stopped);
                    self.publish(&bus, None, None);
                    let _ = self.worker.on_stop(ctx.child()).await;
                    return;
                }
                Outcome::Failed { detail, panicked } => {
                    if self.handle_failure(&ctx, &bus, &mut window, detail, panicked).await {
                        return;
                    }
                }
            }
        }
    }

    async fn run_once(&self, ctx: &HookContext) -> Outcome {
        let worker = self.worker.clone();
        let run_ctx = ctx.child();
        let handle = tokio::spawn(async move { worker.run(run_ctx).await });

        match handle.await {
            Ok(Ok(())) => Outcome::Clean,
            Ok(Err(e)) => Outcome::Failed {
                detail: e.to_string(),
                panicked: false,
            },
            Err(join_error) if join_error.is_panic() => Outcome::Failed {
                detail: format!("panicked: {join_error}"),
                panicked: true,
            },
            Err(_) => Outcome::Clean,
        }
    }

    /// Records a failure, transitions to `Restarting`/`Tripped`, and waits
    /// out the backoff. Returns `true` if the supervisor has terminated
    /// (tripped or cancelled during backoff) and the caller should stop.
    async fn handle_failure(
        &self,
        ctx: &HookContext,
        bus: &FailureBus,
        window: &mut RollingWindow,
        detail: String,
        panicked: bool,
    ) -> bool {
        let tripped = window.record_failure(Instant::now());

        if tripped {
            self.set_state(SupervisorState::Tripped);
            error!(worker = %self.name, %detail, "worker tripped circuit breaker");
            let cause = Arc::new(WorkerError::CircuitTripped {
                name: self.name.clone(),
                failures: window.count(),
                window: self.circuit.window,
            });
            self.publish(bus, Some(detail), Some(cause));
            return true;
        }

        self.set_state(SupervisorState::Restarting);
        warn!(worker = %self.name, %detail, "worker failed, scheduling restart");
        let cause = panicked.then(|| {
            Arc::new(WorkerError::Panicked {
                name: self.name.clone(),
                message: detail.clone(),
            })
        });
        self.publish(bus, Some(detail), cause);

        let n = self.restart_count.fetch_add(1, Ordering::AcqRel);
        let delay = self.backoff.next(n);

        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            _ = ctx.cancelled() => {
                self.set_state(SupervisorState::Stopped);
                self.publish(bus, None, None);
                true
            }
        }
    }
}

#[allow(dead_code)]
fn _assert_send_sync() {
    fn assert<T: Send + Sync>() {}
    assert::<Supervisor>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FactoryError;
    use std::sync::atomic::AtomicU32 as Counter;

    struct FlakyWorker {
        failures_before_success: u32,
        attempts: Counter,
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
            let attempt = self.attempts.fetch_add(1, Ordering::AcqRel);
            if attempt < self.failures_before_success {
                Err(FactoryError::msg("boom"))
            } else {
                // Stay "running" briefly then exit cleanly, simulating a
                // worker that has stabilized.
                Ok(())
            }
        }

        async fn on_stop(&self, _ctx: HookContext) -> Result<(), FactoryError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn restarts_after_failures_then_stops_cleanly() {
        let worker = Arc::new(FlakyWorker {
            failures_before_success: 3,
            attempts: Counter::new(0),
        });
        let supervisor = Arc::new(Supervisor::new(
            worker.clone(),
            BackoffConfig {
                min: std::time::Duration::from_millis(1),
                max: std::time::Duration::from_millis(5),
                factor: 2.0,
                jitter: super::super::backoff::Jitter::None,
            },
            CircuitConfig {
                max_failures: 10,
                window: std::time::Duration::from_secs(1),
            },
        ));
        let ctx = HookContext::new();
        let bus = Arc::new(FailureBus::default());

        supervisor.clone().supervise(ctx, bus).await;

        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        assert_eq!(worker.attempts.load(Ordering::Acquire), 4);
    }

    #[tokio::test]
    async fn trips_after_max_failures() {
        let worker = Arc::new(FlakyWorker {
            failures_before_success: 1000,
            attempts: Counter::new(0),
        });
        let supervisor = Arc::new(Supervisor::new(
            worker.clone(),
            BackoffConfig {
                min: std::time::Duration::from_millis(1),
                max: std::time::Duration::from_millis(2),
                factor: 1.0,
                jitter: super::super::backoff::Jitter::None,
            },
            CircuitConfig {
                max_failures: 2,
                window: std::time::Duration::from_secs(5),
            },
        ));
        let ctx = HookContext::new();
        let bus = Arc::new(FailureBus::default());
        let mut events = bus.subscribe();

        supervisor.clone().supervise(ctx, bus).await;

        assert_eq!(supervisor.state(), SupervisorState::Tripped);

        let mut saw_tripped_cause = false;
        while let Ok(event) = events.try_recv() {
            if let Some(cause) = event.cause {
                assert!(matches!(*cause, WorkerError::CircuitTripped { .. }));
                saw_tripped_cause = true;
            }
        }
        assert!(saw_tripped_cause, "expected a CircuitTripped cause on the bus");
    }
}
