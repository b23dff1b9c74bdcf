//! The worker manager: discovers services opted into the worker
//! capability and supervises each under its own restart loop.

pub mod backoff;
pub mod bus;
pub mod circuit;
pub mod error;
mod supervisor;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub use backoff::{BackoffConfig, Jitter};
pub use bus::SupervisorEvent;
pub use circuit::CircuitConfig;
pub use error::WorkerError;
pub use supervisor::SupervisorState;

use crate::container::Container;
use crate::context::HookContext;

use bus::FailureBus;
use supervisor::Supervisor;

/// Discovers and supervises every registration opted into
/// [`crate::capabilities::Worker`] via
/// `ServiceBuilder::as_worker`.
///
/// One [`BackoffConfig`]/[`CircuitConfig`] pair applies to every worker
/// discovered by a given manager; embedding code that needs per-worker
/// tuning runs more than one manager, or wraps its worker in a type that
/// bakes its own config into its `run` loop.
pub struct WorkerManager {
    container: Arc<Container>,
    backoff: BackoffConfig,
    circuit: CircuitConfig,
    bus: Arc<FailureBus>,
    supervisors: RwLock<Vec<Arc<Supervisor>>>,
    handles: RwLock<Vec<JoinHandle<()>>>,
}

impl WorkerManager {
    /// Builds a manager with default backoff/circuit configuration.
    pub fn new(container: Arc<Container>) -> Self {
        Self {
            container,
            backoff: BackoffConfig::default(),
            circuit: CircuitConfig::default(),
            bus: Arc::new(FailureBus::default()),
            supervisors: RwLock::new(Vec::new()),
            handles: RwLock::new(Vec::new()),
        }
    }

    /// Overrides the backoff config applied to every discovered worker.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Overrides the circuit-breaker config applied to every discovered
    /// worker.
    pub fn with_circuit(mut self, circuit: CircuitConfig) -> Self {
        self.circuit = circuit;
        self
    }

    /// Subscribes to the failure-reporting bus every supervisor publishes
    /// state transitions to.
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.bus.subscribe()
    }

    /// Discovers workers via the container's worker capability registry
    /// and spawns one supervisor task per worker, each deriving its own
    /// child of `ctx`. Per spec.md §4.3, workers start after all
    /// non-worker lifecycle services — callers invoke this after
    /// `LifecycleEngine::start`.
    pub async fn start(&self, ctx: &HookContext) -> Result<(), WorkerError> {
        let workers = self.container.resolve_workers()?;
        let mut supervisors = self.supervisors.write();
        let mut handles = self.handles.write();

        for worker in workers {
            let supervisor = Arc::new(Supervisor::new(worker, self.backoff, self.circuit));
            supervisors.push(supervisor.clone());

            let sup_ctx = ctx.child();
            let bus = self.bus.clone();
            handles.push(tokio::spawn(async move {
                supervisor.supervise(sup_ctx, bus).await;
            }));
        }
        Ok(())
    }

    /// Waits (bounded by `timeout` per worker) for every supervisor task
    /// to finish shutting down. Callers cancel the context passed to
    /// `start` before calling this. Per spec.md §4.3, workers stop before
    /// non-worker lifecycle services.
    pub async fn stop(&self, timeout: Duration) {
        let handles: Vec<_> = std::mem::take(&mut *self.handles.write());
        for handle in handles {
            if tokio::time::timeout(timeout, handle).await.is_err() {
                tracing::warn!("worker supervisor did not stop within the shutdown timeout");
            }
        }
    }

    /// A snapshot of every supervised worker's current state, for
    /// diagnostics.
    pub fn states(&self) -> Vec<(String, SupervisorState)> {
        self.supervisors
            .read()
            .iter()
            .map(|s| (s.name().to_string(), s.state()))
            .collect()
    }
}
