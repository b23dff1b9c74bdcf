//! The `Application` façade: bundles a container, the lifecycle engine,
//! and the worker manager into the single entry point spec.md §6
//! describes.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::container::Container;
use crate::context::HookContext;
use crate::error::ContainerResult;
use crate::lifecycle::{LifecycleEngine, LifecycleError, ShutdownConfig};
use crate::module::{FlagRegistrar, Module};
use crate::worker::{BackoffConfig, CircuitConfig, SupervisorEvent, WorkerError, WorkerManager};

/// Errors surfaced by `Application::run`/`stop`, covering both the
/// lifecycle engine and the worker manager.
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Lifecycle(#[from] Arc<LifecycleError>),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Maps a terminal `run`/`stop` result to the exit code spec.md §6
/// prescribes: 0 for success, 1 for any unresolved error. Bootstrap
/// failures (from `build()` or module registration, before `run` is ever
/// called) are the caller's responsibility to map to exit code 2, since
/// by the time an `ApplicationError` exists `run` has already started.
pub fn exit_code(result: &Result<(), ApplicationError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Bundles a [`Container`], a [`LifecycleEngine`], and a [`WorkerManager`]
/// into the application entry point described by spec.md §6.
pub struct Application {
    container: Arc<Container>,
    lifecycle: LifecycleEngine,
    workers: WorkerManager,
    modules: RwLock<Vec<Module>>,
    extra_flags: RwLock<Vec<Box<dyn Fn(&mut dyn FlagRegistrar) + Send + Sync>>>,
    shutdown: ShutdownConfig,
    /// The context workers were started under, kept separate from the
    /// caller's own `ctx` so `stop` can cancel it unconditionally (a
    /// signal-triggered shutdown never cancels the caller's `ctx` itself)
    /// without also short-circuiting the lifecycle stop hooks, which are
    /// keyed off `ctx` directly.
    worker_ctx: RwLock<Option<HookContext>>,
}

impl Application {
    /// Builds an application with default shutdown/backoff/circuit
    /// configuration.
    pub fn new() -> Self {
        Self::with_config(ShutdownConfig::default(), BackoffConfig::default(), CircuitConfig::default())
    }

    /// Builds an application with explicit shutdown, backoff, and circuit
    /// configuration, for embedding code that owns its own config layer
    /// (per SPEC_FULL.md's ambient-config stance: this crate takes no
    /// config files itself, but accepts these as plain value structs).
    pub fn with_config(shutdown: ShutdownConfig, backoff: BackoffConfig, circuit: CircuitConfig) -> Self {
        let container = Arc::new(Container::new());
        let lifecycle = LifecycleEngine::new(container.clone(), shutdown);
        let workers = WorkerManager::new(container.clone()).with_backoff(backoff).with_circuit(circuit);
        Self {
            container,
            lifecycle,
            workers,
            modules: RwLock::new(Vec::new()),
            extra_flags: RwLock::new(Vec::new()),
            shutdown,
            worker_ctx: RwLock::new(None),
        }
    }

    /// The underlying container, for providers that need direct access
    /// outside of module registration (e.g. tests).
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Applies `module`'s providers immediately (in the order modules are
    /// added) and retains it so its flag callbacks run during
    /// `register_flags`. `DuplicateModule` if the name is already taken;
    /// `DuplicateRegistration` if any of its providers collide.
    pub fn use_module(&self, module: Module) -> ContainerResult<()> {
        self.container.enter_module(module.name())?;
        module.apply_providers(&self.container)?;
        self.modules.write().push(module);
        Ok(())
    }

    /// Registers a flag-registration callback outside of any module.
    pub fn add_flags<F>(&self, callback: F)
    where
        F: Fn(&mut dyn FlagRegistrar) + Send + Sync + 'static,
    {
        self.extra_flags.write().push(Box::new(callback));
    }

    /// Runs every collected flag-registration callback (every used
    /// module's, then every standalone one, in the order they were added)
    /// against `registrar`. Call this once, before `build`, after an
    /// external CLI integration has had a chance to attach its own flags
    /// to the same registrar.
    pub fn register_flags(&self, registrar: &mut dyn FlagRegistrar) {
        for module in self.modules.read().iter() {
            module.apply_flags(registrar);
        }
        for callback in self.extra_flags.read().iter() {
            callback(registrar);
        }
    }

    /// Runs the container's Build phase: freezes registration, instantiates
    /// every eager and lifecycle-bearing service.
    pub fn build(&self) -> Result<(), LifecycleError> {
        self.container.build().map_err(LifecycleError::from)
    }

    /// Runs Start (topological hook invocation), starts every discovered
    /// worker, then blocks until cancellation or a terminating signal, and
    /// finally runs Stop. Equivalent to spec.md §6's `run(ctx)`.
    pub async fn run(&self, ctx: HookContext) -> Result<(), ApplicationError> {
        self.lifecycle.start(ctx.child()).await.map_err(Arc::new)?;

        let worker_ctx = ctx.child();
        *self.worker_ctx.write() = Some(worker_ctx.clone());
        self.workers.start(&worker_ctx).await?;

        let mut term = crate::lifecycle::TerminateSignal::new();
        tokio::select! {
            _ = ctx.cancelled() => {}
            _ = term.recv() => {}
        }

        // A second signal while stop() is still running forces an
        // immediate exit rather than waiting out the shutdown timeout.
        tokio::select! {
            result = self.stop(ctx) => result,
            _ = term.recv() => {
                tracing::error!("second terminate signal received, forcing immediate exit");
                std::process::exit(130);
            }
        }
    }

    /// Stops workers (bounded by the configured shutdown timeout), then
    /// non-worker lifecycle services in reverse start order. Idempotent:
    /// safe to call directly even if `run` was never invoked, and safe to
    /// call more than once.
    pub async fn stop(&self, ctx: HookContext) -> Result<(), ApplicationError> {
        // Workers only leave their supervision loop on a clean exit or on
        // their own context being cancelled (spec.md §4.3); a
        // signal-triggered shutdown never cancels the caller's `ctx`
        // itself, so that has to happen here rather than being inherited.
        if let Some(worker_ctx) = self.worker_ctx.read().clone() {
            worker_ctx.cancel();
        }
        self.workers.stop(self.shutdown.hook_timeout).await;
        self.lifecycle.stop(ctx).await.map_err(ApplicationError::from)
    }

    /// Subscribes to worker supervisor state-transition events.
    pub fn subscribe_worker_events(&self) -> tokio::sync::broadcast::Receiver<SupervisorEvent> {
        self.workers.subscribe()
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}
