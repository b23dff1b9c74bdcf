//! The lifecycle engine: drives a [`Container`] through
//! Build -> Start -> Run -> Stop with topological ordering, signal-driven
//! termination, and idempotent shutdown.

pub mod error;
mod signal;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::container::Container;
use crate::context::HookContext;
use crate::key::ServiceKey;

pub use error::{LifecycleError, LifecycleResult};
pub(crate) use signal::TerminateSignal;

/// Bounds how long `Stop` waits for each hook before giving up on it and
/// moving to the next. Defaults to 30 seconds per spec.md §4.2.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownConfig {
    pub hook_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            hook_timeout: Duration::from_secs(30),
        }
    }
}

/// Orchestrates `Container::build`, topological start/stop ordering, and
/// POSIX signal handling for one application run.
pub struct LifecycleEngine {
    container: Arc<Container>,
    shutdown: ShutdownConfig,
    started_order: RwLock<Option<Vec<ServiceKey>>>,
    stop_once: OnceCell<Result<(), Arc<LifecycleError>>>,
}

impl LifecycleEngine {
    /// Builds an engine over `container` with the given shutdown bound.
    pub fn new(container: Arc<Container>, shutdown: ShutdownConfig) -> Self {
        Self {
            container,
            shutdown,
            started_order: RwLock::new(None),
            stop_once: OnceCell::new(),
        }
    }

    /// Runs `Build` then `Start`: freezes the container, instantiates eager
    /// and lifecycle-bearing services, computes a topological start order,
    /// and invokes every start hook in that order. A failing hook rolls
    /// back every already-started service (in reverse) before returning.
    pub async fn start(&self, ctx: HookContext) -> LifecycleResult<()> {
        self.container.build()?;

        let lifecycle_keys = self.container.lifecycle_keys();
        let order = self.container.graph_ref().start_order(&lifecycle_keys);

        debug!(count = order.len(), "starting services in topological order");

        let mut started = Vec::with_capacity(order.len());
        for key in &order {
            let hooks = self.container.start_hooks_for(key);
            if hooks.is_empty() {
                started.push(*key);
                continue;
            }

            let value = self.container.resolve_key(*key)?;
            let mut failed = None;
            for hook in &hooks {
                let hook_ctx = ctx.child();
                if let Err(source) = hook(hook_ctx, value.clone()).await {
                    failed = Some(source);
                    break;
                }
            }

            match failed {
                None => started.push(*key),
                Some(source) => {
                    error!(%key, %source, "start hook failed, rolling back");
                    self.rollback(&ctx, &started).await;
                    return Err(LifecycleError::StartFailed { key: *key, source });
                }
            }
        }

        *self.started_order.write() = Some(started);
        info!("start phase complete");
        Ok(())
    }

    /// Runs the started services until cancelled: blocks until `ctx` is
    /// cancelled or a terminating signal arrives, then stops in reverse
    /// order. Returns once `Stop` has completed (or failed).
    pub async fn run(&self, ctx: HookContext) -> Result<(), Arc<LifecycleError>> {
        self.start(ctx.child()).await.map_err(Arc::new)?;

        let mut term = TerminateSignal::new();
        tokio::select! {
            _ = ctx.cancelled() => {
                info!("root context cancelled, shutting down");
            }
            _ = term.recv() => {
                info!("terminate signal received, shutting down");
            }
        }

        // A second signal during graceful shutdown forces an immediate
        // exit rather than waiting out the remaining stop hooks.
        tokio::select! {
            result = self.stop(ctx) => result,
            _ = term.recv() => {
                error!("second terminate signal received, forcing immediate exit");
                std::process::exit(130);
            }
        }
    }

    /// Stops every started service in reverse order, under the configured
    /// per-hook timeout. Idempotent: the first call computes and caches the
    /// aggregate result; every subsequent call (concurrent or not) returns
    /// the same cached outcome without re-running any hook.
    pub async fn stop(&self, ctx: HookContext) -> Result<(), Arc<LifecycleError>> {
        self.stop_once
            .get_or_init(|| async { self.do_stop(&ctx).await.map_err(Arc::new) })
            .await
            .clone()
    }

    async fn do_stop(&self, ctx: &HookContext) -> LifecycleResult<()> {
        let started = match self.started_order.read().clone() {
            Some(started) => started,
            None => return Ok(()),
        };

        let mut stop_order = started.clone();
        stop_order.reverse();

        let failures = self.stop_range(ctx, &stop_order).await;
        if failures.is_empty() {
            info!("stop phase complete");
            Ok(())
        } else {
            error!(count = failures.len(), "stop phase completed with failures");
            Err(LifecycleError::StopFailed { failures })
        }
    }

    /// Invokes stop hooks for `keys` (already in the order they should run)
    /// and returns every failure encountered; every hook in `keys` is still
    /// attempted regardless of earlier failures.
    async fn stop_range(
        &self,
        ctx: &HookContext,
        keys: &[ServiceKey],
    ) -> Vec<(ServiceKey, crate::error::FactoryError)> {
        let mut failures = Vec::new();
        for key in keys {
            let hooks = self.container.stop_hooks_for(key);
            if hooks.is_empty() {
                continue;
            }
            let value = match self.container.resolve_key(*key) {
                Ok(v) => v,
                Err(_) => continue,
            };
            for hook in &hooks {
                let hook_ctx = ctx.child();
                let result = hook_ctx
                    .run_bounded(self.shutdown.hook_timeout, hook(hook_ctx.clone(), value.clone()))
                    .await;
                match result {
                    Some(Ok(())) => {}
                    Some(Err(source)) => {
                        warn!(%key, %source, "stop hook failed");
                        failures.push((*key, source));
                    }
                    None => {
                        warn!(%key, "stop hook timed out or was cancelled");
                        failures.push((*key, crate::error::FactoryError::msg("stop hook timed out")));
                    }
                }
            }
        }
        failures
    }

    /// Best-effort rollback of a partially-started prefix after a start
    /// failure. Errors are logged, not surfaced: the caller already has a
    /// `StartFailed` to report and spec.md §4.2 only requires the attempt.
    async fn rollback(&self, ctx: &HookContext, started: &[ServiceKey]) {
        let mut reverse = started.to_vec();
        reverse.reverse();
        let failures = self.stop_range(ctx, &reverse).await;
        for (key, source) in failures {
            warn!(%key, %source, "rollback stop hook failed");
        }
    }
}
