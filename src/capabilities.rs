//! Structural capabilities a registered service may opt into.
//!
//! Rust has no runtime trait-impl reflection, so `ResolveAll<Worker>` and
//! friends from spec.md §4.1/§9 cannot scan the registry asking "does this
//! value implement `Worker`?" at resolve time. Instead, opting a
//! registration into a capability builds a type-erased upcast closure
//! (`Arc<dyn Any> -> Arc<dyn Worker>`) while the concrete type `T` is still
//! known to the compiler, and stores it in the [`CapabilityRegistry`]
//! alongside the descriptor. Discovery (`resolve_workers`,
//! `resolve_config_providers`) then just drains that registry — no
//! reflection, no downcast-and-hope.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::HookContext;
use crate::descriptors::AnyArc;
use crate::error::FactoryError;
use crate::key::ServiceKey;

/// A long-lived background task supervised by the worker manager.
///
/// `on_start` must be non-blocking: it should hand its actual run loop to
/// the supervisor (via a spawned task) and return quickly, per spec.md
/// §4.3's "non-blocking" requirement for `onStart`.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// A human-readable name used in logs and the failure bus.
    fn name(&self) -> &str;

    /// Starts the worker's run loop under `ctx`. Returning `Ok` means the
    /// worker has been launched, not that it has finished; returning `Err`
    /// is a startup failure handled like any other failed start hook.
    async fn on_start(&self, ctx: HookContext) -> Result<(), FactoryError>;

    /// Runs the worker's body to completion or until `ctx` is cancelled.
    /// A returned `Err` (including a panic, recovered by the supervisor) is
    /// a failure that triggers the restart policy; cancellation-driven
    /// return is not.
    async fn run(&self, ctx: HookContext) -> Result<(), FactoryError>;

    /// Invoked once, on orderly shutdown, after `run` has returned or been
    /// cancelled. Never invoked concurrently with `run`.
    async fn on_stop(&self, ctx: HookContext) -> Result<(), FactoryError>;
}

/// Describes the flags an external config subsystem should recognize for a
/// provider's namespace. Parsing and sourcing stay entirely outside this
/// crate; this is metadata only.
#[derive(Debug, Clone)]
pub struct FlagSpec {
    pub name: &'static str,
    pub kind: FlagKind,
    pub default: Option<String>,
    pub description: &'static str,
}

/// The primitive shape of a declared flag's value, for an external parser
/// to map onto its own flag type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    Bool,
    Int,
    Float,
    String,
    Duration,
}

/// A service that owns a namespace of configuration and declares the flags
/// an external config/CLI layer should recognize for it.
pub trait ConfigProvider: Send + Sync + 'static {
    /// The configuration namespace this provider owns (e.g. `"database"`).
    fn namespace(&self) -> &str;

    /// The flags this provider wants the external config subsystem to
    /// recognize under its namespace.
    fn declared_flags(&self) -> Vec<FlagSpec>;
}

pub(crate) type WorkerUpcast = Arc<dyn Fn(AnyArc) -> Arc<dyn Worker> + Send + Sync>;
pub(crate) type ConfigUpcast = Arc<dyn Fn(AnyArc) -> Arc<dyn ConfigProvider> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct CapabilityEntry {
    pub(crate) worker: Option<WorkerUpcast>,
    pub(crate) config_provider: Option<ConfigUpcast>,
}

/// Registry of capability upcast closures, keyed by the same
/// [`ServiceKey`] as the owning descriptor.
#[derive(Default)]
pub(crate) struct CapabilityRegistry {
    entries: std::collections::HashMap<ServiceKey, CapabilityEntry>,
}

impl CapabilityRegistry {
    /// Stores a pre-built worker upcast closure, built by the caller where
    /// the concrete type's `Worker` bound was still known to the compiler.
    pub(crate) fn insert_worker_upcast(&mut self, key: ServiceKey, upcast: WorkerUpcast) {
        self.entries.entry(key).or_insert_with(|| CapabilityEntry {
            worker: None,
            config_provider: None,
        }).worker = Some(upcast);
    }

    /// Stores a pre-built config-provider upcast closure, built by the
    /// caller where the concrete type's `ConfigProvider` bound was still
    /// known to the compiler.
    pub(crate) fn insert_config_upcast(&mut self, key: ServiceKey, upcast: ConfigUpcast) {
        self.entries.entry(key).or_insert_with(|| CapabilityEntry {
            worker: None,
            config_provider: None,
        }).config_provider = Some(upcast);
    }

    pub(crate) fn worker_keys(&self) -> Vec<ServiceKey> {
        self.entries
            .iter()
            .filter(|(_, e)| e.worker.is_some())
            .map(|(k, _)| *k)
            .collect()
    }

    pub(crate) fn config_provider_keys(&self) -> Vec<ServiceKey> {
        self.entries
            .iter()
            .filter(|(_, e)| e.config_provider.is_some())
            .map(|(k, _)| *k)
            .collect()
    }

    pub(crate) fn upcast_worker(&self, key: &ServiceKey, value: AnyArc) -> Option<Arc<dyn Worker>> {
        self.entries.get(key).and_then(|e| e.worker.as_ref()).map(|f| f(value))
    }

    pub(crate) fn upcast_config_provider(&self, key: &ServiceKey, value: AnyArc) -> Option<Arc<dyn ConfigProvider>> {
        self.entries
            .get(key)
            .and_then(|e| e.config_provider.as_ref())
            .map(|f| f(value))
    }
}

#[allow(dead_code)]
fn _assert_object_safe(_: &dyn Worker, _: &dyn ConfigProvider) {}

#[allow(dead_code)]
fn _assert_any(_: &dyn Any) {}
