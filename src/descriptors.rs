//! Service descriptors: the tagged records describing how one service is
//! produced and disposed.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::HookContext;
use crate::error::{ContainerError, FactoryError};
use crate::key::ServiceKey;

/// Type-erased, thread-safe storage for any resolved value.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// A boxed, `Send` future, used for hook and worker return types since
/// `dyn Fn(..) -> impl Future` is not expressible without boxing.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A synchronous factory: `(Container) -> (Value, Error)` from spec.md §3.
///
/// Factories are synchronous by design — any asynchronous setup a service
/// needs belongs in its start hook, which does run under an async context.
pub type Factory = Arc<dyn Fn(&crate::container::Container) -> Result<AnyArc, FactoryError> + Send + Sync>;

/// A start or stop hook: `(Context, Value) -> Error`, invoked in
/// registration order during the lifecycle engine's start/stop phases.
pub type LifecycleHook =
    Arc<dyn Fn(HookContext, AnyArc) -> BoxFuture<'static, Result<(), FactoryError>> + Send + Sync>;

/// How a descriptor's value is produced and cached.
///
/// See spec.md §3 ("ServiceDescriptor") for the authoritative definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Instantiated on first successful resolution; cached forever after.
    LazySingleton,
    /// Instantiated during `build`; cached forever after.
    EagerSingleton,
    /// Freshly produced on every resolution; never cached.
    PerCall,
    /// A pre-built value registered directly; no factory.
    Instance,
}

impl Kind {
    /// Whether this kind caches its value across resolutions.
    pub fn is_cached(&self) -> bool {
        matches!(self, Kind::LazySingleton | Kind::EagerSingleton | Kind::Instance)
    }
}

/// Metadata describing one registered service, plus (at runtime) the
/// machinery needed to produce and cache its value.
pub struct ServiceDescriptor {
    pub(crate) key: ServiceKey,
    pub(crate) kind: Kind,
    pub(crate) factory: Option<Factory>,
    pub(crate) instance: Option<AnyArc>,
    pub(crate) start_hooks: Vec<LifecycleHook>,
    pub(crate) stop_hooks: Vec<LifecycleHook>,
    pub(crate) group: Option<&'static str>,
    pub(crate) module_name: &'static str,
}

impl ServiceDescriptor {
    /// The key this descriptor is registered under.
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// The production strategy for this descriptor.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The group label, if any, used by `ResolveGroup`.
    pub fn group(&self) -> Option<&'static str> {
        self.group
    }

    /// The module that registered this descriptor, for diagnostics.
    pub fn module_name(&self) -> &'static str {
        self.module_name
    }

    /// True iff the produced value declares start/stop capability: either
    /// the descriptor itself carries hooks, or (checked by the caller before
    /// construction) the produced type implements a lifecycle-bearing
    /// capability such as [`crate::worker::Worker`].
    pub fn declares_lifecycle(&self) -> bool {
        !self.start_hooks.is_empty() || !self.stop_hooks.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<(), ContainerError> {
        match self.kind {
            Kind::Instance => {
                debug_assert!(self.instance.is_some(), "Instance descriptor without a value");
                debug_assert!(self.factory.is_none(), "Instance descriptor carrying a factory");
            }
            _ => {
                debug_assert!(self.factory.is_some(), "non-Instance descriptor without a factory");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("group", &self.group)
            .field("module_name", &self.module_name)
            .field("start_hooks", &self.start_hooks.len())
            .field("stop_hooks", &self.stop_hooks.len())
            .finish()
    }
}
