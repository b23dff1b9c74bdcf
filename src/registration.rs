//! Registry storage: the slot a [`ServiceDescriptor`] occupies once it is
//! registered, plus the fluent builder used to assemble one.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::context::HookContext;
use crate::descriptors::{AnyArc, Kind, LifecycleHook, ServiceDescriptor};
use crate::error::FactoryError;
use crate::key::ServiceKey;

/// A registered descriptor plus its runtime cache slot.
///
/// `OnceCell::get_or_try_init` gives exactly-once, single-flight
/// construction for singletons: concurrent callers racing to resolve the
/// same lazy singleton block on the same initialization rather than each
/// running the factory and discarding duplicates.
pub(crate) struct ServiceEntry {
    pub(crate) descriptor: ServiceDescriptor,
    cache: OnceCell<AnyArc>,
}

impl ServiceEntry {
    pub(crate) fn new(descriptor: ServiceDescriptor) -> Self {
        let cache = OnceCell::new();
        if let Kind::Instance = descriptor.kind {
            if let Some(value) = descriptor.instance.clone() {
                // Infallible: OnceCell is fresh.
                let _ = cache.set(value);
            }
        }
        Self { descriptor, cache }
    }

    /// Returns the cached value if present, without constructing anything.
    pub(crate) fn cached(&self) -> Option<AnyArc> {
        self.cache.get().cloned()
    }

    /// Gets or constructs the cached value, invoking `init` at most once
    /// even under concurrent contention.
    pub(crate) fn get_or_try_init(
        &self,
        init: impl FnOnce() -> Result<AnyArc, FactoryError>,
    ) -> Result<AnyArc, FactoryError> {
        self.cache.get_or_try_init(init).map(|v| v.clone())
    }

    /// Pre-populates the cache (used by eager construction during build).
    pub(crate) fn prime(&self, value: AnyArc) {
        let _ = self.cache.set(value);
    }
}

/// Fluent builder for a [`ServiceDescriptor`], returned by the `Container`
/// registration methods.
pub struct ServiceBuilder<T: 'static> {
    key: ServiceKey,
    kind: Kind,
    factory: Option<crate::descriptors::Factory>,
    instance: Option<AnyArc>,
    start_hooks: Vec<LifecycleHook>,
    stop_hooks: Vec<LifecycleHook>,
    group: Option<&'static str>,
    module_name: &'static str,
    worker_upcast: Option<crate::capabilities::WorkerUpcast>,
    config_upcast: Option<crate::capabilities::ConfigUpcast>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ServiceBuilder<T> {
    pub(crate) fn new_factory(
        key: ServiceKey,
        kind: Kind,
        module_name: &'static str,
        factory: impl Fn(&crate::container::Container) -> Result<T, FactoryError> + Send + Sync + 'static,
    ) -> Self {
        let factory: crate::descriptors::Factory = Arc::new(move |container| {
            factory(container).map(|v| Arc::new(v) as AnyArc)
        });
        Self {
            key,
            kind,
            factory: Some(factory),
            instance: None,
            start_hooks: Vec::new(),
            stop_hooks: Vec::new(),
            group: None,
            module_name,
            worker_upcast: None,
            config_upcast: None,
            _marker: std::marker::PhantomData,
        }
    }

    pub(crate) fn new_instance(key: ServiceKey, module_name: &'static str, value: T) -> Self {
        Self {
            key,
            kind: Kind::Instance,
            factory: None,
            instance: Some(Arc::new(value) as AnyArc),
            start_hooks: Vec::new(),
            stop_hooks: Vec::new(),
            group: None,
            module_name,
            worker_upcast: None,
            config_upcast: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Registers a start hook, invoked in registration order during the
    /// lifecycle engine's Start phase.
    pub fn on_start<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext, Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), FactoryError>> + Send + 'static,
    {
        let hook = Arc::new(move |ctx: HookContext, value: AnyArc| {
            let value = value
                .downcast::<T>()
                .unwrap_or_else(|_| panic!("hook type mismatch for {}", std::any::type_name::<T>()));
            Box::pin(hook(ctx, value)) as crate::descriptors::BoxFuture<'static, Result<(), FactoryError>>
        });
        self.start_hooks.push(hook);
        self
    }

    /// Registers a stop hook, invoked in reverse topological order during
    /// the lifecycle engine's Stop phase.
    pub fn on_stop<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext, Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), FactoryError>> + Send + 'static,
    {
        let hook = Arc::new(move |ctx: HookContext, value: AnyArc| {
            let value = value
                .downcast::<T>()
                .unwrap_or_else(|_| panic!("hook type mismatch for {}", std::any::type_name::<T>()));
            Box::pin(hook(ctx, value)) as crate::descriptors::BoxFuture<'static, Result<(), FactoryError>>
        });
        self.stop_hooks.push(hook);
        self
    }

    /// Assigns this descriptor to a group for `resolve_group::<T>()`.
    pub fn in_group(mut self, group: &'static str) -> Self {
        self.group = Some(group);
        self
    }

    /// Finalizes the descriptor and inserts it into `container`.
    ///
    /// Fails with `DuplicateRegistration` if the key is already taken, or
    /// `AlreadyBuilt` if the container has already been built.
    pub fn register(self, container: &crate::container::Container) -> crate::error::ContainerResult<()> {
        let key = self.key;
        let worker_upcast = self.worker_upcast.clone();
        let config_upcast = self.config_upcast.clone();
        let descriptor = self.build();
        container.insert(descriptor)?;
        if let Some(upcast) = worker_upcast {
            container.insert_worker_capability(key, upcast);
        }
        if let Some(upcast) = config_upcast {
            container.insert_config_capability(key, upcast);
        }
        Ok(())
    }

    fn build(self) -> ServiceDescriptor {
        ServiceDescriptor {
            key: self.key,
            kind: self.kind,
            factory: self.factory,
            instance: self.instance,
            start_hooks: self.start_hooks,
            stop_hooks: self.stop_hooks,
            group: self.group,
            module_name: self.module_name,
        }
    }
}

impl<T: crate::capabilities::Worker> ServiceBuilder<T> {
    /// Opts this registration into discovery via `resolve_workers()`. The
    /// worker manager treats every such registration as a supervised
    /// background task.
    ///
    /// Builds the type-erased upcast closure right here, where the
    /// compiler still knows the concrete `T: Worker` — this is what lets
    /// `resolve_workers()` later operate with no reflection at all.
    pub fn as_worker(mut self) -> Self {
        self.worker_upcast = Some(Arc::new(|value: AnyArc| {
            value
                .downcast::<T>()
                .unwrap_or_else(|_| panic!("worker capability type mismatch for {}", std::any::type_name::<T>()))
                as Arc<dyn crate::capabilities::Worker>
        }));
        self
    }
}

impl<T: crate::capabilities::ConfigProvider> ServiceBuilder<T> {
    /// Opts this registration into discovery via `resolve_config_providers()`.
    pub fn as_config_provider(mut self) -> Self {
        self.config_upcast = Some(Arc::new(|value: AnyArc| {
            value
                .downcast::<T>()
                .unwrap_or_else(|_| panic!("config provider capability type mismatch for {}", std::any::type_name::<T>()))
                as Arc<dyn crate::capabilities::ConfigProvider>
        }));
        self
    }
}
