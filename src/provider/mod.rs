//! Service provider module.
//!
//! This module contains the [`ServiceProvider`] facade, which ties together
//! the registry, the resolution engine, lifecycle tracking and the container
//! configuration.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OnceCell;

use crate::config::{ContainerConfig, Environment};
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::graph::DependencyGraph;
use crate::internal::{ResolutionContext, WaitGraph};
use crate::key::ServiceId;
use crate::lifecycle::{LifecycleState, LifecycleTracker};
use crate::observer::{ContainerObserver, Observers};
use crate::registration::{Instance, Registry, ServiceDefinition};
use crate::traits::ResolverCore;

mod context;
mod engine;
mod teardown;

pub use context::FactoryContext;

/// Per-identifier singleton slot.
///
/// Created the moment construction is first requested, so concurrent
/// resolvers of the same identifier share one in-flight initialization.
pub(crate) type SingletonSlot = Arc<OnceCell<Instance>>;

/// The service container.
///
/// `ServiceProvider` is cheap to clone (it is an `Arc` internally) and safe to
/// share across tasks. Services are registered under explicit string
/// identifiers and resolved on demand; dependencies are validated lazily, so
/// a definition may name a dependency that is registered later.
///
/// # Examples
///
/// ```
/// use ferrous_container::{ServiceProvider, ServiceDefinition, ServiceResolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let provider = ServiceProvider::new();
/// provider.register_value("database", Database { url: "postgres://localhost".to_string() });
/// provider.register(
///     "users",
///     ServiceDefinition::new(ServiceResolver::constructor_sync(|deps| {
///         Ok(UserService { db: deps.get_as::<Database>(0)? })
///     }))
///     .depends_on("database"),
/// );
///
/// let users = provider.resolve_as::<UserService>("users").await.unwrap();
/// assert_eq!(users.db.url, "postgres://localhost");
/// # });
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    pub(crate) registry: RwLock<Registry>,
    pub(crate) singletons: Mutex<HashMap<ServiceId, SingletonSlot>>,
    pub(crate) states: LifecycleTracker,
    pub(crate) waits: WaitGraph,
    pub(crate) observers: Observers,
    pub(crate) config: ContainerConfig,
}

impl ServiceProvider {
    /// Creates an empty container with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    /// Creates an empty container bound to `config`.
    pub fn with_config(config: ContainerConfig) -> Self {
        tracing::debug!(environment = %config.environment, "creating service provider");
        Self {
            inner: Arc::new(ProviderInner {
                registry: RwLock::new(Registry::new()),
                singletons: Mutex::new(HashMap::new()),
                states: LifecycleTracker::new(),
                waits: WaitGraph::new(),
                observers: Observers::new(),
                config,
            }),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ProviderInner {
        &self.inner
    }

    /// Stores `definition` under `id`, replacing any previous registration.
    ///
    /// The lifecycle state is reset to `Registered` and a singleton cached for
    /// the old registration is dropped without running destroy hooks.
    pub fn register(&self, id: impl Into<ServiceId>, definition: ServiceDefinition) {
        let id = id.into();
        let lifetime = definition.lifetime();
        let replaced = self.inner.registry.write().insert(id.clone(), definition).is_some();
        let evicted = self.inner.singletons.lock().remove(&id).is_some();
        self.inner.states.transition(&id, LifecycleState::Registered);
        tracing::debug!(service = %id, ?lifetime, replaced, evicted, "registered service");
    }

    /// Stores a pre-built value as an initialized singleton.
    ///
    /// The resolver and all lifecycle hooks are bypassed.
    pub fn register_value<T>(&self, id: impl Into<ServiceId>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.register_instance(id, Arc::new(value));
    }

    /// Stores an already type-erased instance as an initialized singleton.
    ///
    /// Any definition previously registered under `id` is dropped, so the
    /// value is never rebuilt and no hooks run for it.
    pub fn register_instance(&self, id: impl Into<ServiceId>, instance: Instance) {
        let id = id.into();
        let replaced = self.inner.registry.write().insert_value(&id).is_some();
        self.inner
            .singletons
            .lock()
            .insert(id.clone(), Arc::new(OnceCell::new_with(Some(instance))));
        self.inner.states.set(&id, LifecycleState::Initialized);
        tracing::debug!(service = %id, replaced, "registered value");
    }

    /// Returns true if `id` has a definition or a cached instance.
    pub fn has(&self, id: impl Into<ServiceId>) -> bool {
        let id = id.into();
        self.inner.registry.read().contains(&id) || self.cached(&id).is_some()
    }

    /// All registered identifiers, in registration order.
    pub fn list(&self) -> Vec<ServiceId> {
        self.inner.registry.read().ids()
    }

    pub fn lifecycle_state(&self, id: impl Into<ServiceId>) -> Option<LifecycleState> {
        self.inner.states.get(&id.into())
    }

    /// Introspection snapshot of one registration.
    pub fn describe(&self, id: impl Into<ServiceId>) -> Option<ServiceDescriptor> {
        let id = id.into();
        let definition = self.inner.registry.read().get(&id);
        let cached = self.cached(&id).is_some();
        if definition.is_none() && !cached {
            return None;
        }
        let state = self.inner.states.get(&id);
        Some(ServiceDescriptor::new(id, definition.as_deref(), state, cached))
    }

    /// Snapshots of every registration, in registration order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.list().into_iter().filter_map(|id| self.describe(id)).collect()
    }

    /// Builds the static dependency graph of the current registrations.
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::build(&self.descriptors())
    }

    /// Resolves `id`, constructing it and its dependencies as needed.
    ///
    /// Each call starts a fresh resolution context.
    pub async fn resolve(&self, id: impl Into<ServiceId>) -> DiResult<Instance> {
        let context = ResolutionContext::with_max_depth(self.inner.config.max_resolution_depth);
        self.resolve_with(id.into(), context).await
    }

    /// Resolves `id` and downcasts the instance to `T`.
    pub async fn resolve_as<T>(&self, id: impl Into<ServiceId>) -> DiResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let id = id.into();
        let instance = self.resolve(id.clone()).await?;
        instance.downcast::<T>().map_err(|_| DiError::TypeMismatch(id))
    }

    /// Resolves `id`, mapping a missing registration for `id` itself to `None`.
    ///
    /// A missing transitive dependency is still an error.
    pub async fn resolve_optional(&self, id: impl Into<ServiceId>) -> DiResult<Option<Instance>> {
        let id = id.into();
        match self.resolve(id.clone()).await {
            Ok(instance) => Ok(Some(instance)),
            Err(DiError::NotFound(missing)) if missing == id => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Resolves each identifier independently, returning results in input order.
    ///
    /// Stops at the first failure.
    pub async fn resolve_all<I>(&self, ids: I) -> DiResult<Vec<Instance>>
    where
        I: IntoIterator,
        I::Item: Into<ServiceId>,
    {
        let ids: Vec<ServiceId> = ids.into_iter().map(Into::into).collect();
        let mut instances = Vec::with_capacity(ids.len());
        for id in ids {
            instances.push(self.resolve(id).await?);
        }
        Ok(instances)
    }

    /// Registers an observer notified of resolution and teardown events.
    pub fn add_observer(&self, observer: Arc<dyn ContainerObserver>) {
        self.inner.observers.add(observer);
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    pub fn environment(&self) -> Environment {
        self.inner.config.environment
    }

    pub fn is_feature_enabled(&self, name: &str) -> bool {
        self.inner.config.is_feature_enabled(name)
    }

    /// Returns the cached singleton for `id`, if construction has completed.
    pub(crate) fn cached(&self, id: &ServiceId) -> Option<Instance> {
        self.inner
            .singletons
            .lock()
            .get(id)
            .and_then(|slot| slot.get().cloned())
    }

    /// Identifiers with a completed singleton, sorted.
    pub(crate) fn cached_ids(&self) -> Vec<ServiceId> {
        let mut ids: Vec<ServiceId> = self
            .inner
            .singletons
            .lock()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

impl Default for ServiceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("services", &self.list())
            .field("environment", &self.inner.config.environment)
            .finish()
    }
}

#[async_trait]
impl ResolverCore for ServiceProvider {
    async fn resolve_any(&self, id: ServiceId) -> DiResult<Instance> {
        self.resolve(id).await
    }
}
