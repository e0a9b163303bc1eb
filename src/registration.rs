//! Service definitions and the registry that stores them.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::key::ServiceId;
use crate::lifecycle::LifecycleHooks;
use crate::lifetime::Lifetime;
use crate::provider::FactoryContext;

/// Boxed future used by resolvers and hooks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Type-erased service instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Free-form annotations attached to a definition. Never interpreted by the container.
pub type Metadata = BTreeMap<String, String>;

/// Constructor-style resolver: receives the resolved dependencies in declared order.
pub type ConstructorFn = Arc<dyn Fn(Dependencies) -> BoxFuture<'static, DiResult<Instance>> + Send + Sync>;

/// Factory-style resolver: receives a context that also resolves further services.
pub type FactoryFn = Arc<dyn Fn(FactoryContext) -> BoxFuture<'static, DiResult<Instance>> + Send + Sync>;

/// Resolved dependency values, positional in declaration order.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{ServiceProvider, ServiceDefinition, ServiceResolver};
///
/// struct Config { port: u16 }
/// struct Server { port: u16 }
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let provider = ServiceProvider::new();
/// provider.register_value("config", Config { port: 8080 });
/// provider.register(
///     "server",
///     ServiceDefinition::new(ServiceResolver::constructor_sync(|deps| {
///         let config = deps.get_as::<Config>(0)?;
///         Ok(Server { port: config.port })
///     }))
///     .depends_on("config"),
/// );
///
/// let server = provider.resolve_as::<Server>("server").await.unwrap();
/// assert_eq!(server.port, 8080);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct Dependencies {
    ids: Vec<ServiceId>,
    values: Vec<Instance>,
}

impl Dependencies {
    pub(crate) fn new(ids: Vec<ServiceId>, values: Vec<Instance>) -> Self {
        debug_assert_eq!(ids.len(), values.len());
        Self { ids, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the instance at `index`.
    pub fn get(&self, index: usize) -> Option<&Instance> {
        self.values.get(index)
    }

    /// Returns the identifier declared at `index`.
    pub fn id(&self, index: usize) -> Option<&ServiceId> {
        self.ids.get(index)
    }

    /// Downcasts the instance at `index` to `T`.
    pub fn get_as<T>(&self, index: usize) -> DiResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let instance = self
            .values
            .get(index)
            .ok_or_else(|| DiError::msg(format!("no dependency at position {index}")))?;
        instance
            .clone()
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(self.ids[index].clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ServiceId, &Instance)> {
        self.ids.iter().zip(self.values.iter())
    }

    pub fn into_vec(self) -> Vec<Instance> {
        self.values
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies").field("ids", &self.ids).finish()
    }
}

/// Which kind of resolver a definition carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResolverKind {
    Constructor,
    Factory,
}

/// How a service is built, chosen explicitly at registration.
#[derive(Clone)]
pub enum ServiceResolver {
    /// Called with the positional dependency values only
    Constructor(ConstructorFn),
    /// Called with a [`FactoryContext`] that can resolve more services
    Factory(FactoryFn),
}

fn erase<T: Any + Send + Sync>(value: T) -> Instance {
    Arc::new(value)
}

impl ServiceResolver {
    /// Async constructor.
    pub fn constructor<T, F, Fut>(ctor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        ServiceResolver::Constructor(Arc::new(move |deps| -> BoxFuture<'static, DiResult<Instance>> {
            let fut = ctor(deps);
            Box::pin(async move { fut.await.map(erase) })
        }))
    }

    /// Synchronous constructor.
    pub fn constructor_sync<T, F>(ctor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Dependencies) -> DiResult<T> + Send + Sync + 'static,
    {
        ServiceResolver::Constructor(Arc::new(move |deps| -> BoxFuture<'static, DiResult<Instance>> {
            let result = ctor(deps).map(erase);
            Box::pin(async move { result })
        }))
    }

    /// Async factory.
    pub fn factory<T, F, Fut>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(FactoryContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        ServiceResolver::Factory(Arc::new(move |ctx| -> BoxFuture<'static, DiResult<Instance>> {
            let fut = factory(ctx);
            Box::pin(async move { fut.await.map(erase) })
        }))
    }

    /// Synchronous factory. It sees the declared dependencies but cannot
    /// await further resolutions.
    pub fn factory_sync<T, F>(factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&FactoryContext) -> DiResult<T> + Send + Sync + 'static,
    {
        ServiceResolver::Factory(Arc::new(move |ctx| -> BoxFuture<'static, DiResult<Instance>> {
            let result = factory(&ctx).map(erase);
            Box::pin(async move { result })
        }))
    }

    pub fn kind(&self) -> ResolverKind {
        match self {
            ServiceResolver::Constructor(_) => ResolverKind::Constructor,
            ServiceResolver::Factory(_) => ResolverKind::Factory,
        }
    }
}

impl fmt::Debug for ServiceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceResolver::{:?}", self.kind())
    }
}

/// Declarative description of how to build one service.
///
/// Singleton by default. Dependencies are resolved in the order they were
/// declared; duplicates and self-references are accepted here and surface as
/// circular dependency errors at resolution time.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{LifecycleHooks, ServiceDefinition, ServiceResolver, ResolverKind};
///
/// let definition = ServiceDefinition::new(ServiceResolver::constructor_sync(|_| Ok(String::from("repo"))))
///     .depends_on("database")
///     .depends_on("logger")
///     .with_hooks(LifecycleHooks::new().after_init(|_| async { Ok(()) }))
///     .with_metadata("version", "1.2.0");
///
/// assert_eq!(definition.resolver_kind(), ResolverKind::Constructor);
/// assert_eq!(definition.dependencies().len(), 2);
/// assert_eq!(definition.metadata().get("version").map(String::as_str), Some("1.2.0"));
/// ```
#[derive(Clone, Debug)]
pub struct ServiceDefinition {
    resolver: ServiceResolver,
    lifetime: Lifetime,
    dependencies: Vec<ServiceId>,
    hooks: LifecycleHooks,
    metadata: Metadata,
}

impl ServiceDefinition {
    pub fn new(resolver: ServiceResolver) -> Self {
        Self {
            resolver,
            lifetime: Lifetime::Singleton,
            dependencies: Vec::new(),
            hooks: LifecycleHooks::default(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Shorthand for `with_lifetime(Lifetime::Transient)`.
    pub fn transient(self) -> Self {
        self.with_lifetime(Lifetime::Transient)
    }

    pub fn depends_on(mut self, id: impl Into<ServiceId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn with_dependencies<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ServiceId>,
    {
        self.dependencies.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn resolver(&self) -> &ServiceResolver {
        &self.resolver
    }

    pub fn resolver_kind(&self) -> ResolverKind {
        self.resolver.kind()
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn is_singleton(&self) -> bool {
        self.lifetime.is_singleton()
    }

    pub fn dependencies(&self) -> &[ServiceId] {
        &self.dependencies
    }

    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// Definitions keyed by identifier, plus registration order for listing.
///
/// Value registrations have an entry in `order` but no definition.
#[derive(Default)]
pub(crate) struct Registry {
    definitions: HashMap<ServiceId, Arc<ServiceDefinition>>,
    order: Vec<ServiceId>,
    tracked: HashSet<ServiceId>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `definition`, replacing any previous one for `id`.
    pub(crate) fn insert(&mut self, id: ServiceId, definition: ServiceDefinition) -> Option<Arc<ServiceDefinition>> {
        self.track(&id);
        self.definitions.insert(id, Arc::new(definition))
    }

    /// Records `id` as a value registration, dropping any definition it had.
    pub(crate) fn insert_value(&mut self, id: &ServiceId) -> Option<Arc<ServiceDefinition>> {
        self.track(id);
        self.definitions.remove(id)
    }

    fn track(&mut self, id: &ServiceId) {
        if self.tracked.insert(id.clone()) {
            self.order.push(id.clone());
        }
    }

    /// Forgets a value-only identifier. Identifiers with a definition are kept.
    pub(crate) fn untrack_value(&mut self, id: &ServiceId) {
        if !self.definitions.contains_key(id) && self.tracked.remove(id) {
            self.order.retain(|existing| existing != id);
        }
    }

    pub(crate) fn get(&self, id: &ServiceId) -> Option<Arc<ServiceDefinition>> {
        self.definitions.get(id).cloned()
    }

    pub(crate) fn contains(&self, id: &ServiceId) -> bool {
        self.definitions.contains_key(id)
    }

    pub(crate) fn ids(&self) -> Vec<ServiceId> {
        self.order.clone()
    }

    pub(crate) fn clear(&mut self) {
        self.definitions.clear();
        self.order.clear();
        self.tracked.clear();
    }
}
