//! Context handed to factory resolvers.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::ServiceProvider;
use crate::config::Environment;
use crate::error::{DiError, DiResult};
use crate::internal::ResolutionContext;
use crate::key::ServiceId;
use crate::registration::{Dependencies, Instance};
use crate::traits::ResolverCore;

/// Context passed to factory functions.
///
/// Carries the declared dependencies, already resolved, and a handle back to
/// the provider. Services resolved through the context join the same call
/// tree as the factory itself, so a factory that asks for a service that is
/// still being built on its own branch gets a circular dependency error
/// instead of waiting forever.
///
/// # Examples
///
/// ```
/// use ferrous_container::{Resolver, ServiceDefinition, ServiceProvider, ServiceResolver};
///
/// struct Database { url: String }
/// struct UserService { db_url: String, cache_enabled: bool }
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let provider = ServiceProvider::new();
/// provider.register_value("database", Database { url: "postgres://localhost".to_string() });
/// provider.register_value("cache_enabled", true);
/// provider.register(
///     "users",
///     ServiceDefinition::new(ServiceResolver::factory(|ctx| async move {
///         let db = ctx.dependency_as::<Database>(0)?;
///         let cache_enabled = ctx.get_as::<bool>("cache_enabled").await?;
///         Ok(UserService { db_url: db.url.clone(), cache_enabled: *cache_enabled })
///     }))
///     .depends_on("database"),
/// );
///
/// let users = provider.resolve_as::<UserService>("users").await.unwrap();
/// assert_eq!(users.db_url, "postgres://localhost");
/// assert!(users.cache_enabled);
/// # });
/// ```
#[derive(Clone)]
pub struct FactoryContext {
    provider: ServiceProvider,
    context: ResolutionContext,
    dependencies: Dependencies,
}

impl FactoryContext {
    pub(crate) fn new(
        provider: ServiceProvider,
        context: ResolutionContext,
        dependencies: Dependencies,
    ) -> Self {
        Self {
            provider,
            context,
            dependencies,
        }
    }

    /// Declared dependencies, resolved in declaration order.
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Downcasts the declared dependency at `index`.
    pub fn dependency_as<T>(&self, index: usize) -> DiResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.dependencies.get_as(index)
    }

    /// Identifiers being constructed on this branch, outermost first.
    ///
    /// The last entry is the service this factory is building.
    pub fn path(&self) -> &[ServiceId] {
        self.context.path()
    }

    /// Resolves another service inside the current call tree.
    pub async fn resolve(&self, id: impl Into<ServiceId>) -> DiResult<Instance> {
        self.provider.resolve_with(id.into(), self.context.clone()).await
    }

    pub async fn resolve_as<T>(&self, id: impl Into<ServiceId>) -> DiResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let id = id.into();
        let instance = self.resolve(id.clone()).await?;
        instance.downcast::<T>().map_err(|_| DiError::TypeMismatch(id))
    }

    pub fn environment(&self) -> Environment {
        self.provider.environment()
    }

    pub fn is_feature_enabled(&self, name: &str) -> bool {
        self.provider.is_feature_enabled(name)
    }
}

impl fmt::Debug for FactoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryContext")
            .field("path", &self.context.path())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

#[async_trait]
impl ResolverCore for FactoryContext {
    async fn resolve_any(&self, id: ServiceId) -> DiResult<Instance> {
        self.resolve(id).await
    }
}
