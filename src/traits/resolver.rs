//! Resolver traits for service resolution.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{DiError, DiResult};
use crate::key::ServiceId;
use crate::registration::Instance;

/// Object-safe resolution entry point.
///
/// Implemented by [`ServiceProvider`](crate::ServiceProvider), which starts a
/// fresh resolution context per call, and by
/// [`FactoryContext`](crate::FactoryContext), which continues the context of
/// the service currently being built so cycles through factories are caught.
#[async_trait]
pub trait ResolverCore: Send + Sync {
    /// Resolves a single service by identifier.
    ///
    /// # Returns
    ///
    /// * `Ok(Instance)` - The resolved service as `Arc<dyn Any>`
    /// * `Err(DiError)` - Not found, circular, or a construction failure
    async fn resolve_any(&self, id: ServiceId) -> DiResult<Instance>;
}

/// Convenience methods layered on [`ResolverCore`].
///
/// Code that only needs to look services up can be written once against
/// `R: Resolver` and used both at the top level and inside factories.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{Resolver, ServiceProvider, DiResult};
/// use std::sync::Arc;
///
/// async fn port<R: Resolver>(resolver: &R) -> DiResult<u16> {
///     let port = resolver.get_as::<u16>("port").await?;
///     Ok(*port)
/// }
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let provider = ServiceProvider::new();
/// provider.register_value("port", 8080u16);
/// assert_eq!(port(&provider).await.unwrap(), 8080);
/// # });
/// ```
#[async_trait]
pub trait Resolver: ResolverCore {
    /// Resolves `id` as a type-erased instance.
    async fn get(&self, id: &str) -> DiResult<Instance> {
        self.resolve_any(ServiceId::from(id)).await
    }

    /// Resolves `id` and downcasts it to `T`.
    async fn get_as<T>(&self, id: &str) -> DiResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let id = ServiceId::from(id);
        let instance = self.resolve_any(id.clone()).await?;
        instance.downcast::<T>().map_err(|_| DiError::TypeMismatch(id))
    }

    /// Resolves `id`, mapping a missing registration for `id` itself to `None`.
    ///
    /// Missing transitive dependencies are still reported as errors.
    async fn get_optional(&self, id: &str) -> DiResult<Option<Instance>> {
        let id = ServiceId::from(id);
        match self.resolve_any(id.clone()).await {
            Ok(instance) => Ok(Some(instance)),
            Err(DiError::NotFound(missing)) if missing == id => Ok(None),
            Err(error) => Err(error),
        }
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
