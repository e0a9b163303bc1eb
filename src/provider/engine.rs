//! Resolution engine.
//!
//! Resolution of one identifier, in order:
//!
//! 1. enter the call-tree context (fails on a cycle)
//! 2. return a completed singleton from the cache
//! 3. look up the definition (fails with `NotFound`)
//!    and, for singletons, register the wait on the slot (fails on a cycle
//!    that crosses into another call tree)
//! 4. mark `Initializing`, resolve dependencies in declared order
//! 5. invoke the resolver, then `before_init` and `after_init`
//! 6. mark `Initialized`; singletons are published through their slot
//!
//! Any failure after step 3 marks the service `Error`, runs `on_error` and is
//! returned unchanged.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;

use super::{FactoryContext, ServiceProvider, SingletonSlot};
use crate::error::{DiError, DiResult};
use crate::internal::ResolutionContext;
use crate::key::ServiceId;
use crate::lifecycle::LifecycleState;
use crate::registration::{BoxFuture, Dependencies, Instance, ServiceDefinition, ServiceResolver};

impl ServiceProvider {
    /// Resolves `id` within an existing resolution context.
    ///
    /// Boxed so that resolution can recurse through dependencies and factories.
    pub(crate) fn resolve_with(
        &self,
        id: ServiceId,
        context: ResolutionContext,
    ) -> BoxFuture<'static, DiResult<Instance>> {
        let provider = self.clone();
        Box::pin(async move { provider.resolve_entry(id, context).await })
    }

    async fn resolve_entry(&self, id: ServiceId, parent: ResolutionContext) -> DiResult<Instance> {
        let context = parent.enter(&id)?;

        if let Some(instance) = self.cached(&id) {
            tracing::trace!(service = %id, "singleton cache hit");
            return Ok(instance);
        }

        let definition = self
            .inner()
            .registry
            .read()
            .get(&id)
            .ok_or_else(|| DiError::NotFound(id.clone()))?;

        if !definition.is_singleton() {
            return self.construct(&id, &definition, &context).await;
        }

        let slot = self.singleton_slot(&id);
        let _wait = self
            .inner()
            .waits
            .register_wait(parent.path(), &id)
            .map_err(|error| {
                tracing::debug!(service = %id, %error, "singleton is blocked on this branch");
                error
            })?;
        let instance = slot
            .get_or_try_init(|| self.construct(&id, &definition, &context))
            .await?;
        Ok(instance.clone())
    }

    /// Returns the slot for `id`, creating it if this is the first request.
    fn singleton_slot(&self, id: &ServiceId) -> SingletonSlot {
        self.inner()
            .singletons
            .lock()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn construct(
        &self,
        id: &ServiceId,
        definition: &ServiceDefinition,
        context: &ResolutionContext,
    ) -> DiResult<Instance> {
        let inner = self.inner();
        let epoch = inner.states.epoch();
        inner.states.transition_in(epoch, id, LifecycleState::Initializing);
        inner.observers.resolving(id);
        tracing::debug!(service = %id, depth = context.depth(), "constructing service");
        let started = Instant::now();

        let instance = match self.instantiate(definition, context).await {
            Ok(instance) => instance,
            Err(error) => return Err(self.fail(id, definition, epoch, error, None).await),
        };

        if let Err(error) = definition.hooks().run_init(&instance).await {
            return Err(self.fail(id, definition, epoch, error, Some(instance)).await);
        }

        inner.states.transition_in(epoch, id, LifecycleState::Initialized);
        inner.observers.resolved(id, started.elapsed());
        Ok(instance)
    }

    async fn instantiate(
        &self,
        definition: &ServiceDefinition,
        context: &ResolutionContext,
    ) -> DiResult<Instance> {
        let ids = definition.dependencies().to_vec();
        let mut values = Vec::with_capacity(ids.len());
        for dependency in &ids {
            values.push(self.resolve_with(dependency.clone(), context.clone()).await?);
        }
        let dependencies = Dependencies::new(ids, values);

        match definition.resolver() {
            ServiceResolver::Constructor(ctor) => ctor(dependencies).await,
            ServiceResolver::Factory(factory) => {
                factory(FactoryContext::new(self.clone(), context.clone(), dependencies)).await
            }
        }
    }

    /// Records the failure, runs `on_error`, and hands the original error back.
    async fn fail(
        &self,
        id: &ServiceId,
        definition: &ServiceDefinition,
        epoch: u64,
        error: DiError,
        instance: Option<Instance>,
    ) -> DiError {
        let inner = self.inner();
        inner.states.transition_in(epoch, id, LifecycleState::Error);
        inner.observers.failed(id, &error);
        tracing::debug!(service = %id, %error, "service construction failed");

        if let Err(hook_error) = definition.hooks().run_on_error(&error, instance).await {
            tracing::warn!(service = %id, error = %hook_error, "on_error hook failed");
        }
        error
    }
}
