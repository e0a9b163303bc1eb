//! Destroying cached singletons.

use super::ServiceProvider;
use crate::error::DiResult;
use crate::key::ServiceId;
use crate::lifecycle::LifecycleState;

impl ServiceProvider {
    /// Runs the destroy hooks of a cached singleton and evicts it.
    ///
    /// A no-op when `id` has no cached instance. The instance is evicted
    /// regardless of hook outcome; the first hook error is returned afterwards.
    /// The definition stays registered, so a later resolve builds a fresh
    /// instance. A value registration has no definition and disappears from
    /// [`list`](Self::list) once destroyed.
    pub async fn destroy(&self, id: impl Into<ServiceId>) -> DiResult<()> {
        self.destroy_cached(&id.into()).await
    }

    /// Destroys every cached singleton, dependents before their dependencies,
    /// then clears the registry.
    ///
    /// Continues past hook failures and returns the first one. Constructions
    /// still in flight are not waited for: their callers get the instance,
    /// but it is not cached and leaves no lifecycle state behind.
    pub async fn destroy_all(&self) -> DiResult<()> {
        let cached = self.cached_ids();
        let order = self.dependency_graph().teardown_order(&cached);
        tracing::debug!(services = order.len(), "destroying container");

        let mut first_error = None;
        for id in &order {
            if let Err(error) = self.destroy_cached(id).await {
                first_error.get_or_insert(error);
            }
        }

        let inner = self.inner();
        inner.registry.write().clear();
        inner.singletons.lock().clear();
        inner.states.clear();

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn destroy_cached(&self, id: &ServiceId) -> DiResult<()> {
        let Some(instance) = self.cached(id) else {
            tracing::trace!(service = %id, "nothing to destroy");
            return Ok(());
        };

        let inner = self.inner();
        inner.states.transition(id, LifecycleState::Destroying);
        let definition = inner.registry.read().get(id);

        let outcome = match &definition {
            Some(definition) => definition.hooks().run_destroy(&instance).await,
            None => Ok(()),
        };

        inner.singletons.lock().remove(id);
        if definition.is_none() {
            inner.registry.write().untrack_value(id);
        }
        inner.states.transition(id, LifecycleState::Destroyed);
        inner.observers.destroyed(id);

        if let Err(error) = &outcome {
            tracing::warn!(service = %id, %error, "destroy hook failed");
        }
        outcome
    }
}
