//! Lifecycle states and hooks for registered services.
//!
//! Every registered identifier carries one [`LifecycleState`]. Hooks are
//! optional async callbacks attached to a definition and run by the
//! resolution engine at fixed points of construction and teardown.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{DiError, DiResult};
use crate::key::ServiceId;
use crate::registration::{BoxFuture, Instance};

/// Lifecycle state of a registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LifecycleState {
    Registered,
    Initializing,
    Initialized,
    Destroying,
    Destroyed,
    Error,
}

impl LifecycleState {
    /// Returns true if moving from `self` to `next` is an expected transition.
    ///
    /// Re-registration may reset any state to `Registered`. Construction may
    /// restart after a failure, after teardown, or for transient services that
    /// are built on every resolve.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (_, Registered) => true,
            (Registered | Initialized | Error | Destroyed | Initializing, Initializing) => true,
            (Initializing, Initialized | Error) => true,
            (Initialized, Destroying) => true,
            (Destroying, Destroyed) => true,
            _ => false,
        }
    }

    /// Returns true once construction finished successfully.
    pub fn is_ready(self) -> bool {
        self == LifecycleState::Initialized
    }
}

/// Hook receiving the service instance.
pub type InstanceHook = Arc<dyn Fn(Instance) -> BoxFuture<'static, DiResult<()>> + Send + Sync>;

/// Hook receiving the construction error and the instance, if one was built.
pub type ErrorHook =
    Arc<dyn Fn(DiError, Option<Instance>) -> BoxFuture<'static, DiResult<()>> + Send + Sync>;

/// Optional lifecycle callbacks for one service definition.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::LifecycleHooks;
///
/// let hooks = LifecycleHooks::new()
///     .before_init(|_instance| async { Ok(()) })
///     .on_error(|error, _instance| async move {
///         eprintln!("construction failed: {error}");
///         Ok(())
///     });
/// assert!(hooks.has_on_error());
/// ```
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    before_init: Option<InstanceHook>,
    after_init: Option<InstanceHook>,
    before_destroy: Option<InstanceHook>,
    after_destroy: Option<InstanceHook>,
    on_error: Option<ErrorHook>,
    health_check: Option<InstanceHook>,
}

fn instance_hook<F, Fut>(hook: F) -> InstanceHook
where
    F: Fn(Instance) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DiResult<()>> + Send + 'static,
{
    Arc::new(move |instance| -> BoxFuture<'static, DiResult<()>> { Box::pin(hook(instance)) })
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs right after the resolver produced the instance.
    pub fn before_init<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Instance) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<()>> + Send + 'static,
    {
        self.before_init = Some(instance_hook(hook));
        self
    }

    /// Runs after `before_init` completed.
    pub fn after_init<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Instance) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<()>> + Send + 'static,
    {
        self.after_init = Some(instance_hook(hook));
        self
    }

    pub fn before_destroy<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Instance) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<()>> + Send + 'static,
    {
        self.before_destroy = Some(instance_hook(hook));
        self
    }

    pub fn after_destroy<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Instance) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<()>> + Send + 'static,
    {
        self.after_destroy = Some(instance_hook(hook));
        self
    }

    /// Runs when construction fails, before the error reaches the caller.
    ///
    /// The instance is `None` when the failure happened before the resolver
    /// returned. An error returned by this hook is logged and discarded; the
    /// caller always sees the original failure.
    pub fn on_error<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(DiError, Option<Instance>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<()>> + Send + 'static,
    {
        self.on_error = Some(Arc::new(move |error, instance| -> BoxFuture<'static, DiResult<()>> {
            Box::pin(hook(error, instance))
        }));
        self
    }

    /// Decides the outcome of health checks for an initialized instance.
    pub fn health_check<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Instance) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<()>> + Send + 'static,
    {
        self.health_check = Some(instance_hook(hook));
        self
    }

    pub fn has_on_error(&self) -> bool {
        self.on_error.is_some()
    }

    pub fn has_health_check(&self) -> bool {
        self.health_check.is_some()
    }

    /// Runs `before_init` then `after_init`, each awaited before the next.
    pub(crate) async fn run_init(&self, instance: &Instance) -> DiResult<()> {
        if let Some(hook) = &self.before_init {
            hook(instance.clone()).await?;
        }
        if let Some(hook) = &self.after_init {
            hook(instance.clone()).await?;
        }
        Ok(())
    }

    /// Runs both destroy hooks and returns the first failure.
    ///
    /// `after_destroy` still runs when `before_destroy` fails.
    pub(crate) async fn run_destroy(&self, instance: &Instance) -> DiResult<()> {
        let before = match &self.before_destroy {
            Some(hook) => hook(instance.clone()).await,
            None => Ok(()),
        };
        let after = match &self.after_destroy {
            Some(hook) => hook(instance.clone()).await,
            None => Ok(()),
        };
        before.and(after)
    }

    pub(crate) async fn run_on_error(&self, error: &DiError, instance: Option<Instance>) -> DiResult<()> {
        match &self.on_error {
            Some(hook) => hook(error.clone(), instance).await,
            None => Ok(()),
        }
    }

    pub(crate) async fn run_health_check(&self, instance: &Instance) -> DiResult<()> {
        match &self.health_check {
            Some(hook) => hook(instance.clone()).await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("before_init", &self.before_init.is_some())
            .field("after_init", &self.after_init.is_some())
            .field("before_destroy", &self.before_destroy.is_some())
            .field("after_destroy", &self.after_destroy.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("health_check", &self.health_check.is_some())
            .finish()
    }
}

/// Per-identifier lifecycle state table.
///
/// The epoch advances on every [`clear`](Self::clear). Constructions record
/// the epoch they started in and their late transitions are dropped once the
/// table has been cleared underneath them.
#[derive(Debug, Default)]
pub(crate) struct LifecycleTracker {
    table: RwLock<StateTable>,
}

#[derive(Debug, Default)]
struct StateTable {
    states: HashMap<ServiceId, LifecycleState>,
    epoch: u64,
}

impl StateTable {
    fn transition(&mut self, id: &ServiceId, next: LifecycleState) -> Option<LifecycleState> {
        let previous = self.states.insert(id.clone(), next);
        if let Some(from) = previous {
            if !from.can_transition_to(next) {
                tracing::warn!(service = %id, ?from, to = ?next, "unexpected lifecycle transition");
            }
        }
        tracing::trace!(service = %id, from = ?previous, to = ?next, "lifecycle transition");
        previous
    }
}

impl LifecycleTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, id: &ServiceId) -> Option<LifecycleState> {
        self.table.read().states.get(id).copied()
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.table.read().epoch
    }

    /// Moves `id` to `next`, returning the previous state.
    pub(crate) fn transition(&self, id: &ServiceId, next: LifecycleState) -> Option<LifecycleState> {
        self.table.write().transition(id, next)
    }

    /// Like [`transition`](Self::transition), but only while the table is
    /// still in `epoch`. Returns false if the transition was dropped.
    pub(crate) fn transition_in(&self, epoch: u64, id: &ServiceId, next: LifecycleState) -> bool {
        let mut table = self.table.write();
        if table.epoch != epoch {
            tracing::trace!(service = %id, to = ?next, "container cleared during construction");
            return false;
        }
        table.transition(id, next);
        true
    }

    /// Overwrites the state of `id` without checking the transition.
    pub(crate) fn set(&self, id: &ServiceId, state: LifecycleState) {
        self.table.write().states.insert(id.clone(), state);
    }

    pub(crate) fn clear(&self) {
        let mut table = self.table.write();
        table.states.clear();
        table.epoch = table.epoch.wrapping_add(1);
    }
}
