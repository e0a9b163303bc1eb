//! Diagnostic observers for container events.
//!
//! Observers are notified synchronously from inside the resolution engine,
//! so implementations should be cheap and must not block.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::DiError;
use crate::key::ServiceId;

/// Observer of resolution and teardown events.
///
/// Only constructions are reported; singleton cache hits are silent.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{ContainerObserver, DiError, ServiceId, ServiceProvider};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct CountingObserver { built: AtomicUsize }
///
/// impl ContainerObserver for CountingObserver {
///     fn resolving(&self, _id: &ServiceId) {}
///     fn resolved(&self, _id: &ServiceId, _duration: Duration) {
///         self.built.fetch_add(1, Ordering::Relaxed);
///     }
///     fn failed(&self, _id: &ServiceId, _error: &DiError) {}
/// }
///
/// let provider = ServiceProvider::new();
/// provider.add_observer(Arc::new(CountingObserver::default()));
/// ```
pub trait ContainerObserver: Send + Sync {
    /// Called when construction of a service begins.
    fn resolving(&self, id: &ServiceId);

    /// Called after the resolver and init hooks completed.
    ///
    /// `duration` covers dependency resolution, construction and hooks.
    fn resolved(&self, id: &ServiceId, duration: Duration);

    /// Called when construction failed, before `on_error` runs.
    fn failed(&self, id: &ServiceId, error: &DiError);

    /// Called after a cached instance was destroyed and evicted.
    fn destroyed(&self, id: &ServiceId) {
        let _ = id;
    }
}

/// Observer that forwards every event to `tracing`.
///
/// Constructions are logged at `debug`, failures at `warn`.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    _private: (),
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContainerObserver for TracingObserver {
    fn resolving(&self, id: &ServiceId) {
        tracing::debug!(service = %id, "resolving");
    }

    fn resolved(&self, id: &ServiceId, duration: Duration) {
        tracing::debug!(service = %id, ?duration, "resolved");
    }

    fn failed(&self, id: &ServiceId, error: &DiError) {
        tracing::warn!(service = %id, %error, "resolution failed");
    }

    fn destroyed(&self, id: &ServiceId) {
        tracing::debug!(service = %id, "destroyed");
    }
}

/// Registered observers, notified in registration order.
#[derive(Default)]
pub(crate) struct Observers {
    observers: RwLock<Vec<Arc<dyn ContainerObserver>>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, observer: Arc<dyn ContainerObserver>) {
        self.observers.write().push(observer);
    }

    /// Clones the list so no lock is held while observers run.
    fn snapshot(&self) -> Vec<Arc<dyn ContainerObserver>> {
        self.observers.read().clone()
    }

    #[inline]
    pub(crate) fn resolving(&self, id: &ServiceId) {
        for observer in self.snapshot() {
            observer.resolving(id);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, id: &ServiceId, duration: Duration) {
        for observer in self.snapshot() {
            observer.resolved(id, duration);
        }
    }

    #[inline]
    pub(crate) fn failed(&self, id: &ServiceId, error: &DiError) {
        for observer in self.snapshot() {
            observer.failed(id, error);
        }
    }

    #[inline]
    pub(crate) fn destroyed(&self, id: &ServiceId) {
        for observer in self.snapshot() {
            observer.destroyed(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ContainerObserver for Recorder {
        fn resolving(&self, id: &ServiceId) {
            self.events.lock().push(format!("resolving {id}"));
        }

        fn resolved(&self, id: &ServiceId, _duration: Duration) {
            self.events.lock().push(format!("resolved {id}"));
        }

        fn failed(&self, id: &ServiceId, error: &DiError) {
            self.events.lock().push(format!("failed {id}: {error}"));
        }
    }

    #[test]
    fn test_observers_notified_in_order() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let observers = Observers::new();
        observers.add(first.clone());
        observers.add(second.clone());

        let id = ServiceId::from("db");
        observers.resolving(&id);
        observers.failed(&id, &DiError::msg("down"));
        observers.destroyed(&id);

        let expected = vec!["resolving db".to_string(), "failed db: down".to_string()];
        assert_eq!(*first.events.lock(), expected);
        assert_eq!(*second.events.lock(), expected);
    }
}
