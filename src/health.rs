//! Health checks for initialized services.
//!
//! A service is only checkable once it is `Initialized`. When the definition
//! carries a `health_check` hook, that hook decides; otherwise an initialized
//! service counts as healthy.

use std::time::{Duration, Instant};

use crate::error::{DiError, DiResult};
use crate::key::ServiceId;
use crate::lifecycle::LifecycleState;
use crate::provider::ServiceProvider;

/// Health check result for a single service.
#[derive(Debug, Clone)]
pub struct HealthResult {
    /// The service that was checked
    pub id: ServiceId,
    /// Whether the check passed
    pub healthy: bool,
    /// Error message if the check failed
    pub error: Option<String>,
    /// Time taken for the check
    pub duration: Duration,
}

impl HealthResult {
    fn from_outcome(id: ServiceId, outcome: DiResult<()>, duration: Duration) -> Self {
        match outcome {
            Ok(()) => Self {
                id,
                healthy: true,
                error: None,
                duration,
            },
            Err(error) => Self {
                id,
                healthy: false,
                error: Some(error.to_string()),
                duration,
            },
        }
    }
}

/// Health of every cached singleton.
#[derive(Debug, Clone, Default)]
pub struct HealthReport {
    /// Individual service results, sorted by identifier
    pub services: Vec<HealthResult>,
    /// Total time taken for all checks
    pub total_duration: Duration,
}

impl HealthReport {
    pub fn all_healthy(&self) -> bool {
        self.services.iter().all(|r| r.healthy)
    }

    pub fn healthy_count(&self) -> usize {
        self.services.iter().filter(|r| r.healthy).count()
    }

    pub fn failures(&self) -> Vec<&HealthResult> {
        self.services.iter().filter(|r| !r.healthy).collect()
    }
}

impl ServiceProvider {
    /// Checks the health of one service.
    ///
    /// Fails with [`DiError::NotReady`] unless the service is `Initialized`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_container::{DiError, LifecycleHooks, ServiceDefinition, ServiceProvider, ServiceResolver};
    ///
    /// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
    /// let provider = ServiceProvider::new();
    /// provider.register(
    ///     "pool",
    ///     ServiceDefinition::new(ServiceResolver::constructor_sync(|_| Ok(4usize)))
    ///         .with_hooks(LifecycleHooks::new().health_check(|instance| async move {
    ///             match instance.downcast_ref::<usize>() {
    ///                 Some(size) if *size > 0 => Ok(()),
    ///                 _ => Err(DiError::msg("empty pool")),
    ///             }
    ///         })),
    /// );
    ///
    /// assert!(matches!(provider.check_health("pool").await, Err(DiError::NotReady { .. })));
    /// provider.resolve("pool").await.unwrap();
    /// assert!(provider.check_health("pool").await.is_ok());
    /// # });
    /// ```
    pub async fn check_health(&self, id: impl Into<ServiceId>) -> DiResult<()> {
        let id = id.into();
        let inner = self.inner();
        let state = inner.states.get(&id);
        if state != Some(LifecycleState::Initialized) {
            return Err(DiError::NotReady { id, state });
        }

        let Some(instance) = self.cached(&id) else {
            return Ok(());
        };
        let definition = inner.registry.read().get(&id);
        match definition {
            Some(definition) => definition.hooks().run_health_check(&instance).await,
            None => Ok(()),
        }
    }

    /// Checks every cached singleton.
    pub async fn health_report(&self) -> HealthReport {
        let start = Instant::now();
        let mut services = Vec::new();
        for id in self.cached_ids() {
            let checked = Instant::now();
            let outcome = self.check_health(id.clone()).await;
            services.push(HealthResult::from_outcome(id, outcome, checked.elapsed()));
        }

        let report = HealthReport {
            services,
            total_duration: start.elapsed(),
        };
        tracing::debug!(
            checked = report.services.len(),
            healthy = report.healthy_count(),
            "health report complete"
        );
        report
    }
}
