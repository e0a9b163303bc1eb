//! Service descriptors for introspection and diagnostics.

use crate::key::ServiceId;
use crate::lifecycle::LifecycleState;
use crate::lifetime::Lifetime;
use crate::registration::{Metadata, ResolverKind, ServiceDefinition};

/// Service descriptor for introspection and diagnostics
///
/// A point-in-time snapshot of one registration. Value registrations have no
/// resolver and no declared dependencies.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{Lifetime, LifecycleState, ResolverKind, ServiceDefinition, ServiceProvider, ServiceResolver};
///
/// let provider = ServiceProvider::new();
/// provider.register_value("config", 42u32);
/// provider.register(
///     "repository",
///     ServiceDefinition::new(ServiceResolver::constructor_sync(|_| Ok(())))
///         .transient()
///         .depends_on("config")
///         .with_metadata("tier", "data"),
/// );
///
/// let repository = provider.describe("repository").unwrap();
/// assert_eq!(repository.lifetime, Lifetime::Transient);
/// assert_eq!(repository.resolver_kind, Some(ResolverKind::Constructor));
/// assert_eq!(repository.state, Some(LifecycleState::Registered));
/// assert!(!repository.cached);
///
/// let config = provider.describe("config").unwrap();
/// assert!(config.is_value());
/// assert!(config.cached);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceDescriptor {
    pub id: ServiceId,
    pub lifetime: Lifetime,
    /// `None` for value registrations
    pub resolver_kind: Option<ResolverKind>,
    pub dependencies: Vec<ServiceId>,
    pub metadata: Metadata,
    pub state: Option<LifecycleState>,
    /// Whether a singleton instance is currently cached
    pub cached: bool,
}

impl ServiceDescriptor {
    pub(crate) fn new(
        id: ServiceId,
        definition: Option<&ServiceDefinition>,
        state: Option<LifecycleState>,
        cached: bool,
    ) -> Self {
        match definition {
            Some(definition) => Self {
                id,
                lifetime: definition.lifetime(),
                resolver_kind: Some(definition.resolver_kind()),
                dependencies: definition.dependencies().to_vec(),
                metadata: definition.metadata().clone(),
                state,
                cached,
            },
            None => Self {
                id,
                lifetime: Lifetime::Singleton,
                resolver_kind: None,
                dependencies: Vec::new(),
                metadata: Metadata::new(),
                state,
                cached,
            },
        }
    }

    /// Returns true if the service was registered as a pre-built value.
    pub fn is_value(&self) -> bool {
        self.resolver_kind.is_none()
    }

    pub fn is_singleton(&self) -> bool {
        self.lifetime.is_singleton()
    }
}
