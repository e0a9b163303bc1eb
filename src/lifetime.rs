//! Service lifetime definitions.

/// Service lifetimes controlling instance caching behavior
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{Lifetime, ServiceDefinition, ServiceResolver};
///
/// let definition = ServiceDefinition::new(ServiceResolver::constructor_sync(|_| Ok(1u32)));
/// assert_eq!(definition.lifetime(), Lifetime::Singleton);
///
/// let definition = definition.transient();
/// assert_eq!(definition.lifetime(), Lifetime::Transient);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Lifetime {
    /// Single instance per container, cached until destroyed
    ///
    /// The container owns the instance and hands out shared references.
    /// Concurrent first resolutions share one construction.
    #[default]
    Singleton,
    /// New instance per resolution, never cached
    ///
    /// Ownership moves to the caller immediately; the container keeps no
    /// reference and runs the resolver on every call.
    Transient,
}

impl Lifetime {
    /// Returns true for [`Lifetime::Singleton`].
    pub fn is_singleton(self) -> bool {
        matches!(self, Lifetime::Singleton)
    }
}
