//! # ferrous-container
//!
//! Async service container keyed by explicit string identifiers, with
//! singleton caching, lifecycle hooks and call-tree cycle detection.
//!
//! ## Features
//!
//! - **Explicit identifiers**: every service is registered under a string id
//! - **Two resolver kinds**: constructors receive resolved dependencies, factories can also resolve more services
//! - **Single construction**: concurrent first resolves of a singleton share one in-flight construction
//! - **Circular dependency detection**: per call tree, with the full cycle path in the error
//! - **Lifecycle hooks**: init, destroy, error and health callbacks with observable state
//! - **Graph diagnostics**: cycle enumeration, missing dependency checks, DOT/Mermaid export
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_container::{DiError, ServiceDefinition, ServiceProvider, ServiceResolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let provider = ServiceProvider::new();
//! provider.register(
//!     "database",
//!     ServiceDefinition::new(ServiceResolver::constructor(|_| async {
//!         Ok(Database { connection_string: "postgres://localhost".to_string() })
//!     })),
//! );
//! provider.register(
//!     "users",
//!     ServiceDefinition::new(ServiceResolver::constructor_sync(|deps| {
//!         Ok(UserService { db: deps.get_as::<Database>(0)? })
//!     }))
//!     .transient()
//!     .depends_on("database"),
//! );
//!
//! let users = provider.resolve_as::<UserService>("users").await?;
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//!
//! // Transient services are rebuilt, their singleton dependencies are shared.
//! let again = provider.resolve_as::<UserService>("users").await?;
//! assert!(!Arc::ptr_eq(&users, &again));
//! assert!(Arc::ptr_eq(&users.db, &again.db));
//! # Ok::<(), DiError>(())
//! # }).unwrap();
//! ```
//!
//! ## Circular Dependencies
//!
//! ```rust
//! use ferrous_container::{DiError, ServiceDefinition, ServiceProvider, ServiceResolver};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let provider = ServiceProvider::new();
//! for (id, dep) in [("A", "B"), ("B", "C"), ("C", "A")] {
//!     provider.register(id, ServiceDefinition::new(ServiceResolver::constructor_sync(|_| Ok(()))).depends_on(dep));
//! }
//!
//! let err = provider.resolve("A").await.unwrap_err();
//! assert_eq!(err.to_string(), "Circular dependency: A -> B -> C -> A");
//! # });
//! ```

pub mod config;
pub mod descriptors;
pub mod error;
pub mod graph;
pub mod graph_export;
pub mod health;
pub mod key;
pub mod lifecycle;
pub mod lifetime;
pub mod observer;
pub mod provider;
pub mod registration;
pub mod traits;

mod internal;

pub use config::{
    ConfigProvider, ConfigSource, ConfigValue, ContainerConfig, Environment, EnvironmentConfigSource,
    MapConfigSource,
};
#[cfg(feature = "config")]
pub use config::JsonConfigSource;
pub use descriptors::ServiceDescriptor;
pub use error::{DiError, DiResult};
pub use graph::{DependencyGraph, GraphAnalysis, GraphNode};
pub use graph_export::{DefaultGraphExporter, ExportFormat, ExportOptions, GraphExporter};
pub use health::{HealthReport, HealthResult};
pub use key::ServiceId;
pub use lifecycle::{ErrorHook, InstanceHook, LifecycleHooks, LifecycleState};
pub use lifetime::Lifetime;
pub use observer::{ContainerObserver, TracingObserver};
pub use provider::{FactoryContext, ServiceProvider};
pub use registration::{
    BoxFuture, ConstructorFn, Dependencies, FactoryFn, Instance, Metadata, ResolverKind, ServiceDefinition,
    ServiceResolver,
};
pub use traits::{Resolver, ResolverCore};
