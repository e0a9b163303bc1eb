//! Error types for the service container.

use std::sync::Arc;

use thiserror::Error;

use crate::key::{join_path, ServiceId};
use crate::lifecycle::LifecycleState;

/// Service container errors
///
/// Errors are `Clone` because a single in-flight singleton construction may be
/// awaited by several callers, each of which receives the same outcome.
/// Failures raised by resolvers and lifecycle hooks travel through the
/// container unchanged.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{DiError, ServiceId};
///
/// let not_found = DiError::NotFound(ServiceId::from("mailer"));
/// assert_eq!(not_found.to_string(), "Service not found: mailer");
///
/// let circular = DiError::Circular(vec!["A".into(), "B".into(), "A".into()]);
/// assert_eq!(circular.to_string(), "Circular dependency: A -> B -> A");
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// No definition and no cached value for the identifier
    #[error("Service not found: {0}")]
    NotFound(ServiceId),
    /// Circular dependency detected (path starts and ends with the same id)
    #[error("Circular dependency: {}", join_path(.0))]
    Circular(Vec<ServiceId>),
    /// Instance could not be downcast to the requested type
    #[error("Type mismatch for: {0}")]
    TypeMismatch(ServiceId),
    /// Maximum resolution depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// Operation requires an initialized service
    #[error("Service {id} is not ready (state: {state:?})")]
    NotReady {
        id: ServiceId,
        state: Option<LifecycleState>,
    },
    /// Failure raised by a resolver or lifecycle hook
    #[error("{0}")]
    Service(Arc<dyn std::error::Error + Send + Sync>),
    /// Failure described by a plain message
    #[error("{0}")]
    Message(String),
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),
    /// Graph export failed
    #[error("Export error: {0}")]
    Export(String),
}

impl DiError {
    /// Wraps an arbitrary error raised by user code.
    pub fn service<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DiError::Service(Arc::new(error))
    }

    /// Creates an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        DiError::Message(message.into())
    }

    /// Returns the cycle path if this is a circular dependency error.
    pub fn cycle_path(&self) -> Option<&[ServiceId]> {
        match self {
            DiError::Circular(path) => Some(path),
            _ => None,
        }
    }
}

/// Result type for container operations
pub type DiResult<T> = Result<T, DiError>;
