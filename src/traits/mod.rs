//! Core traits for the service container.

mod resolver;

pub use resolver::{Resolver, ResolverCore};
