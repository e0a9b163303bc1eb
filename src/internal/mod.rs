//! Internal implementation details.

pub(crate) mod context;
pub(crate) mod waits;

pub(crate) use context::ResolutionContext;
pub(crate) use context::DEFAULT_MAX_DEPTH;
pub(crate) use waits::WaitGraph;
