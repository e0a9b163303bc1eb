//! Call-tree scoped cycle detection.

use smallvec::SmallVec;

use crate::error::{DiError, DiResult};
use crate::key::ServiceId;

pub(crate) const DEFAULT_MAX_DEPTH: usize = 1024;

/// Identifiers currently being constructed along one resolution branch.
///
/// A fresh context is created for every top-level resolve and passed down the
/// recursive chain by value. Entering a service yields a child context, so
/// unwinding (on success or failure) simply drops the child and nothing has to
/// be popped. Unrelated concurrent resolutions never observe each other's
/// stacks.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    stack: SmallVec<[ServiceId; 8]>,
    max_depth: usize,
}

impl ResolutionContext {
    /// Creates an empty root context.
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub(crate) fn with_max_depth(max_depth: usize) -> Self {
        Self {
            stack: SmallVec::new(),
            max_depth,
        }
    }

    /// Returns a child context with `id` pushed.
    ///
    /// Fails with [`DiError::Circular`] when `id` is already on the stack. The
    /// reported path runs from the first occurrence of `id` to the top of the
    /// stack and is closed by `id` again.
    pub(crate) fn enter(&self, id: &ServiceId) -> DiResult<ResolutionContext> {
        if let Some(start) = self.stack.iter().position(|existing| existing == id) {
            let mut path: Vec<ServiceId> = self.stack[start..].to_vec();
            path.push(id.clone());
            return Err(DiError::Circular(path));
        }

        if self.stack.len() >= self.max_depth {
            return Err(DiError::DepthExceeded(self.stack.len()));
        }

        let mut child = self.clone();
        child.stack.push(id.clone());
        Ok(child)
    }

    /// In-progress identifiers, outermost first.
    pub fn path(&self) -> &[ServiceId] {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ServiceId> {
        names.iter().copied().map(ServiceId::from).collect()
    }

    #[test]
    fn test_enter_builds_path() {
        let root = ResolutionContext::new();
        let a = root.enter(&"A".into()).unwrap();
        let b = a.enter(&"B".into()).unwrap();
        assert_eq!(b.path(), ids(&["A", "B"]).as_slice());
        assert_eq!(root.depth(), 0);
        assert_eq!(b.depth(), 2);
    }

    #[test]
    fn test_cycle_path_is_closed() {
        let ctx = ResolutionContext::new()
            .enter(&"A".into()).unwrap()
            .enter(&"B".into()).unwrap()
            .enter(&"C".into()).unwrap();
        match ctx.enter(&"A".into()) {
            Err(DiError::Circular(path)) => assert_eq!(path, ids(&["A", "B", "C", "A"])),
            other => panic!("expected circular error, got {:?}", other.map(|c| c.depth())),
        }
    }

    #[test]
    fn test_cycle_path_starts_at_first_occurrence() {
        let ctx = ResolutionContext::new()
            .enter(&"root".into()).unwrap()
            .enter(&"A".into()).unwrap()
            .enter(&"B".into()).unwrap();
        let err = ctx.enter(&"A".into()).unwrap_err();
        assert_eq!(err.cycle_path().unwrap(), ids(&["A", "B", "A"]).as_slice());
    }

    #[test]
    fn test_self_reference() {
        let ctx = ResolutionContext::new().enter(&"self".into()).unwrap();
        let err = ctx.enter(&"self".into()).unwrap_err();
        assert_eq!(err.to_string(), "Circular dependency: self -> self");
    }

    #[test]
    fn test_depth_limit() {
        let mut ctx = ResolutionContext::with_max_depth(3);
        for name in ["a", "b", "c"] {
            ctx = ctx.enter(&name.into()).unwrap();
        }
        assert!(matches!(ctx.enter(&"d".into()), Err(DiError::DepthExceeded(3))));
    }
}
