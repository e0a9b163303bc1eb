//! Cross-tree deadlock detection for in-flight singletons.
//!
//! The per-branch [`ResolutionContext`](super::ResolutionContext) only sees
//! its own call tree. When two trees enter one cycle from different ends,
//! each ends up awaiting a singleton slot the other is constructing. Every
//! slot await is therefore recorded here as "this branch is blocked on that
//! slot", and a new wait is refused if the existing waits lead from the
//! requested slot back into the requesting branch.
//!
//! A branch whose path contains `S` is part of `S`'s construction, so `S`
//! cannot complete until that branch does. Following waits from slot to slot
//! through such branches finds every slot the requested one transitively
//! waits for.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use parking_lot::Mutex;

use crate::error::{DiError, DiResult};
use crate::key::ServiceId;

#[derive(Debug, Default)]
pub(crate) struct WaitGraph {
    table: Mutex<WaitTable>,
}

#[derive(Debug, Default)]
struct WaitTable {
    next_token: u64,
    waits: BTreeMap<u64, Wait>,
}

#[derive(Debug)]
struct Wait {
    /// Path of the blocked branch, excluding the awaited slot
    path: Vec<ServiceId>,
    slot: ServiceId,
}

impl WaitGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records that the branch at `path` is about to await `slot`.
    ///
    /// Fails with [`DiError::Circular`] if `slot` already waits, directly or
    /// through other branches, on a service being built along `path`. The
    /// returned guard removes the record when dropped.
    pub(crate) fn register_wait(&self, path: &[ServiceId], slot: &ServiceId) -> DiResult<WaitGuard<'_>> {
        let mut table = self.table.lock();
        if let Some(cycle) = table.find_cycle(path, slot) {
            return Err(DiError::Circular(cycle));
        }

        let token = table.next_token;
        table.next_token = table.next_token.wrapping_add(1);
        table.waits.insert(
            token,
            Wait {
                path: path.to_vec(),
                slot: slot.clone(),
            },
        );
        Ok(WaitGuard { graph: self, token })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.lock().waits.len()
    }
}

impl WaitTable {
    /// Breadth-first walk from `slot` through recorded waits. Each queued
    /// entry carries the ids traversed so far, which become the middle of the
    /// reported cycle.
    fn find_cycle(&self, path: &[ServiceId], slot: &ServiceId) -> Option<Vec<ServiceId>> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([(slot.clone(), Vec::new())]);

        while let Some((current, trail)) = queue.pop_front() {
            if let Some(start) = path.iter().position(|id| *id == current) {
                let mut cycle = path[start..].to_vec();
                cycle.extend(trail);
                cycle.push(current);
                return Some(cycle);
            }
            if !seen.insert(current.clone()) {
                continue;
            }

            for wait in self.waits.values() {
                if let Some(at) = wait.path.iter().position(|id| *id == current) {
                    let mut next = trail.clone();
                    next.extend_from_slice(&wait.path[at..]);
                    queue.push_back((wait.slot.clone(), next));
                }
            }
        }
        None
    }
}

/// Removes its wait record on drop, including when the awaiting future is cancelled.
pub(crate) struct WaitGuard<'a> {
    graph: &'a WaitGraph,
    token: u64,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        self.graph.table.lock().waits.remove(&self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ServiceId> {
        names.iter().copied().map(ServiceId::from).collect()
    }

    #[test]
    fn test_unrelated_waits_are_allowed() {
        let graph = WaitGraph::new();
        let _left = graph.register_wait(&ids(&["left"]), &"shared".into()).unwrap();
        let _right = graph.register_wait(&ids(&["right"]), &"shared".into()).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_crossing_waits_form_a_cycle() {
        let graph = WaitGraph::new();
        let _a = graph.register_wait(&ids(&["A"]), &"B".into()).unwrap();

        match graph.register_wait(&ids(&["B"]), &"A".into()) {
            Err(DiError::Circular(path)) => assert_eq!(path, ids(&["B", "A", "B"])),
            other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
        }
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_cycle_through_intermediate_branches() {
        let graph = WaitGraph::new();
        let _a = graph.register_wait(&ids(&["A", "X"]), &"B".into()).unwrap();
        let _b = graph.register_wait(&ids(&["B"]), &"C".into()).unwrap();

        let err = graph.register_wait(&ids(&["root", "C"]), &"A".into()).map(|_| ()).unwrap_err();
        assert_eq!(err.cycle_path().unwrap(), ids(&["C", "A", "X", "B", "C"]).as_slice());
    }

    #[test]
    fn test_guard_drop_releases_wait() {
        let graph = WaitGraph::new();
        {
            let _a = graph.register_wait(&ids(&["A"]), &"B".into()).unwrap();
        }
        assert_eq!(graph.len(), 0);
        assert!(graph.register_wait(&ids(&["B"]), &"A".into()).is_ok());
    }
}
