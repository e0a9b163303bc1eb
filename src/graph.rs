//! Static dependency graph analysis.
//!
//! The graph is a read-only view rebuilt from the registrations on demand.
//! It only sees declared dependencies, never identifiers a factory resolves
//! dynamically, so resolution keeps its own cycle check and does not consult
//! this module.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::descriptors::ServiceDescriptor;
use crate::key::{join_path, ServiceId};
use crate::lifecycle::LifecycleState;
use crate::lifetime::Lifetime;
use crate::registration::{Metadata, ResolverKind};

/// One registered service in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphNode {
    pub id: ServiceId,
    pub lifetime: Lifetime,
    /// `None` for value registrations
    pub resolver_kind: Option<ResolverKind>,
    /// Declared dependencies, in declaration order
    pub dependencies: Vec<ServiceId>,
    /// Registered services that declare this one as a dependency, sorted
    pub dependents: Vec<ServiceId>,
    pub metadata: Metadata,
    pub state: Option<LifecycleState>,
}

/// Dependency graph snapshot: nodes keyed by id plus the edge mapping
/// (id to the set of ids it depends on).
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{ServiceDefinition, ServiceId, ServiceProvider, ServiceResolver};
///
/// let provider = ServiceProvider::new();
/// let unit = || ServiceResolver::constructor_sync(|_| Ok(()));
/// provider.register("a", ServiceDefinition::new(unit()).depends_on("b"));
/// provider.register("b", ServiceDefinition::new(unit()).depends_on("c"));
/// provider.register("c", ServiceDefinition::new(unit()).depends_on("a"));
///
/// let graph = provider.dependency_graph();
/// let cycles = graph.detect_cycles();
/// assert_eq!(cycles.len(), 1);
/// let path: Vec<&str> = cycles[0].iter().map(ServiceId::as_str).collect();
/// assert_eq!(path, ["a", "b", "c", "a"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<ServiceId, GraphNode>,
    edges: BTreeMap<ServiceId, BTreeSet<ServiceId>>,
}

impl DependencyGraph {
    /// Builds the graph from registration snapshots.
    pub fn build(descriptors: &[ServiceDescriptor]) -> Self {
        let mut nodes = BTreeMap::new();
        let mut edges = BTreeMap::new();

        for descriptor in descriptors {
            edges.insert(
                descriptor.id.clone(),
                descriptor.dependencies.iter().cloned().collect::<BTreeSet<_>>(),
            );
            nodes.insert(
                descriptor.id.clone(),
                GraphNode {
                    id: descriptor.id.clone(),
                    lifetime: descriptor.lifetime,
                    resolver_kind: descriptor.resolver_kind,
                    dependencies: descriptor.dependencies.clone(),
                    dependents: Vec::new(),
                    metadata: descriptor.metadata.clone(),
                    state: descriptor.state,
                },
            );
        }

        // Transpose. Outer iteration is sorted, so each dependents list is too.
        for (id, deps) in &edges {
            for dep in deps {
                if let Some(node) = nodes.get_mut(dep) {
                    node.dependents.push(id.clone());
                }
            }
        }

        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Nodes in identifier order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &BTreeMap<ServiceId, BTreeSet<ServiceId>> {
        &self.edges
    }

    pub fn dependents(&self, id: &str) -> &[ServiceId] {
        self.nodes.get(id).map(|node| node.dependents.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finds every cycle reachable by depth-first traversal.
    ///
    /// Each cycle is returned closed: it starts and ends with the same id.
    /// Traversal continues after a hit, so independent cycles are all
    /// reported. Cycles sharing nodes with an already explored region may be
    /// reported only once.
    pub fn detect_cycles(&self) -> Vec<Vec<ServiceId>> {
        let mut cycles = Vec::new();
        let mut visited = BTreeSet::new();
        let mut on_stack = BTreeSet::new();

        for root in self.nodes.keys() {
            if !visited.insert(root.clone()) {
                continue;
            }
            on_stack.insert(root.clone());
            let mut stack = vec![(root.clone(), self.dependencies_of(root))];

            while let Some((_, deps)) = stack.last_mut() {
                let Some(dep) = deps.next() else {
                    if let Some((id, _)) = stack.pop() {
                        on_stack.remove(&id);
                    }
                    continue;
                };

                if on_stack.contains(dep) {
                    if let Some(start) = stack.iter().position(|(id, _)| id == dep) {
                        let mut cycle: Vec<ServiceId> = stack[start..].iter().map(|(id, _)| id.clone()).collect();
                        cycle.push(dep.clone());
                        cycles.push(cycle);
                    }
                } else if visited.insert(dep.clone()) {
                    on_stack.insert(dep.clone());
                    stack.push((dep.clone(), self.dependencies_of(dep)));
                }
            }
        }
        cycles
    }

    fn dependencies_of<'a>(&'a self, id: &ServiceId) -> impl Iterator<Item = &'a ServiceId> + 'a {
        self.edges.get(id).into_iter().flatten()
    }

    /// Orders `ids` so that each one precedes everything it depends on,
    /// directly or transitively.
    ///
    /// Ids unknown to the graph are treated as having no dependencies.
    /// Members of a cycle come out in a stable but otherwise arbitrary order.
    pub fn teardown_order(&self, ids: &[ServiceId]) -> Vec<ServiceId> {
        let wanted: BTreeSet<ServiceId> = ids.iter().cloned().collect();
        let mut visited = BTreeSet::new();
        let mut post_order = Vec::with_capacity(wanted.len());

        for root in &wanted {
            if !visited.insert(root.clone()) {
                continue;
            }
            let mut stack = vec![(root.clone(), self.dependencies_of(root))];
            while let Some((_, deps)) = stack.last_mut() {
                match deps.next() {
                    Some(dep) => {
                        if visited.insert(dep.clone()) {
                            stack.push((dep.clone(), self.dependencies_of(dep)));
                        }
                    }
                    None => {
                        if let Some((id, _)) = stack.pop() {
                            post_order.push(id);
                        }
                    }
                }
            }
        }

        post_order.retain(|id| wanted.contains(id));
        post_order.reverse();
        post_order
    }

    /// Summarizes the graph for reports and pre-flight validation.
    pub fn analyze(&self) -> GraphAnalysis {
        let mut missing_dependencies = Vec::new();
        for (id, deps) in &self.edges {
            for dep in deps {
                if !self.nodes.contains_key(dep) {
                    missing_dependencies.push((id.clone(), dep.clone()));
                }
            }
        }

        GraphAnalysis {
            service_count: self.nodes.len(),
            dependency_count: self.edges.values().map(BTreeSet::len).sum(),
            leaf_services: self
                .nodes()
                .filter(|node| node.dependencies.is_empty())
                .map(|node| node.id.clone())
                .collect(),
            root_services: self
                .nodes()
                .filter(|node| node.dependents.is_empty())
                .map(|node| node.id.clone())
                .collect(),
            missing_dependencies,
            circular_dependencies: self.detect_cycles(),
        }
    }

    /// Renders the declared dependencies of `root` as an indented tree.
    ///
    /// Ids already on the current branch are marked circular and not
    /// expanded again; unregistered ids are marked missing.
    pub fn render_tree(&self, root: &str) -> String {
        let mut out = String::new();
        let root = ServiceId::from(root);
        let mut on_branch = BTreeSet::new();
        let mut branch = Vec::new();

        if let Some(deps) = self.render_line(&root, 0, false, &mut out) {
            on_branch.insert(root.clone());
            branch.push((root, deps.iter()));
        }

        while let Some((_, deps)) = branch.last_mut() {
            let Some(dep) = deps.next() else {
                if let Some((id, _)) = branch.pop() {
                    on_branch.remove(&id);
                }
                continue;
            };

            let circular = on_branch.contains(dep);
            if let Some(deps) = self.render_line(dep, branch.len(), circular, &mut out) {
                on_branch.insert(dep.clone());
                branch.push((dep.clone(), deps.iter()));
            }
        }
        out
    }

    /// Writes one tree line and returns the dependencies to expand beneath it.
    fn render_line(&self, id: &ServiceId, depth: usize, circular: bool, out: &mut String) -> Option<&[ServiceId]> {
        let indent = "  ".repeat(depth);

        if circular {
            out.push_str(&format!("{indent}└─ {id} (circular reference)\n"));
            return None;
        }

        let Some(node) = self.nodes.get(id) else {
            out.push_str(&format!("{indent}└─ {id} (missing)\n"));
            return None;
        };

        let lifetime = match (node.resolver_kind, node.lifetime) {
            (None, _) => "value",
            (Some(_), Lifetime::Singleton) => "singleton",
            (Some(_), Lifetime::Transient) => "transient",
        };
        out.push_str(&format!("{indent}└─ {id} [{lifetime}]\n"));
        Some(&node.dependencies)
    }
}

/// Analysis results for the dependency graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphAnalysis {
    pub service_count: usize,
    /// Distinct (service, dependency) edges
    pub dependency_count: usize,
    /// Services with no dependencies
    pub leaf_services: Vec<ServiceId>,
    /// Services nothing else depends on
    pub root_services: Vec<ServiceId>,
    /// (service, dependency) pairs whose dependency is not registered
    pub missing_dependencies: Vec<(ServiceId, ServiceId)>,
    /// Closed cycle paths
    pub circular_dependencies: Vec<Vec<ServiceId>>,
}

impl GraphAnalysis {
    /// True when every declared dependency exists and there are no cycles.
    pub fn is_resolvable(&self) -> bool {
        self.missing_dependencies.is_empty() && self.circular_dependencies.is_empty()
    }
}

impl fmt::Display for GraphAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dependency Graph Analysis")?;
        writeln!(f, "========================")?;
        writeln!(f, "Services: {}", self.service_count)?;
        writeln!(f, "Dependencies: {}", self.dependency_count)?;
        writeln!(f, "Leaf Services: {}", self.leaf_services.len())?;
        writeln!(f, "Root Services: {}", self.root_services.len())?;
        writeln!(f, "Missing Dependencies: {}", self.missing_dependencies.len())?;
        writeln!(f, "Circular Dependencies: {}", self.circular_dependencies.len())?;

        if !self.missing_dependencies.is_empty() {
            writeln!(f, "\nMissing Dependencies:")?;
            for (service, dependency) in &self.missing_dependencies {
                writeln!(f, "  - {service} needs {dependency}")?;
            }
        }

        if !self.circular_dependencies.is_empty() {
            writeln!(f, "\nCircular Dependencies Found:")?;
            for (i, cycle) in self.circular_dependencies.iter().enumerate() {
                writeln!(f, "  {}: {}", i + 1, join_path(cycle))?;
            }
        }

        Ok(())
    }
}
