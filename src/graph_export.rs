//! Graph export for dependency visualization.
//!
//! DOT and Mermaid output are always available. JSON and YAML require the
//! `graph-export` feature.

use std::collections::BTreeSet;

#[cfg(feature = "graph-export")]
use serde::Serialize;

use crate::error::{DiError, DiResult};
use crate::graph::{DependencyGraph, GraphNode};
use crate::key::ServiceId;
use crate::lifetime::Lifetime;
use crate::provider::ServiceProvider;

/// Export formats supported for dependency graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// DOT format for Graphviz visualization
    Dot,
    /// Mermaid format for documentation
    Mermaid,
    /// JSON format for web UIs and APIs
    Json,
    /// YAML format for human-readable output
    Yaml,
}

/// Graph export configuration options.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Include lifecycle state in node labels
    pub include_state: bool,
    /// Include metadata in JSON/YAML nodes
    pub include_metadata: bool,
    /// Outline services that sit on a dependency cycle
    pub highlight_cycles: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_state: false,
            include_metadata: true,
            highlight_cycles: true,
        }
    }
}

/// Graph exporter for generating dependency visualizations.
pub trait GraphExporter {
    /// Exports the dependency graph in the specified format.
    fn export(&self, graph: &DependencyGraph, format: ExportFormat, options: &ExportOptions) -> DiResult<String>;
}

/// Default graph exporter implementation.
///
/// # Examples
///
/// ```rust
/// use ferrous_container::{
///     DefaultGraphExporter, ExportFormat, ExportOptions, GraphExporter, ServiceDefinition,
///     ServiceProvider, ServiceResolver,
/// };
///
/// let provider = ServiceProvider::new();
/// provider.register_value("db", ());
/// provider.register(
///     "api",
///     ServiceDefinition::new(ServiceResolver::constructor_sync(|_| Ok(()))).depends_on("db"),
/// );
///
/// let dot = DefaultGraphExporter
///     .export(&provider.dependency_graph(), ExportFormat::Dot, &ExportOptions::default())
///     .unwrap();
/// assert!(dot.contains("\"api\" -> \"db\";"));
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultGraphExporter;

impl GraphExporter for DefaultGraphExporter {
    fn export(&self, graph: &DependencyGraph, format: ExportFormat, options: &ExportOptions) -> DiResult<String> {
        match format {
            ExportFormat::Dot => Ok(self.export_dot(graph, options)),
            ExportFormat::Mermaid => Ok(self.export_mermaid(graph, options)),
            ExportFormat::Json => self.export_json(graph, options),
            ExportFormat::Yaml => self.export_yaml(graph, options),
        }
    }
}

fn cycle_members(graph: &DependencyGraph, options: &ExportOptions) -> BTreeSet<ServiceId> {
    if !options.highlight_cycles {
        return BTreeSet::new();
    }
    graph.detect_cycles().into_iter().flatten().collect()
}

fn kind_label(node: &GraphNode) -> &'static str {
    match (node.resolver_kind, node.lifetime) {
        (None, _) => "value",
        (Some(_), Lifetime::Singleton) => "singleton",
        (Some(_), Lifetime::Transient) => "transient",
    }
}

fn dot_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Mermaid node ids must be plain identifiers.
fn mermaid_id(id: &ServiceId) -> String {
    id.as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

impl DefaultGraphExporter {
    fn export_dot(&self, graph: &DependencyGraph, options: &ExportOptions) -> String {
        let cyclic = cycle_members(graph, options);
        let mut output = String::new();
        output.push_str("digraph DependencyGraph {\n");
        output.push_str("  rankdir=TB;\n");
        output.push_str("  node [shape=box];\n\n");

        for node in graph.nodes() {
            let color = match kind_label(node) {
                "value" => "lightgrey",
                "singleton" => "lightblue",
                _ => "lightyellow",
            };
            let mut label = format!("{}\\n({})", dot_escape(node.id.as_str()), kind_label(node));
            if options.include_state {
                if let Some(state) = node.state {
                    label.push_str(&format!("\\n{state:?}"));
                }
            }
            let outline = if cyclic.contains(&node.id) { ", color=red, penwidth=2" } else { "" };

            output.push_str(&format!(
                "  \"{}\" [label=\"{}\", fillcolor={}, style=filled{}];\n",
                dot_escape(node.id.as_str()),
                label,
                color,
                outline
            ));
        }

        output.push('\n');

        for (from, deps) in graph.edges() {
            for to in deps {
                output.push_str(&format!("  \"{}\" -> \"{}\";\n", dot_escape(from.as_str()), dot_escape(to.as_str())));
            }
        }

        output.push_str("}\n");
        output
    }

    fn export_mermaid(&self, graph: &DependencyGraph, options: &ExportOptions) -> String {
        let cyclic = cycle_members(graph, options);
        let mut output = String::new();
        output.push_str("graph TD\n");

        for node in graph.nodes() {
            output.push_str(&format!("  {}[\"{}\"]\n", mermaid_id(&node.id), node.id.as_str().replace('"', "'")));
        }

        for (from, deps) in graph.edges() {
            for to in deps {
                output.push_str(&format!("  {} --> {}\n", mermaid_id(from), mermaid_id(to)));
            }
        }

        output.push_str("\n  classDef singleton fill:#e1f5fe\n");
        output.push_str("  classDef transient fill:#fff3e0\n");
        output.push_str("  classDef value fill:#eeeeee\n");
        output.push_str("  classDef cyclic stroke:#d32f2f,stroke-width:2px\n");

        for node in graph.nodes() {
            output.push_str(&format!("  class {} {}\n", mermaid_id(&node.id), kind_label(node)));
            if cyclic.contains(&node.id) {
                output.push_str(&format!("  class {} cyclic\n", mermaid_id(&node.id)));
            }
        }

        output
    }

    #[cfg(feature = "graph-export")]
    fn export_json(&self, graph: &DependencyGraph, options: &ExportOptions) -> DiResult<String> {
        serde_json::to_string_pretty(&GraphDocument::new(graph, options))
            .map_err(|e| DiError::Export(format!("JSON serialization failed: {e}")))
    }

    #[cfg(feature = "graph-export")]
    fn export_yaml(&self, graph: &DependencyGraph, options: &ExportOptions) -> DiResult<String> {
        serde_yaml::to_string(&GraphDocument::new(graph, options))
            .map_err(|e| DiError::Export(format!("YAML serialization failed: {e}")))
    }

    #[cfg(not(feature = "graph-export"))]
    fn export_json(&self, _graph: &DependencyGraph, _options: &ExportOptions) -> DiResult<String> {
        Err(DiError::Export("JSON export requires the `graph-export` feature".to_string()))
    }

    #[cfg(not(feature = "graph-export"))]
    fn export_yaml(&self, _graph: &DependencyGraph, _options: &ExportOptions) -> DiResult<String> {
        Err(DiError::Export("YAML export requires the `graph-export` feature".to_string()))
    }
}

#[cfg(feature = "graph-export")]
#[derive(Serialize)]
struct GraphDocument {
    metadata: ExportMetadata,
    nodes: Vec<GraphNode>,
    edges: Vec<ExportEdge>,
    cycles: Vec<Vec<ServiceId>>,
}

#[cfg(feature = "graph-export")]
#[derive(Serialize)]
struct ExportMetadata {
    service_count: usize,
    edge_count: usize,
    exported_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(feature = "graph-export")]
#[derive(Serialize)]
struct ExportEdge {
    from: ServiceId,
    to: ServiceId,
}

#[cfg(feature = "graph-export")]
impl GraphDocument {
    fn new(graph: &DependencyGraph, options: &ExportOptions) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| {
                let mut node = node.clone();
                if !options.include_metadata {
                    node.metadata.clear();
                }
                if !options.include_state {
                    node.state = None;
                }
                node
            })
            .collect();
        let edges: Vec<ExportEdge> = graph
            .edges()
            .iter()
            .flat_map(|(from, deps)| {
                deps.iter().map(move |to| ExportEdge {
                    from: from.clone(),
                    to: to.clone(),
                })
            })
            .collect();

        Self {
            metadata: ExportMetadata {
                service_count: graph.len(),
                edge_count: edges.len(),
                exported_at: chrono::Utc::now(),
            },
            nodes,
            edges,
            cycles: graph.detect_cycles(),
        }
    }
}

impl ServiceProvider {
    /// Exports the current dependency graph with default options.
    pub fn export_graph(&self, format: ExportFormat) -> DiResult<String> {
        DefaultGraphExporter.export(&self.dependency_graph(), format, &ExportOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::{ServiceDefinition, ServiceResolver};

    fn provider() -> ServiceProvider {
        let provider = ServiceProvider::new();
        let unit = || ServiceResolver::constructor_sync(|_| Ok(()));
        provider.register_value("config", 1u8);
        provider.register("http.client", ServiceDefinition::new(unit()).depends_on("config"));
        provider.register("a", ServiceDefinition::new(unit()).transient().depends_on("b"));
        provider.register("b", ServiceDefinition::new(unit()).depends_on("a"));
        provider
    }

    #[test]
    fn test_dot_marks_cycles_and_kinds() {
        let dot = provider().export_graph(ExportFormat::Dot).unwrap();
        assert!(dot.starts_with("digraph DependencyGraph {"));
        assert!(dot.contains("\"http.client\" -> \"config\";"));
        assert!(dot.contains("\"config\" [label=\"config\\n(value)\", fillcolor=lightgrey, style=filled];"));
        assert!(dot.contains("\"a\" [label=\"a\\n(transient)\", fillcolor=lightyellow, style=filled, color=red, penwidth=2];"));
    }

    #[test]
    fn test_mermaid_sanitizes_ids() {
        let mermaid = provider().export_graph(ExportFormat::Mermaid).unwrap();
        assert!(mermaid.contains("  http_client[\"http.client\"]\n"));
        assert!(mermaid.contains("  http_client --> config\n"));
        assert!(mermaid.contains("  class a cyclic\n"));
        assert!(!mermaid.contains("  class config cyclic\n"));
    }

    #[cfg(not(feature = "graph-export"))]
    #[test]
    fn test_structured_formats_need_feature() {
        assert!(matches!(provider().export_graph(ExportFormat::Json), Err(DiError::Export(_))));
        assert!(matches!(provider().export_graph(ExportFormat::Yaml), Err(DiError::Export(_))));
    }

    #[cfg(feature = "graph-export")]
    #[test]
    fn test_json_document_shape() {
        let json = provider().export_graph(ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["service_count"], 4);
        assert_eq!(value["metadata"]["edge_count"], 3);
        assert_eq!(value["cycles"][0], serde_json::json!(["a", "b", "a"]));
    }
}
