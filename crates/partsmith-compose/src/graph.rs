//! Diagnostic dependency graph built with `petgraph`.
//!
//! A read-only projection of a composition: parts become nodes and every
//! satisfying export becomes an edge. Used for visualization and for
//! computing an activation order; resolution never consults it.

use std::fmt;

use partsmith_common::error::{CompositionError, Result};
use partsmith_common::types::{PartId, Sharing};
use petgraph::dot::Dot;
use petgraph::graph::NodeIndex;

use crate::composition::Composition;

/// A part as shown in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// Part identity.
    pub id: PartId,
    /// Lifetime policy of the part.
    pub sharing: Sharing,
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.sharing)
    }
}

/// A dependency graph of parts.
#[derive(Debug)]
pub struct CompositionGraph {
    /// Internal petgraph representation, edges labelled by import site.
    graph: petgraph::Graph<GraphNode, String>,
}

impl CompositionGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: petgraph::Graph::new(),
        }
    }

    /// Projects every part and satisfier edge of a composition.
    #[must_use]
    pub fn from_composition(composition: &Composition) -> Self {
        let mut graph = Self::new();
        let nodes: Vec<NodeIndex> = composition
            .catalog()
            .parts()
            .iter()
            .map(|p| graph.add_part(p.id.clone(), p.sharing.clone()))
            .collect();

        for part in composition.parts() {
            for (import, exports) in part.bindings() {
                let name = &composition.catalog().import(import).name;
                for export in exports {
                    graph.add_dependency(nodes[part.part()], nodes[export.part], name.clone());
                }
            }
        }
        graph
    }

    /// Adds a part node to the graph.
    pub fn add_part(&mut self, id: PartId, sharing: Sharing) -> NodeIndex {
        self.graph.add_node(GraphNode { id, sharing })
    }

    /// Adds a dependency edge: `dependent` imports from `dependency`.
    ///
    /// The graph edge points from `dependency` to `dependent`
    /// so that topological sort yields dependencies first.
    pub fn add_dependency(
        &mut self,
        dependent: NodeIndex,
        dependency: NodeIndex,
        import: impl Into<String>,
    ) {
        let _ = self.graph.add_edge(dependency, dependent, import.into());
    }

    /// Returns the number of part nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of satisfier edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns an order in which parts can be activated.
    ///
    /// Dependencies appear before the parts that import them.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles, which valid
    /// compositions may do through shared parts.
    pub fn activation_order(&self) -> Result<Vec<PartId>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&idx| self.graph.node_weight(idx).map(|n| n.id.clone()))
                .collect()),
            Err(cycle) => Err(CompositionError::CyclicGraph {
                part: self.graph[cycle.node_id()].id.clone(),
            }),
        }
    }

    /// Renders the graph in Graphviz DOT format.
    #[must_use]
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::with_config(&self.graph, &[]))
            .replacen("digraph {", "digraph composition {", 1)
    }
}

impl Default for CompositionGraph {
    fn default() -> Self {
        Self::new()
    }
}
