//! Dependency graph used while compiling a job.
//!
//! Tasks are nodes keyed by name; an edge `a -> b` means `b` waits for `a`.
//! Edges are checked for cycles as they are added.

use crate::error::{Error, Result};
use petgraph::algo::{has_path_connecting, is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Add a task node. Adding an existing name returns the existing node.
    pub fn add_task(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.index.get(name) {
            return index;
        }
        let index = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), index);
        index
    }

    /// Record that `to` depends on `from`.
    ///
    /// # Errors
    /// - `UnresolvedDependency` if either name is unknown
    /// - `Cycle` (naming `to`) if the edge would close a cycle; the edge is
    ///   not kept
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<()> {
        let unresolved = |missing: &str| Error::UnresolvedDependency {
            task: to.to_string(),
            dependency: missing.to_string(),
        };
        let from_index = *self.index.get(from).ok_or_else(|| unresolved(from))?;
        let to_index = *self.index.get(to).ok_or_else(|| unresolved(to))?;

        let edge = self.graph.add_edge(from_index, to_index, ());
        if is_cyclic_directed(&self.graph) {
            self.graph.remove_edge(edge);
            return Err(Error::Cycle(to.to_string()));
        }
        Ok(())
    }

    /// Whether `to` is reachable from `from` along dependency edges.
    /// A task reaches itself.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => has_path_connecting(&self.graph, a, b, None),
            _ => false,
        }
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Task names ordered so every task follows its dependencies.
    pub fn topological_order(&self) -> Result<Vec<&str>> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            let name = self
                .graph
                .node_weight(cycle.node_id())
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            Error::Cycle(name)
        })?;

        Ok(sorted
            .into_iter()
            .filter_map(|index| self.graph.node_weight(index).map(String::as_str))
            .collect())
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
