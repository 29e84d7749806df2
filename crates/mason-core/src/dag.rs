//! Dependency graph building, validation, and scheduling order.

use crate::error::{CoreError, CoreResult};
use crate::node::Node;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A directed acyclic graph of node dependencies, keyed by unique id.
#[derive(Debug)]
pub struct DependencyGraph {
    /// The underlying graph
    graph: DiGraph<String, ()>,

    /// Map from unique id to node index
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Add a node to the graph, returning its index (idempotent).
    fn add_node_id(&mut self, unique_id: &str) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(unique_id) {
            idx
        } else {
            let idx = self.graph.add_node(unique_id.to_string());
            self.node_map.insert(unique_id.to_string(), idx);
            idx
        }
    }

    /// Build the graph from a parsed node registry.
    ///
    /// Edges run from dependency to dependent so that topological sort
    /// yields dependencies first. A reference to a node id absent from the
    /// registry is a fatal compile error, as is any cycle.
    pub fn build(nodes: &BTreeMap<String, Node>) -> CoreResult<Self> {
        let mut dag = Self::new();

        for unique_id in nodes.keys() {
            dag.add_node_id(unique_id);
        }

        for (unique_id, node) in nodes {
            for dep in &node.depends_on.nodes {
                if !nodes.contains_key(dep) {
                    return Err(CoreError::UnknownReference {
                        node: unique_id.clone(),
                        target: dep.clone(),
                    });
                }
                let dep_idx = dag.add_node_id(dep);
                let node_idx = dag.add_node_id(unique_id);
                dag.graph.add_edge(dep_idx, node_idx, ());
            }
        }

        dag.validate()?;

        Ok(dag)
    }

    /// Validate the graph has no cycles.
    pub fn validate(&self) -> CoreResult<()> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => {
                let cycle_str = self.find_cycle_path(cycle.node_id());
                Err(CoreError::CircularDependency { cycle: cycle_str })
            }
        }
    }

    /// Find a cycle path starting from a node for error reporting.
    fn find_cycle_path(&self, start: NodeIndex) -> String {
        let mut path: Vec<String> = vec![self.graph[start].clone()];
        let mut current = start;
        let mut visited = HashSet::new();
        visited.insert(current);

        while let Some(edge) = self.graph.edges(current).next() {
            let target = edge.target();
            path.push(self.graph[target].clone());

            if target == start || visited.contains(&target) {
                break;
            }

            visited.insert(target);
            current = target;
        }

        path.join(" -> ")
    }

    /// Nodes in topological order (dependencies first).
    pub fn topological_order(&self) -> CoreResult<Vec<String>> {
        match toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .into_iter()
                .map(|idx| self.graph[idx].clone())
                .collect()),
            Err(cycle) => {
                let cycle_str = self.find_cycle_path(cycle.node_id());
                Err(CoreError::CircularDependency { cycle: cycle_str })
            }
        }
    }

    /// Group nodes into execution levels: every node's dependencies live in
    /// strictly earlier levels, so nodes within a level may run concurrently.
    pub fn execution_levels(&self) -> CoreResult<Vec<Vec<String>>> {
        let order = self.topological_order()?;
        let mut level_of: HashMap<String, usize> = HashMap::new();
        let mut levels: Vec<Vec<String>> = Vec::new();

        for unique_id in order {
            let level = self
                .dependencies(&unique_id)
                .iter()
                .filter_map(|dep| level_of.get(dep))
                .max()
                .map(|deepest| deepest + 1)
                .unwrap_or(0);

            if levels.len() <= level {
                levels.push(Vec::new());
            }
            levels[level].push(unique_id.clone());
            level_of.insert(unique_id, level);
        }

        Ok(levels)
    }

    /// Direct dependencies of a node.
    pub fn dependencies(&self, unique_id: &str) -> Vec<String> {
        if let Some(&idx) = self.node_map.get(unique_id) {
            self.graph
                .edges_directed(idx, petgraph::Direction::Incoming)
                .map(|e| self.graph[e.source()].clone())
                .collect()
        } else {
            Vec::new()
        }
    }

    /// Direct dependents of a node.
    pub fn dependents(&self, unique_id: &str) -> Vec<String> {
        if let Some(&idx) = self.node_map.get(unique_id) {
            self.graph
                .edges_directed(idx, petgraph::Direction::Outgoing)
                .map(|e| self.graph[e.target()].clone())
                .collect()
        } else {
            Vec::new()
        }
    }

    /// All transitive dependents of a node (the set to skip when it fails).
    pub fn descendants(&self, unique_id: &str) -> Vec<String> {
        let Some(&start) = self.node_map.get(unique_id) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        let mut visited = HashSet::new();
        self.descendants_dfs(start, &mut result, &mut visited);
        result
    }

    fn descendants_dfs(
        &self,
        idx: NodeIndex,
        result: &mut Vec<String>,
        visited: &mut HashSet<NodeIndex>,
    ) {
        for edge in self
            .graph
            .edges_directed(idx, petgraph::Direction::Outgoing)
        {
            let neighbor = edge.target();
            if visited.insert(neighbor) {
                result.push(self.graph[neighbor].clone());
                self.descendants_dfs(neighbor, result, visited);
            }
        }
    }

    /// Check if a node id exists in the graph.
    pub fn contains(&self, unique_id: &str) -> bool {
        self.node_map.contains_key(unique_id)
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "dag_test.rs"]
mod tests;
