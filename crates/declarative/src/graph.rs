//! Dependency graph over planned resources
//!
//! Edges point from a dependency to its dependent. The graph is built once
//! all resources are collected, rejects unknown references and cycles, and
//! groups resources into waves that can run concurrently.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::GraphError;
use crate::resource::BoxedResource;

/// A DAG whose nodes are indices into the resource list it was built from
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<usize, ()>,
    nodes: Vec<NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph for `resources`.
    ///
    /// # Errors
    ///
    /// `DuplicateId` when two resources share an id, `UnknownDependency` when a
    /// resource refers to an id not in the list, `Cycle` when the relation is
    /// not acyclic.
    pub fn build(resources: &[BoxedResource]) -> Result<Self, GraphError> {
        let mut graph = DiGraph::new();
        let mut by_id: HashMap<String, NodeIndex> = HashMap::new();
        let mut nodes = Vec::with_capacity(resources.len());

        for (position, resource) in resources.iter().enumerate() {
            let idx = graph.add_node(position);
            if by_id.insert(resource.id(), idx).is_some() {
                return Err(GraphError::DuplicateId(resource.id()));
            }
            nodes.push(idx);
        }

        for (position, resource) in resources.iter().enumerate() {
            for dependency in resource.dependencies() {
                let Some(&dep_idx) = by_id.get(&dependency) else {
                    return Err(GraphError::UnknownDependency {
                        resource: resource.id(),
                        dependency,
                    });
                };
                graph.update_edge(dep_idx, nodes[position], ());
            }
        }

        toposort(&graph, None)
            .map_err(|cycle| GraphError::Cycle(resources[graph[cycle.node_id()]].id()))?;

        Ok(Self { graph, nodes })
    }

    /// Positions in dependency order
    pub fn topological_order(&self) -> Vec<usize> {
        toposort(&self.graph, None)
            .map(|sorted| sorted.into_iter().map(|idx| self.graph[idx]).collect())
            .unwrap_or_default()
    }

    /// Group positions into waves.
    ///
    /// Every resource lands in the wave after its deepest dependency, so all
    /// members of a wave are independent of each other. Positions inside a
    /// wave keep declaration order.
    pub fn waves(&self) -> Vec<Vec<usize>> {
        let mut level: HashMap<NodeIndex, usize> = HashMap::new();

        for idx in toposort(&self.graph, None).unwrap_or_default() {
            let depth = self
                .graph
                .neighbors_directed(idx, Direction::Incoming)
                .filter_map(|dep| level.get(&dep))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            level.insert(idx, depth);
        }

        let max_level = level.values().copied().max().unwrap_or(0);
        let mut waves: Vec<Vec<usize>> = vec![Vec::new(); max_level + 1];
        for &idx in &self.nodes {
            if let Some(&l) = level.get(&idx) {
                waves[l].push(self.graph[idx]);
            }
        }
        waves.retain(|w| !w.is_empty());
        waves
    }

    /// Direct dependencies of the resource at `position`
    pub fn dependencies_of(&self, position: usize) -> Vec<usize> {
        let Some(&idx) = self.nodes.get(position) else {
            return Vec::new();
        };
        let mut deps: Vec<usize> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|dep| self.graph[dep])
            .collect();
        deps.sort_unstable();
        deps
    }

    /// Number of resources in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no resources
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
