use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction as PetDirection;

use crate::error::EditorError;
use crate::types::{Edge, Node, PortRef};

/// Port pair carried by a graph edge; the endpoints are the graph nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortLink {
    pub source_port: String,
    pub target_port: String,
}

/// Authoritative node and edge index.
///
/// Holds structure only: port validation and the eviction policy live in
/// `EditorState`, which is the only caller that mutates it.
#[derive(Debug, Clone, Default)]
pub struct PipelineGraph {
    graph: StableDiGraph<Node, PortLink>,
    node_ids: HashMap<String, NodeIndex>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> Result<NodeIndex, EditorError> {
        if self.node_ids.contains_key(&node.name) {
            return Err(EditorError::DuplicateName { name: node.name });
        }

        let name = node.name.clone();
        let index = self.graph.add_node(node);
        self.node_ids.insert(name, index);
        Ok(index)
    }

    /// Removes the node and every edge touching it, returning both.
    pub fn remove_node(&mut self, name: &str) -> Option<(Node, Vec<Edge>)> {
        let index = *self.node_ids.get(name)?;
        let edges = self.incident_edges(name);
        let node = self.graph.remove_node(index)?;
        self.node_ids.remove(name);
        Some((node, edges))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_ids.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        let index = self.node_ids.get(name)?;
        self.graph.node_weight(*index)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        let index = self.node_ids.get(name)?;
        self.graph.node_weight_mut(*index)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.graph.node_weights_mut()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Adds `edge` unless the same port pair is already linked.
    ///
    /// Returns `Ok(false)` for a duplicate.
    pub fn add_edge(&mut self, edge: &Edge) -> Result<bool, EditorError> {
        let from_idx = self.index_of(&edge.from_node)?;
        let to_idx = self.index_of(&edge.to_node)?;

        if self.find_edge(edge).is_some() {
            return Ok(false);
        }

        self.graph.add_edge(
            from_idx,
            to_idx,
            PortLink {
                source_port: edge.from_port.clone(),
                target_port: edge.to_port.clone(),
            },
        );
        Ok(true)
    }

    pub fn remove_edge(&mut self, edge: &Edge) -> bool {
        match self.find_edge(edge) {
            Some(index) => self.graph.remove_edge(index).is_some(),
            None => false,
        }
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.graph
            .edge_references()
            .map(|edge| self.edge_record(edge.source(), edge.target(), edge.weight()))
            .collect()
    }

    /// Every edge whose source or target is `name`, each listed once.
    pub fn incident_edges(&self, name: &str) -> Vec<Edge> {
        let Some(&index) = self.node_ids.get(name) else {
            return Vec::new();
        };

        let outgoing = self
            .graph
            .edges_directed(index, PetDirection::Outgoing)
            .map(|edge| self.edge_record(edge.source(), edge.target(), edge.weight()));
        let incoming = self
            .graph
            .edges_directed(index, PetDirection::Incoming)
            .filter(|edge| edge.source() != index)
            .map(|edge| self.edge_record(edge.source(), edge.target(), edge.weight()));

        outgoing.chain(incoming).collect()
    }

    pub fn outgoing_edges(&self, name: &str) -> Vec<Edge> {
        let Some(&index) = self.node_ids.get(name) else {
            return Vec::new();
        };

        self.graph
            .edges_directed(index, PetDirection::Outgoing)
            .map(|edge| self.edge_record(edge.source(), edge.target(), edge.weight()))
            .collect()
    }

    pub fn edges_at_port(&self, port: &PortRef) -> Vec<Edge> {
        self.incident_edges(&port.node)
            .into_iter()
            .filter(|edge| edge.touches(port))
            .collect()
    }

    pub fn is_port_connected(&self, port: &PortRef) -> bool {
        !self.edges_at_port(port).is_empty()
    }

    /// Node names in dependency order.
    pub fn execution_order(&self) -> Result<Vec<&str>, EditorError> {
        let order = toposort(&self.graph, None).map_err(|_| EditorError::CycleDetected)?;
        Ok(order
            .into_iter()
            .filter_map(|idx| self.graph.node_weight(idx))
            .map(|node| node.name.as_str())
            .collect())
    }

    pub fn clear(&mut self) {
        self.graph.clear();
        self.node_ids.clear();
    }

    fn index_of(&self, name: &str) -> Result<NodeIndex, EditorError> {
        self.node_ids
            .get(name)
            .copied()
            .ok_or_else(|| EditorError::UnknownNode {
                name: name.to_string(),
            })
    }

    fn find_edge(&self, edge: &Edge) -> Option<EdgeIndex> {
        let from_idx = *self.node_ids.get(&edge.from_node)?;
        let to_idx = *self.node_ids.get(&edge.to_node)?;

        self.graph
            .edges_connecting(from_idx, to_idx)
            .find(|candidate| {
                candidate.weight().source_port == edge.from_port
                    && candidate.weight().target_port == edge.to_port
            })
            .map(|candidate| candidate.id())
    }

    fn edge_record(&self, source: NodeIndex, target: NodeIndex, link: &PortLink) -> Edge {
        let name_of = |idx: NodeIndex| {
            self.graph
                .node_weight(idx)
                .map(|node| node.name.clone())
                .unwrap_or_default()
        };

        Edge {
            from_node: name_of(source),
            from_port: link.source_port.clone(),
            to_node: name_of(target),
            to_port: link.target_port.clone(),
        }
    }
}
