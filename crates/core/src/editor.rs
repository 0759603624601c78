//! Editor state and the commands a presentation layer issues against it.
//!
//! `EditorState` owns the catalog, the graph, the parameter store, the
//! selection and the canvas transform. Every command either applies fully
//! or returns an error before the first mutation, with two documented
//! exceptions that only remove things (`disconnect`, `disconnect_port`).

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::NodeCatalog;
use crate::error::EditorError;
use crate::graph::PipelineGraph;
use crate::params::{is_valid_node_name, ParameterStore};
use crate::selection::SelectionState;
use crate::types::{Edge, Node, NodeRef, PortRef, PortType, Position, ViewTransform};

/// Distance, on both axes, between an original node and its clone.
pub const CLONE_OFFSET: f64 = 200.0;

#[derive(Debug, Clone, Default)]
pub struct EditorState {
    pub(crate) catalog: NodeCatalog,
    pub(crate) graph: PipelineGraph,
    pub(crate) params: ParameterStore,
    pub(crate) selection: SelectionState,
    pub(crate) transform: ViewTransform,
}

impl EditorState {
    pub fn new(catalog: NodeCatalog) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    pub fn catalog(&self) -> &NodeCatalog {
        &self.catalog
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    pub fn set_transform(&mut self, transform: ViewTransform) {
        self.transform = transform;
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.graph.node(name)
    }

    /// First `{base}{n}`, counting from 1, that no live node uses.
    pub fn next_node_name(&self, base: &str) -> String {
        (1..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !self.graph.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn create_node(
        &mut self,
        package: &str,
        position: Position,
        name: Option<&str>,
    ) -> Result<Node, EditorError> {
        let structure = self.catalog.structure(package)?;
        ensure_finite(position)?;
        let name = match name {
            Some(name) if !is_valid_node_name(name) => {
                return Err(EditorError::InvalidName {
                    name: name.to_string(),
                })
            }
            Some(name) if self.graph.contains(name) => {
                return Err(EditorError::DuplicateName {
                    name: name.to_string(),
                })
            }
            Some(name) => name.to_string(),
            None => self.next_node_name(structure.base_name()),
        };

        let node = Node::new(&name, package, position);
        self.graph.add_node(node.clone())?;
        self.params.init_node(&name, structure);

        debug!(node = %name, package, "Node created");
        Ok(node)
    }

    /// Links an output port to an input port.
    ///
    /// Any edge already ending at the input port is removed first.
    pub fn connect(
        &mut self,
        from_node: &str,
        from_port: &str,
        to_node: &str,
        to_port: &str,
    ) -> Result<Edge, EditorError> {
        let edge = Edge::new(from_node, from_port, to_node, to_port);
        let from_type = self.port_type(&edge.source())?;
        let to_type = self.port_type(&edge.target())?;

        if from_node == to_node || !from_type.is_compatible(to_type) {
            return Err(EditorError::IncompatiblePorts {
                from_node: from_node.to_string(),
                from_port: from_port.to_string(),
                from_type: from_type.to_string(),
                to_node: to_node.to_string(),
                to_port: to_port.to_string(),
                to_type: to_type.to_string(),
            });
        }

        for existing in self.graph.edges_at_port(&edge.target()) {
            if existing != edge {
                self.graph.remove_edge(&existing);
                debug!(edge = %existing.key(), "Evicted edge from input port");
            }
        }
        self.graph.add_edge(&edge)?;

        debug!(edge = %edge.key(), "Edge connected");
        Ok(edge)
    }

    /// Removes one edge. Returns `false` when it did not exist.
    pub fn disconnect(&mut self, edge: &Edge) -> bool {
        let removed = self.graph.remove_edge(edge);
        if removed {
            debug!(edge = %edge.key(), "Edge disconnected");
        }
        removed
    }

    /// Removes every edge touching `port` and returns them.
    pub fn disconnect_port(&mut self, port: &PortRef) -> Vec<Edge> {
        let edges = self.graph.edges_at_port(port);
        for edge in &edges {
            self.graph.remove_edge(edge);
        }
        if !edges.is_empty() {
            debug!(node = %port.node, port = %port.port, count = edges.len(), "Port detached");
        }
        edges
    }

    /// Removes the node, its edges, its parameter config and its selection entry.
    pub fn delete_node(&mut self, name: &str) -> Result<Node, EditorError> {
        let (node, edges) = self
            .graph
            .remove_node(name)
            .ok_or_else(|| EditorError::UnknownNode {
                name: name.to_string(),
            })?;
        self.params.remove_config(name);
        self.selection.forget(name);

        debug!(node = %name, edges = edges.len(), "Node deleted");
        Ok(node)
    }

    /// Clones a node with a fresh name, offset position and a copy of its
    /// parameters. Edges are not copied.
    pub fn clone_node(&mut self, name: &str) -> Result<Node, EditorError> {
        let original = self.existing_node(name)?;
        let base = self.catalog.structure(&original.package)?.base_name();
        let clone_name = self.next_node_name(base);
        let position = original.position.offset(CLONE_OFFSET, CLONE_OFFSET);

        self.clone_as(&original, &clone_name, position)
    }

    /// Clones a set of nodes and the edges running between them.
    ///
    /// Edges with only one endpoint inside the set are not copied. The
    /// clones become the selection.
    pub fn copy_nodes(&mut self, names: &[String]) -> Result<Vec<Node>, EditorError> {
        let mut seen = HashSet::new();
        let mut originals = Vec::new();
        for name in names {
            let node = self.existing_node(name)?;
            self.catalog.structure(&node.package)?;
            if seen.insert(node.name.clone()) {
                originals.push(node);
            }
        }

        let mut name_map = HashMap::new();
        for original in &originals {
            let clone_name = self.next_node_name(&original.name);
            let position = original.position.offset(CLONE_OFFSET, CLONE_OFFSET);
            let clone = self.clone_as(original, &clone_name, position)?;
            name_map.insert(original.name.clone(), clone.name);
        }

        let mut dropped = 0usize;
        for edge in self.graph.edges() {
            match (name_map.get(&edge.from_node), name_map.get(&edge.to_node)) {
                (Some(from), Some(to)) => {
                    self.graph
                        .add_edge(&Edge::new(from, &edge.from_port, to, &edge.to_port))?;
                }
                (Some(_), None) | (None, Some(_)) => dropped += 1,
                (None, None) => {}
            }
        }
        if dropped > 0 {
            warn!(dropped, "Copy dropped edges crossing the copied set");
        }

        let clone_refs: Vec<NodeRef> = originals
            .iter()
            .filter_map(|original| name_map.get(&original.name))
            .filter_map(|clone| self.graph.node(clone))
            .map(Node::node_ref)
            .collect();
        self.selection.replace(clone_refs);
        self.sync_selected_flags();

        debug!(count = originals.len(), "Nodes copied");
        Ok(originals
            .iter()
            .filter_map(|original| name_map.get(&original.name))
            .filter_map(|clone| self.graph.node(clone).cloned())
            .collect())
    }

    /// Renames a node by recreating it under `new_name`.
    ///
    /// Incident edges are read from the graph index before the old node is
    /// removed and reattached to the new one afterwards. The renamed node
    /// becomes the only selection.
    pub fn rename_node(&mut self, old_name: &str, new_name: &str) -> Result<Node, EditorError> {
        if !is_valid_node_name(new_name) {
            return Err(EditorError::InvalidName {
                name: new_name.to_string(),
            });
        }
        if self.graph.contains(new_name) {
            return Err(EditorError::DuplicateName {
                name: new_name.to_string(),
            });
        }
        let original = self.existing_node(old_name)?;
        let structure = self.catalog.structure(&original.package)?;

        let edges: Vec<Edge> = self
            .graph
            .incident_edges(old_name)
            .iter()
            .map(|edge| edge.renamed(old_name, new_name))
            .collect();

        let renamed = Node::new(new_name, &original.package, original.position);
        self.graph.add_node(renamed.clone())?;
        if !self.params.clone_config(old_name, structure, new_name) {
            self.params.init_node(new_name, structure);
        }

        self.graph.remove_node(old_name);
        self.params.remove_config(old_name);
        self.selection.forget(old_name);

        for edge in &edges {
            self.graph.add_edge(edge)?;
        }

        self.selection.select(renamed.node_ref(), false);
        self.sync_selected_flags();

        debug!(from = %old_name, to = %new_name, edges = edges.len(), "Node renamed");
        Ok(self.graph.node(new_name).cloned().unwrap_or(renamed))
    }

    /// Renames the single selected node.
    pub fn rename_selected(&mut self, new_name: &str) -> Result<Node, EditorError> {
        let old_name = self.selection.single()?.name.clone();
        self.rename_node(&old_name, new_name)
    }

    pub fn move_node(&mut self, name: &str, position: Position) -> Result<(), EditorError> {
        ensure_finite(position)?;
        let node = self
            .graph
            .node_mut(name)
            .ok_or_else(|| EditorError::UnknownNode {
                name: name.to_string(),
            })?;
        node.position = position;
        Ok(())
    }

    pub fn select(&mut self, name: &str, additive: bool) -> Result<(), EditorError> {
        let node_ref = self.existing_node(name)?.node_ref();
        self.selection.select(node_ref, additive);
        self.sync_selected_flags();
        Ok(())
    }

    pub fn toggle(&mut self, name: &str) -> Result<(), EditorError> {
        self.select(name, true)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.sync_selected_flags();
    }

    pub fn mark_double_click(&mut self) {
        self.selection.mark_double_click();
    }

    pub fn take_double_click(&mut self) -> bool {
        self.selection.take_double_click()
    }

    pub fn set_param(&mut self, node: &str, param: &str, value: Value) -> Result<(), EditorError> {
        self.params.set_value(node, param, value)
    }

    pub fn set_any_type(
        &mut self,
        node: &str,
        param: &str,
        concrete_type: &str,
    ) -> Result<(), EditorError> {
        self.params.set_any_type(node, param, concrete_type)
    }

    pub fn port_type(&self, port: &PortRef) -> Result<&PortType, EditorError> {
        let node = self
            .graph
            .node(&port.node)
            .ok_or_else(|| EditorError::UnknownNode {
                name: port.node.clone(),
            })?;
        self.catalog
            .structure(&node.package)?
            .port_type(&port.port, port.direction)
            .ok_or_else(|| EditorError::UnknownPort {
                node: port.node.clone(),
                port: port.port.clone(),
                direction: port.direction,
            })
    }

    pub fn is_port_connected(&self, port: &PortRef) -> bool {
        self.graph.is_port_connected(port)
    }

    /// Ports on other nodes that `port` could be connected to.
    pub fn compatible_ports(&self, port: &PortRef) -> Result<Vec<PortRef>, EditorError> {
        let port_type = self.port_type(port)?;
        let wanted = port.direction.opposite();

        let mut compatible = Vec::new();
        for node in self.graph.nodes().filter(|n| n.name != port.node) {
            let Some(structure) = self.catalog.get(&node.package) else {
                continue;
            };
            for (name, candidate) in structure.ports(wanted) {
                if port_type.is_compatible(candidate) {
                    compatible.push(PortRef {
                        node: node.name.clone(),
                        port: name.clone(),
                        direction: wanted,
                    });
                }
            }
        }
        Ok(compatible)
    }

    /// Drops every node, edge, config and selection; keeps the catalog.
    pub fn reset(&mut self) {
        self.graph.clear();
        self.params.clear();
        self.selection = SelectionState::new();
        self.transform = ViewTransform::IDENTITY;
    }

    fn existing_node(&self, name: &str) -> Result<Node, EditorError> {
        self.graph
            .node(name)
            .cloned()
            .ok_or_else(|| EditorError::UnknownNode {
                name: name.to_string(),
            })
    }

    fn clone_as(
        &mut self,
        original: &Node,
        clone_name: &str,
        position: Position,
    ) -> Result<Node, EditorError> {
        let clone = self.create_node(&original.package, position, Some(clone_name))?;
        let structure = self.catalog.structure(&original.package)?;
        self.params
            .clone_config(&original.name, structure, &clone.name);

        debug!(from = %original.name, to = %clone.name, "Node cloned");
        Ok(clone)
    }

    pub(crate) fn sync_selected_flags(&mut self) {
        let selection = &self.selection;
        for node in self.graph.nodes_mut() {
            node.selected = selection.contains(&node.name);
        }
    }
}

/// Rejects coordinates that JSON cannot carry.
fn ensure_finite(position: Position) -> Result<(), EditorError> {
    if position.is_finite() {
        Ok(())
    } else {
        Err(EditorError::InvalidPosition {
            x: position.x,
            y: position.y,
        })
    }
}
