//! Full editor snapshot: nodes, edges, transform, the catalog entries in use,
//! parameter values and any-type selections.
//!
//! Every map is written as a list of `[key, value]` pairs. Output is sorted
//! by key so two snapshots of the same state are byte-identical.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::NodeStructure;
use crate::editor::EditorState;
use crate::error::EditorError;
use crate::params::{any_key_param, is_valid_node_name, NodeConfig};
use crate::types::{Edge, Node, ViewTransform};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiSnapshot {
    #[serde(default)]
    pub nodes: Vec<(String, Node)>,
    #[serde(default)]
    pub edges: Vec<(String, Edge)>,
    #[serde(default)]
    pub transform: ViewTransform,
    #[serde(default)]
    pub structures: Vec<(String, NodeStructure)>,
    #[serde(default)]
    pub configs: Vec<(String, NodeConfig)>,
    #[serde(default)]
    pub any_configs: Vec<(String, String)>,
}

impl UiSnapshot {
    pub fn from_json(raw: &str) -> Result<Self, EditorError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String, EditorError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl EditorState {
    pub fn snapshot(&self) -> UiSnapshot {
        let nodes: BTreeMap<&str, &Node> = self
            .graph
            .nodes()
            .map(|node| (node.name.as_str(), node))
            .collect();

        let mut edges: Vec<(String, Edge)> = self
            .graph
            .edges()
            .into_iter()
            .map(|edge| (edge.key(), edge))
            .collect();
        edges.sort_by(|a, b| a.0.cmp(&b.0));

        let structures: BTreeMap<&str, &NodeStructure> = nodes
            .values()
            .filter_map(|node| self.catalog.get(&node.package))
            .map(|structure| (structure.package.as_str(), structure))
            .collect();

        UiSnapshot {
            nodes: nodes
                .into_iter()
                .map(|(name, node)| (name.to_string(), node.clone()))
                .collect(),
            edges,
            transform: self.transform,
            structures: structures
                .into_iter()
                .map(|(package, structure)| (package.to_string(), structure.clone()))
                .collect(),
            configs: self
                .params
                .configs()
                .map(|(name, config)| (name.clone(), config.clone()))
                .collect(),
            any_configs: self
                .params
                .any_configs()
                .map(|(key, concrete)| (key.clone(), concrete.clone()))
                .collect(),
        }
    }

    /// Replaces the editor contents with `snapshot`.
    ///
    /// The snapshot is rebuilt into a separate state first; on error the
    /// current state is left as it was.
    pub fn load_snapshot(&mut self, snapshot: UiSnapshot) -> Result<(), EditorError> {
        let staged = match self.stage_snapshot(snapshot) {
            Ok(staged) => staged,
            Err(err) => {
                warn!(error = %err, "Rejected snapshot");
                return Err(err);
            }
        };

        *self = staged;
        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "Snapshot loaded"
        );
        Ok(())
    }

    pub fn load_snapshot_json(&mut self, raw: &str) -> Result<(), EditorError> {
        let snapshot = UiSnapshot::from_json(raw).inspect_err(|err| {
            warn!(error = %err, "Rejected snapshot");
        })?;
        self.load_snapshot(snapshot)
    }

    fn stage_snapshot(&self, snapshot: UiSnapshot) -> Result<EditorState, EditorError> {
        let mut catalog = self.catalog.clone();
        for (package, structure) in snapshot.structures {
            if package != structure.package {
                return Err(EditorError::Malformed(format!(
                    "structure key '{package}' does not match package '{}'",
                    structure.package
                )));
            }
            catalog.register(structure);
        }

        let mut staged = EditorState::new(catalog);
        staged.transform = snapshot.transform;

        let mut selected = Vec::new();
        for (name, mut node) in snapshot.nodes {
            if name != node.name {
                return Err(EditorError::Malformed(format!(
                    "node key '{name}' does not match node name '{}'",
                    node.name
                )));
            }
            if !is_valid_node_name(&name) {
                return Err(EditorError::InvalidName { name });
            }
            staged.catalog.structure(&node.package)?;
            if node.selected {
                selected.push(node.node_ref());
            }
            node.selected = false;
            staged.graph.add_node(node)?;
        }

        for (name, config) in snapshot.configs {
            if !staged.graph.contains(&name) {
                return Err(EditorError::Malformed(format!(
                    "parameter config for unknown node '{name}'"
                )));
            }
            staged.params.insert_config(name, config);
        }

        for (key, concrete) in snapshot.any_configs {
            let known = staged
                .graph
                .nodes()
                .any(|node| any_key_param(&key, &node.name).is_some());
            if !known {
                return Err(EditorError::Malformed(format!(
                    "any-type entry '{key}' does not belong to a node"
                )));
            }
            staged.params.insert_any_type(key, concrete);
        }

        let unconfigured: Vec<Node> = staged
            .graph
            .nodes()
            .filter(|node| staged.params.config(&node.name).is_none())
            .cloned()
            .collect();
        for node in unconfigured {
            let structure = staged.catalog.structure(&node.package)?;
            staged.params.init_node(&node.name, structure);
            debug!(node = %node.name, "Snapshot node had no config, using defaults");
        }

        for (key, edge) in snapshot.edges {
            if key != edge.key() {
                debug!(key = %key, edge = %edge.key(), "Snapshot edge key differs from its endpoints");
            }
            staged.connect(&edge.from_node, &edge.from_port, &edge.to_node, &edge.to_port)?;
        }

        staged.selection.replace(selected);
        staged.sync_selected_flags();
        Ok(staged)
    }
}
