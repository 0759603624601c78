//! Execution config handed to the pipeline backend.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{CustomCode, CUSTOM_NODE_PACKAGE};
use crate::editor::EditorState;
use crate::error::EditorError;
use crate::params::NodeConfig;
use crate::snapshot::UiSnapshot;
use crate::types::Node;

const CUSTOM_LIBRARY: &str = "custom";
const PIPELINE_UID_RANGE: u128 = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingLink {
    pub to_node: String,
    pub from_port: String,
    pub to_port: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionNode {
    pub node_id: String,
    /// Class id the backend instantiates. Every custom node maps to the
    /// generic custom-node class.
    pub node: String,
    pub parameters: NodeConfig,
    #[serde(flatten)]
    pub custom: Option<CustomCode>,
    pub then: Vec<OutgoingLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub pipeline_uid: String,
    pub repository: String,
    pub nodes: Vec<ExecutionNode>,
    pub dependencies: Vec<String>,
    pub ui: UiSnapshot,
}

/// Random numeric id in `0..100000`, as a string.
pub fn generate_pipeline_uid() -> String {
    (Uuid::new_v4().as_u128() % PIPELINE_UID_RANGE).to_string()
}

impl EditorState {
    pub fn export_execution_config(
        &self,
        repository: Option<&str>,
    ) -> Result<ExecutionConfig, EditorError> {
        self.build_execution_config(repository, generate_pipeline_uid())
    }

    /// Same as [`EditorState::export_execution_config`] with a caller-chosen uid.
    pub fn build_execution_config(
        &self,
        repository: Option<&str>,
        pipeline_uid: String,
    ) -> Result<ExecutionConfig, EditorError> {
        let repository = repository
            .filter(|r| !r.is_empty())
            .ok_or(EditorError::MissingRepository)?;

        let nodes = self
            .export_order()
            .into_iter()
            .map(|node| self.execution_node(node))
            .collect::<Result<Vec<_>, _>>()?;

        let config = ExecutionConfig {
            pipeline_uid,
            repository: repository.to_string(),
            nodes,
            dependencies: self.dependencies(),
            ui: self.snapshot(),
        };
        info!(
            pipeline_uid = %config.pipeline_uid,
            nodes = config.nodes.len(),
            "Execution config exported"
        );
        Ok(config)
    }

    /// Distinct lowercase library tags of the nodes in use, without `custom`.
    /// Custom-code nodes carry no library of their own.
    pub fn dependencies(&self) -> Vec<String> {
        self.graph
            .nodes()
            .filter_map(|node| self.catalog.get(&node.package))
            .filter(|structure| !structure.is_custom())
            .map(|structure| structure.tags.library.to_lowercase())
            .filter(|library| !library.is_empty() && library != CUSTOM_LIBRARY)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn export_order(&self) -> Vec<&Node> {
        match self.graph.execution_order() {
            Ok(order) => order
                .into_iter()
                .filter_map(|name| self.graph.node(name))
                .collect(),
            Err(err) => {
                warn!(error = %err, "Exporting nodes in creation order");
                self.graph.nodes().collect()
            }
        }
    }

    fn execution_node(&self, node: &Node) -> Result<ExecutionNode, EditorError> {
        let structure = self.catalog.structure(&node.package)?;
        let class_id = if structure.is_custom() {
            CUSTOM_NODE_PACKAGE.to_string()
        } else {
            node.package.clone()
        };

        let parameters = self
            .params
            .config(&node.name)
            .map(|config| {
                config
                    .iter()
                    .filter(|(_, value)| !value.is_null())
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect::<NodeConfig>()
            })
            .unwrap_or_default();

        let then = self
            .graph
            .outgoing_edges(&node.name)
            .into_iter()
            .map(|edge| OutgoingLink {
                to_node: edge.to_node,
                from_port: edge.from_port,
                to_port: edge.to_port,
            })
            .collect();

        Ok(ExecutionNode {
            node_id: node.name.clone(),
            node: class_id,
            parameters,
            custom: structure.custom.clone(),
            then,
        })
    }
}

/// Serializes the config the way the backend expects it.
pub fn to_json_value(config: &ExecutionConfig) -> Result<Value, EditorError> {
    Ok(serde_json::to_value(config)?)
}
