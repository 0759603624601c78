//! Graph description produced by the backend when it decompiles a pipeline
//! script, and the loader that turns it into editor state.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::{
    CustomCode, NodeParameter, NodeStructure, NodeTags, CUSTOM_NODE_PACKAGE,
};
use crate::editor::EditorState;
use crate::error::EditorError;
use crate::param_type::ParamKind;
use crate::types::{Position, PortType, ViewTransform};

const CUSTOM_LIBRARY_TAG: &str = "Base";
const CUSTOM_KIND_TAG: &str = "Custom";
const CUSTOM_DESCRIPTION: &str = "A Custom Node.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversedParam {
    pub key: String,
    pub value: Value,
    /// Runtime type of `value`, present for parameters typed `any`.
    #[serde(default, rename = "type")]
    pub value_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversedNode {
    pub node: String,
    pub clazz: String,
    pub pos: Vec<f64>,
    #[serde(default)]
    pub params: Vec<ReversedParam>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversedCustom {
    pub function_name: String,
    pub clazz: String,
    pub code: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub params: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversedEdge {
    pub from_node: String,
    pub from_var: String,
    pub to_node: String,
    pub to_var: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReversedScript {
    #[serde(default)]
    pub nodes: Vec<ReversedNode>,
    #[serde(default)]
    pub custom: Vec<ReversedCustom>,
    #[serde(default)]
    pub edges: Vec<ReversedEdge>,
}

impl ReversedScript {
    pub fn from_json(raw: &str) -> Result<Self, EditorError> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl ReversedCustom {
    /// Catalog entry for this code block under `package`.
    fn to_structure(&self, package: String) -> NodeStructure {
        let ports = |names: &[String]| -> BTreeMap<String, PortType> {
            names
                .iter()
                .map(|name| (name.clone(), PortType::Custom))
                .collect()
        };

        NodeStructure {
            package,
            clazz: self.clazz.clone(),
            input: ports(&self.inputs),
            output: ports(&self.outputs),
            parameter: self
                .params
                .iter()
                .map(|name| NodeParameter {
                    name: name.clone(),
                    param_type: "any".to_string(),
                    is_mandatory: false,
                    description: String::new(),
                    default_value: Value::Null,
                })
                .collect(),
            methods: None,
            tags: NodeTags {
                library: CUSTOM_LIBRARY_TAG.to_string(),
                kind: CUSTOM_KIND_TAG.to_string(),
            },
            description: CUSTOM_DESCRIPTION.to_string(),
            custom: Some(CustomCode {
                function_name: self.function_name.clone(),
                code: self.code.clone(),
            }),
        }
    }
}

impl EditorState {
    /// Replaces the editor contents with a decompiled script.
    ///
    /// Custom entries from a previous load are dropped from the catalog and
    /// one entry per custom block is added as `CustomNode{i}`, counting from 1.
    /// Like snapshot loading, this either applies completely or not at all.
    pub fn load_reversed_script(&mut self, script: ReversedScript) -> Result<(), EditorError> {
        let staged = match self.stage_reversed(script) {
            Ok(staged) => staged,
            Err(err) => {
                warn!(error = %err, "Rejected reversed script");
                return Err(err);
            }
        };

        *self = staged;
        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "Reversed script loaded"
        );
        Ok(())
    }

    pub fn load_reversed_json(&mut self, raw: &str) -> Result<(), EditorError> {
        let script = ReversedScript::from_json(raw).inspect_err(|err| {
            warn!(error = %err, "Rejected reversed script");
        })?;
        self.load_reversed_script(script)
    }

    fn stage_reversed(&self, script: ReversedScript) -> Result<EditorState, EditorError> {
        let mut catalog = self.catalog.clone();
        catalog.retain(|_, structure| !structure.is_custom());

        let mut custom_packages = HashMap::new();
        for (i, block) in script.custom.iter().enumerate() {
            let package = format!("{CUSTOM_NODE_PACKAGE}{}", i + 1);
            custom_packages.insert(block.clazz.clone(), package.clone());
            catalog.register(block.to_structure(package));
        }

        let mut staged = EditorState::new(catalog);
        staged.transform = ViewTransform::IDENTITY;

        for node in &script.nodes {
            let package = match custom_packages.get(&node.clazz) {
                Some(package) => package.clone(),
                None => staged
                    .catalog
                    .package_from_clazz(&node.clazz)
                    .map(str::to_string)
                    .ok_or_else(|| EditorError::UnknownClazz {
                        clazz: node.clazz.clone(),
                    })?,
            };

            let position = match node.pos.as_slice() {
                [x, y, ..] => Position::new(*x, *y),
                _ => {
                    return Err(EditorError::Malformed(format!(
                        "node '{}' has no position",
                        node.node
                    )))
                }
            };

            staged.create_node(&package, position, Some(node.node.as_str()))?;
            staged.apply_reversed_params(&node.node, &package, &node.params)?;
        }

        for edge in &script.edges {
            staged.connect(&edge.from_node, &edge.from_var, &edge.to_node, &edge.to_var)?;
        }

        staged.selection.clear();
        staged.sync_selected_flags();
        Ok(staged)
    }

    fn apply_reversed_params(
        &mut self,
        node: &str,
        package: &str,
        params: &[ReversedParam],
    ) -> Result<(), EditorError> {
        for param in params {
            self.params.set_value(node, &param.key, param.value.clone())?;

            let Some(value_type) = &param.value_type else {
                continue;
            };
            let declared_any = self
                .catalog
                .structure(package)?
                .parameter(&param.key)
                .is_some_and(|p| ParamKind::classify(&p.param_type).is_any());
            if declared_any {
                self.params.set_any_type(node, &param.key, value_type)?;
            } else {
                debug!(node, param = %param.key, value_type = %value_type, "Type tag on a parameter not typed any");
            }
        }
        Ok(())
    }
}
