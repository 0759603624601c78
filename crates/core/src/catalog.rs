//! Node catalog: static schema for every node package the editor can place.
//!
//! Entries come from the external node-type service (or from a snapshot or a
//! decompiled script) and are only read by the graph operations. Ports are
//! keyed by name; parameters keep their declared order.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::EditorError;
use crate::types::{Direction, PortType};

/// Class id the execution backend uses for every user-code node.
pub const CUSTOM_NODE_PACKAGE: &str = "rain.nodes.custom.custom.CustomNode";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub default_value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeTags {
    #[serde(default, deserialize_with = "null_as_default")]
    pub library: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
}

/// User-written code carried by a custom node entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCode {
    pub function_name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStructure {
    pub package: String,
    pub clazz: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub input: BTreeMap<String, PortType>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output: BTreeMap<String, PortType>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameter: Vec<NodeParameter>,
    #[serde(default)]
    pub methods: Option<Vec<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: NodeTags,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(flatten)]
    pub custom: Option<CustomCode>,
}

impl NodeStructure {
    pub fn port_type(&self, port: &str, direction: Direction) -> Option<&PortType> {
        match direction {
            Direction::Input => self.input.get(port),
            Direction::Output => self.output.get(port),
        }
    }

    pub fn ports(&self, direction: Direction) -> impl Iterator<Item = (&String, &PortType)> {
        match direction {
            Direction::Input => self.input.iter(),
            Direction::Output => self.output.iter(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&NodeParameter> {
        self.parameter.iter().find(|p| p.name == name)
    }

    pub fn is_custom(&self) -> bool {
        self.custom.is_some()
    }

    /// Prefix for generated node names: the class name, or the last
    /// package segment when no class is declared.
    pub fn base_name(&self) -> &str {
        if !self.clazz.is_empty() {
            return &self.clazz;
        }
        self.package.rsplit('.').next().unwrap_or(&self.package)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
    structures: BTreeMap<String, NodeStructure>,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_structures(structures: Vec<NodeStructure>) -> Self {
        let mut catalog = Self::new();
        catalog.set_structures(structures);
        catalog
    }

    pub fn register(&mut self, structure: NodeStructure) {
        self.structures.insert(structure.package.clone(), structure);
    }

    /// Replaces the whole catalog. The generic custom-node entry loses its
    /// parameter list: its parameters are supplied per instance by user code.
    pub fn set_structures(&mut self, structures: Vec<NodeStructure>) {
        self.structures = structures
            .into_iter()
            .map(|mut structure| {
                if structure.package == CUSTOM_NODE_PACKAGE {
                    structure.parameter.clear();
                }
                (structure.package.clone(), structure)
            })
            .collect();
    }

    pub fn get(&self, package: &str) -> Option<&NodeStructure> {
        self.structures.get(package)
    }

    pub fn structure(&self, package: &str) -> Result<&NodeStructure, EditorError> {
        self.get(package).ok_or_else(|| EditorError::UnknownPackage {
            package: package.to_string(),
        })
    }

    pub fn package_from_clazz(&self, clazz: &str) -> Option<&str> {
        self.structures
            .values()
            .find(|structure| structure.clazz == clazz)
            .map(|structure| structure.package.as_str())
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&String, &mut NodeStructure) -> bool,
    {
        self.structures.retain(keep);
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeStructure> {
        self.structures.values()
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn clear(&mut self) {
        self.structures.clear();
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
