use thiserror::Error;

use crate::types::Direction;

/// Failures reported by editor commands and loaders.
///
/// User-facing kinds (`DuplicateName`, `InvalidName`,
/// `MultipleNodesSelected`, `NothingSelected`, `MissingRepository`) are meant to be surfaced as a
/// notification. The rest describe a caller passing references that do not
/// exist or a payload that does not describe a valid graph. No variant is
/// ever returned after a partial mutation.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("a node named '{name}' already exists")]
    DuplicateName { name: String },

    #[error("invalid node name '{name}': names must be non-empty and must not contain '$'")]
    InvalidName { name: String },

    #[error("node position ({x}, {y}) is not finite")]
    InvalidPosition { x: f64, y: f64 },

    #[error("rename needs exactly one selected node, but {count} are selected")]
    MultipleNodesSelected { count: usize },

    #[error("no node is selected")]
    NothingSelected,

    #[error("no default repository is configured")]
    MissingRepository,

    #[error("unknown node package: {package}")]
    UnknownPackage { package: String },

    #[error("no catalog entry declares class '{clazz}'")]
    UnknownClazz { clazz: String },

    #[error("unknown node: {name}")]
    UnknownNode { name: String },

    #[error("node '{node}' has no {direction} port '{port}'")]
    UnknownPort {
        node: String,
        port: String,
        direction: Direction,
    },

    #[error("node '{node}' has no parameter '{param}' of type any")]
    NotAnyParameter { node: String, param: String },

    #[error("incompatible ports: '{from_node}:{from_port}' ({from_type}) -> '{to_node}:{to_port}' ({to_type})")]
    IncompatiblePorts {
        from_node: String,
        from_port: String,
        from_type: String,
        to_node: String,
        to_port: String,
        to_type: String,
    },

    #[error("cycle detected in pipeline graph")]
    CycleDetected,

    #[error("invalid transform: '{raw}'")]
    InvalidTransform { raw: String },

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("failed to parse payload: {0}")]
    Parse(#[from] serde_json::Error),
}

impl EditorError {
    /// True for errors the UI should show as a notification rather than log as a bug.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::DuplicateName { .. }
                | Self::InvalidName { .. }
                | Self::MultipleNodesSelected { .. }
                | Self::NothingSelected
                | Self::MissingRepository
        )
    }
}
