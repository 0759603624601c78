use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EditorError;

const CUSTOM_PORT_TAG: &str = "custom";
const ANY_PORT_TAG: &str = "any";

/// Declared type of a node port, as written in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PortType {
    /// Wildcard: connects to anything.
    Custom,
    Any,
    Named(String),
}

impl PortType {
    pub fn is_compatible(&self, other: &PortType) -> bool {
        self == other || *self == PortType::Custom || *other == PortType::Custom
    }

    pub fn as_str(&self) -> &str {
        match self {
            PortType::Custom => CUSTOM_PORT_TAG,
            PortType::Any => ANY_PORT_TAG,
            PortType::Named(name) => name,
        }
    }
}

impl From<String> for PortType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            CUSTOM_PORT_TAG => PortType::Custom,
            ANY_PORT_TAG => PortType::Any,
            _ => PortType::Named(raw),
        }
    }
}

impl From<&str> for PortType {
    fn from(raw: &str) -> Self {
        PortType::from(raw.to_string())
    }
}

impl From<PortType> for String {
    fn from(port_type: PortType) -> Self {
        match port_type {
            PortType::Named(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Input => Direction::Output,
            Direction::Output => Direction::Input,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// A node placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub package: String,
    #[serde(flatten)]
    pub position: Position,
    #[serde(default)]
    pub selected: bool,
}

impl Node {
    pub fn new(name: impl Into<String>, package: impl Into<String>, position: Position) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            position,
            selected: false,
        }
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef {
            name: self.name.clone(),
            package: self.package.clone(),
        }
    }
}

/// Identity of a node as tracked by the selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub name: String,
    pub package: String,
}

/// A port addressed through its owning node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub node: String,
    pub port: String,
    pub direction: Direction,
}

impl PortRef {
    pub fn input(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
            direction: Direction::Input,
        }
    }

    pub fn output(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
            direction: Direction::Output,
        }
    }
}

/// A connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub from_node: String,
    pub from_port: String,
    pub to_node: String,
    pub to_port: String,
}

impl Edge {
    pub fn new(
        from_node: impl Into<String>,
        from_port: impl Into<String>,
        to_node: impl Into<String>,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            from_node: from_node.into(),
            from_port: from_port.into(),
            to_node: to_node.into(),
            to_port: to_port.into(),
        }
    }

    /// Canonical key, unique per pair of ports.
    pub fn key(&self) -> String {
        format!(
            "{}-{{out}}-{}|{}-{{in}}-{}",
            self.from_node, self.from_port, self.to_node, self.to_port
        )
    }

    pub fn source(&self) -> PortRef {
        PortRef::output(&self.from_node, &self.from_port)
    }

    pub fn target(&self) -> PortRef {
        PortRef::input(&self.to_node, &self.to_port)
    }

    pub fn touches(&self, port: &PortRef) -> bool {
        match port.direction {
            Direction::Output => self.from_node == port.node && self.from_port == port.port,
            Direction::Input => self.to_node == port.node && self.to_port == port.port,
        }
    }

    /// Replaces every endpoint equal to `old` with `new`.
    pub fn renamed(&self, old: &str, new: &str) -> Edge {
        let rewrite = |name: &String| {
            if name == old {
                new.to_string()
            } else {
                name.clone()
            }
        };
        Edge {
            from_node: rewrite(&self.from_node),
            from_port: self.from_port.clone(),
            to_node: rewrite(&self.to_node),
            to_port: self.to_port.clone(),
        }
    }
}

/// Pan/zoom transform shared by the whole canvas.
///
/// Persisted in its textual form, `translate(x,y) scale(k)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ViewTransform {
    pub x: f64,
    pub y: f64,
    pub k: f64,
}

impl ViewTransform {
    pub const IDENTITY: ViewTransform = ViewTransform {
        x: 0.0,
        y: 0.0,
        k: 1.0,
    };
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for ViewTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "translate({},{}) scale({})", self.x, self.y, self.k)
    }
}

impl FromStr for ViewTransform {
    type Err = EditorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || EditorError::InvalidTransform {
            raw: raw.to_string(),
        };

        let rest = raw.trim().strip_prefix("translate(").ok_or_else(invalid)?;
        let (coords, rest) = rest.split_once(')').ok_or_else(invalid)?;
        let mut parts = coords
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty());
        let x = parse_number(parts.next()).ok_or_else(invalid)?;
        let y = parse_number(parts.next()).ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        let rest = rest.trim();
        let k = if rest.is_empty() {
            1.0
        } else {
            let scale = rest
                .strip_prefix("scale(")
                .and_then(|s| s.strip_suffix(')'))
                .ok_or_else(invalid)?;
            parse_number(Some(scale.trim())).ok_or_else(invalid)?
        };

        Ok(Self { x, y, k })
    }
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl TryFrom<String> for ViewTransform {
    type Error = EditorError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<ViewTransform> for String {
    fn from(transform: ViewTransform) -> Self {
        transform.to_string()
    }
}
