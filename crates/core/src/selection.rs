use crate::error::EditorError;
use crate::types::NodeRef;

/// Which nodes are selected, plus the pending double-click intent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    selected: Vec<NodeRef>,
    double_click: bool,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-select replaces the selection; additive select toggles `node`.
    pub fn select(&mut self, node: NodeRef, additive: bool) {
        if additive {
            self.toggle(node);
        } else {
            self.selected.clear();
            self.selected.push(node);
        }
    }

    pub fn toggle(&mut self, node: NodeRef) {
        if let Some(idx) = self.selected.iter().position(|n| n.name == node.name) {
            self.selected.remove(idx);
        } else {
            self.selected.push(node);
        }
    }

    pub fn replace(&mut self, nodes: Vec<NodeRef>) {
        self.selected = nodes;
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn forget(&mut self, name: &str) {
        self.selected.retain(|n| n.name != name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.selected.iter().any(|n| n.name == name)
    }

    pub fn selected(&self) -> &[NodeRef] {
        &self.selected
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// The only selected node, as required by single-node commands.
    pub fn single(&self) -> Result<&NodeRef, EditorError> {
        match self.selected.as_slice() {
            [node] => Ok(node),
            [] => Err(EditorError::NothingSelected),
            many => Err(EditorError::MultipleNodesSelected { count: many.len() }),
        }
    }

    pub fn mark_double_click(&mut self) {
        self.double_click = true;
    }

    /// Consumes the double-click intent.
    pub fn take_double_click(&mut self) -> bool {
        std::mem::take(&mut self.double_click)
    }
}
