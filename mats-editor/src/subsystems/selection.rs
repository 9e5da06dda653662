//! Selection and keyboard-driven deletion.

use mats_core::models::NodeId;

use crate::editor::{DeleteReport, Editor};
use crate::view::EdgeKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Delete,
    Backspace,
    Escape,
    Char(char),
}

/// Where keyboard focus was when the key was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Canvas,
    TextInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub focus: Focus,
}

impl KeyPress {
    pub fn on_canvas(key: Key) -> Self {
        Self {
            key,
            focus: Focus::Canvas,
        }
    }
}

impl Editor {
    pub fn select_node(&mut self, id: NodeId, additive: bool) {
        if !additive {
            self.selection.clear();
        }
        if self.node_in_active_graph(id) {
            self.selection.nodes.insert(id);
        }
        self.rebuild();
    }

    pub fn select_edge(&mut self, key: EdgeKey, additive: bool) {
        if !additive {
            self.selection.clear();
        }
        if self.view.edge(key).is_some() {
            self.selection.edges.insert(key);
        }
        self.rebuild();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.rebuild();
    }

    /// Returns `None` when the key was not handled, so text inputs keep
    /// their normal editing behaviour.
    pub async fn handle_key(&mut self, press: KeyPress) -> Option<DeleteReport> {
        if press.focus == Focus::TextInput {
            return None;
        }
        match press.key {
            Key::Delete | Key::Backspace => Some(self.delete_selection().await),
            Key::Escape => {
                self.clear_selection();
                Some(DeleteReport::default())
            }
            Key::Char(_) => None,
        }
    }

    /// Delete the selected edges, then the selected nodes (whose cascade
    /// removes any remaining attached edges locally).
    pub async fn delete_selection(&mut self) -> DeleteReport {
        if self.selection.is_empty() {
            return DeleteReport::default();
        }

        let edges: Vec<EdgeKey> = self.selection.edges.iter().copied().collect();
        let nodes: Vec<NodeId> = self.selection.nodes.iter().copied().collect();

        let mut report = DeleteReport::default();
        if !edges.is_empty() {
            report = report.merge(self.delete_edges(&edges).await);
        }
        if !nodes.is_empty() {
            report = report.merge(self.delete_nodes(&nodes).await);
        }
        self.selection.clear();
        self.rebuild();
        report
    }
}
