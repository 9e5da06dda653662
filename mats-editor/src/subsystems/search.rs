//! Technique search and match highlighting.

use mats_core::models::{Node, NodeId, Position};

use crate::editor::{Editor, EditorError};
use crate::view::ViewportCommand;

/// Case-insensitive substring match on the technique name.
pub fn name_matches(name: &str, query: &str) -> bool {
    let query = query.trim();
    !query.is_empty() && name.to_lowercase().contains(&query.to_lowercase())
}

impl Editor {
    /// Set the active query. Matches are highlighted and everything else is
    /// dimmed; an empty query restores full opacity.
    pub fn set_search(&mut self, query: &str) {
        self.search = query.to_string();
        self.rebuild();
    }

    pub fn clear_search(&mut self) {
        self.set_search("");
    }

    pub fn search_query(&self) -> &str {
        &self.search
    }

    /// Every node of the active graph matching the query, in backend order.
    pub(crate) fn matching_nodes(&self) -> impl Iterator<Item = &Node> {
        let query = self.search.clone();
        self.graph_nodes()
            .filter(move |n| name_matches(&n.name, &query))
    }

    /// The result list shown to the user, capped at the configured limit.
    pub fn search_results(&self) -> Vec<&Node> {
        self.matching_nodes().take(self.config.search_limit).collect()
    }

    /// Centre the viewport on a result and open its technique panel.
    pub async fn focus_result(&mut self, node: NodeId) -> Result<ViewportCommand, EditorError> {
        if !self.node_in_active_graph(node) {
            return Err(EditorError::UnknownNode(node));
        }
        let position = self
            .positions
            .get(&node)
            .copied()
            .unwrap_or(Position::new(0.0, 0.0));

        let command = ViewportCommand::CenterOn {
            x: position.x,
            y: position.y,
            zoom: self.config.focus_zoom,
            duration_ms: self.config.focus_duration_ms,
        };
        self.viewport = Some(command);
        self.open_technique(node).await?;
        Ok(command)
    }
}
