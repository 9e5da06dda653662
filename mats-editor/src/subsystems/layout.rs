//! Node positions: debounced persistence of drags, random placement for
//! nodes without a stored position, and deterministic grid grouping.

use mats_core::models::{GraphId, NodeId, Position, PositionMap};
use rand::Rng;

use crate::editor::{messages, Editor, EditorError};
use crate::view::ViewportCommand;

/// Grid geometry used by `group_nodes`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub origin: Position,
    pub spacing_x: f64,
    pub spacing_y: f64,
}

/// Lay `ids` out row by row in a square-ish grid: the column count is the
/// ceiling of the square root of the node count.
pub fn grid_layout(ids: &[NodeId], spec: GridSpec) -> PositionMap {
    if ids.is_empty() {
        return PositionMap::new();
    }
    let columns = (ids.len() as f64).sqrt().ceil() as usize;

    ids.iter()
        .enumerate()
        .map(|(i, &id)| {
            let column = i % columns;
            let row = i / columns;
            let position = Position::new(
                spec.origin.x + column as f64 * spec.spacing_x,
                spec.origin.y + row as f64 * spec.spacing_y,
            );
            (id, position)
        })
        .collect()
}

/// A uniformly random point in `[0, extent)²`.
pub fn random_position<R: Rng + ?Sized>(rng: &mut R, extent: f64) -> Position {
    if !extent.is_finite() || extent <= 0.0 {
        return Position::new(0.0, 0.0);
    }
    Position::new(rng.gen_range(0.0..extent), rng.gen_range(0.0..extent))
}

impl Editor {
    /// Place every node of the active graph that has no position yet.
    /// Placement is not persisted until the user drags or groups.
    pub(crate) fn ensure_positions(&mut self) {
        let extent = self.config.placement_extent;
        let missing: Vec<NodeId> = self
            .graph_nodes()
            .map(|n| n.id)
            .filter(|id| !self.positions.contains_key(id))
            .collect();
        if missing.is_empty() {
            return;
        }

        let mut rng = rand::thread_rng();
        for id in missing {
            self.positions.insert(id, random_position(&mut rng, extent));
        }
    }

    /// Record a drag. The full position map of the active graph is written
    /// once the debounce window passes without further moves.
    pub fn move_node(&mut self, id: NodeId, position: Position) -> Result<(), EditorError> {
        let Some(graph) = self.active_graph else {
            return Err(EditorError::NoActiveGraph);
        };
        if !self.node_in_active_graph(id) {
            return Err(EditorError::UnknownNode(id));
        }

        self.positions.insert(id, position);
        self.position_saver.schedule((graph, self.positions.clone()));
        self.rebuild();
        Ok(())
    }

    /// Arrange all nodes of the active graph in a grid, persist immediately
    /// and ask the renderer to fit the view.
    pub fn group_nodes(&mut self) -> Result<(), EditorError> {
        let Some(graph) = self.active_graph else {
            return Err(EditorError::NoActiveGraph);
        };

        let ids: Vec<NodeId> = self.graph_nodes().map(|n| n.id).collect();
        let spec = GridSpec {
            origin: Position::new(self.config.grid_origin_x, self.config.grid_origin_y),
            spacing_x: self.config.grid_spacing_x,
            spacing_y: self.config.grid_spacing_y,
        };
        let grid = grid_layout(&ids, spec);
        self.positions.extend(grid);

        // A pending drag in this graph would overwrite the grid.
        self.write_pending_positions(Some(graph));
        self.store.save_positions(graph, &self.positions)?;

        tracing::info!(graph_id = %graph, nodes = ids.len(), "Nodes grouped into grid");
        self.viewport = Some(ViewportCommand::FitView);
        self.rebuild();
        Ok(())
    }

    pub fn position_save_pending(&self) -> bool {
        self.position_saver.is_pending()
    }

    /// Write the pending drag snapshot to the store now, unless it belongs
    /// to `discard`.
    pub(crate) fn write_pending_positions(&self, discard: Option<GraphId>) {
        let Some((graph, positions)) = self.position_saver.take() else {
            return;
        };
        if Some(graph) == discard {
            return;
        }
        if let Err(e) = self.store.save_positions(graph, &positions) {
            tracing::warn!(graph_id = %graph, error = %e, "Failed to persist positions");
            self.banner.raise(messages::LAYOUT_SAVE_FAILED);
        }
    }
}
