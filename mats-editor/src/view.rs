//! Projection of backend entities into renderer-ready records.
//!
//! The view model is rebuilt from scratch whenever the entity caches, the
//! active graph, the selection or the search query change. Only nodes of the
//! active graph are projected, and only edges whose both endpoints are in
//! that node set.

use mats_core::models::{Edge, EdgeId, EdgeType, GraphId, Node, NodeId, Position, PositionMap, Theme};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use uuid::Uuid;

/// Visual node type understood by the renderer.
pub const TECHNIQUE_NODE_KIND: &str = "technique";

const DIMMED_OPACITY: f32 = 0.2;

// ============================================================================
// Identity
// ============================================================================

/// Identity of a rendered edge: confirmed by the server, or provisional and
/// keyed by the client correlation id of its creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "state", content = "id", rename_all = "lowercase")]
pub enum EdgeKey {
    Saved(EdgeId),
    Pending(Uuid),
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKey::Saved(id) => write!(f, "e{}", id),
            EdgeKey::Pending(corr) => write!(f, "pending-{}", corr),
        }
    }
}

/// An edge drawn on the canvas that the server has not confirmed yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingEdge {
    pub correlation: Uuid,
    pub from_node_id: NodeId,
    pub to_node_id: NodeId,
    pub edge_type: EdgeType,
}

/// Transient ids of selected canvas elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub nodes: BTreeSet<NodeId>,
    pub edges: BTreeSet<EdgeKey>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewNode {
    pub id: NodeId,
    pub kind: &'static str,
    pub label: String,
    pub position: Position,
    pub selected: bool,
    pub highlighted: bool,
    pub dimmed: bool,
    pub opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeStyle {
    pub stroke: &'static str,
    pub label_color: &'static str,
    pub dashed: bool,
    pub animated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewEdge {
    pub key: EdgeKey,
    pub source: NodeId,
    pub target: NodeId,
    pub edge_type: EdgeType,
    pub label: Option<String>,
    pub style: EdgeStyle,
    pub selected: bool,
    pub dimmed: bool,
    pub opacity: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewModel {
    pub graph: Option<GraphId>,
    pub theme: Theme,
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
}

impl ViewModel {
    pub fn node(&self, id: NodeId) -> Option<&ViewNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, key: EdgeKey) -> Option<&ViewEdge> {
        self.edges.iter().find(|e| e.key == key)
    }

    pub fn edge_between(&self, source: NodeId, target: NodeId) -> Option<&ViewEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }
}

/// Instruction for the canvas camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ViewportCommand {
    FitView,
    CenterOn {
        x: f64,
        y: f64,
        zoom: f64,
        duration_ms: u64,
    },
}

// ============================================================================
// Projection
// ============================================================================

pub struct ProjectionInput<'a> {
    pub graph: Option<GraphId>,
    pub nodes: &'a [Node],
    pub edges: &'a [Edge],
    pub pending: &'a [PendingEdge],
    pub positions: &'a PositionMap,
    pub selection: &'a Selection,
    /// `Some` while a non-empty search query is active.
    pub matches: Option<&'a HashSet<NodeId>>,
    pub theme: Theme,
}

pub fn edge_style(edge_type: EdgeType, theme: Theme, pending: bool) -> EdgeStyle {
    let stroke = match edge_type {
        EdgeType::Positive => "#22c55e",
        EdgeType::Neutral => match theme {
            Theme::Light => "#64748b",
            Theme::Dark => "#94a3b8",
        },
        EdgeType::Negative => "#ef4444",
    };
    let label_color = match theme {
        Theme::Light => "#0f172a",
        Theme::Dark => "#e2e8f0",
    };
    EdgeStyle {
        stroke,
        label_color,
        dashed: pending,
        animated: pending,
    }
}

fn opacity(dimmed: bool) -> f32 {
    if dimmed {
        DIMMED_OPACITY
    } else {
        1.0
    }
}

pub fn project(input: &ProjectionInput<'_>) -> ViewModel {
    let Some(graph) = input.graph else {
        return ViewModel {
            graph: None,
            theme: input.theme,
            ..ViewModel::default()
        };
    };

    let nodes: Vec<ViewNode> = input
        .nodes
        .iter()
        .filter(|n| n.graph_id == graph)
        .map(|n| {
            let is_match = input.matches.map(|m| m.contains(&n.id));
            let dimmed = is_match == Some(false);
            ViewNode {
                id: n.id,
                kind: TECHNIQUE_NODE_KIND,
                label: n.name.clone(),
                position: input
                    .positions
                    .get(&n.id)
                    .copied()
                    .unwrap_or(Position::new(0.0, 0.0)),
                selected: input.selection.nodes.contains(&n.id),
                highlighted: is_match == Some(true),
                dimmed,
                opacity: opacity(dimmed),
            }
        })
        .collect();

    let included: HashSet<NodeId> = nodes.iter().map(|n| n.id).collect();
    let edge_dimmed = |from: &NodeId, to: &NodeId| match input.matches {
        Some(m) => !(m.contains(from) && m.contains(to)),
        None => false,
    };

    let saved = input
        .edges
        .iter()
        .filter(|e| included.contains(&e.from_node_id) && included.contains(&e.to_node_id))
        .map(|e| {
            let key = EdgeKey::Saved(e.id);
            let dimmed = edge_dimmed(&e.from_node_id, &e.to_node_id);
            ViewEdge {
                key,
                source: e.from_node_id,
                target: e.to_node_id,
                edge_type: e.edge_type,
                label: e.label.clone(),
                style: edge_style(e.edge_type, input.theme, false),
                selected: input.selection.edges.contains(&key),
                dimmed,
                opacity: opacity(dimmed),
            }
        });

    let pending = input
        .pending
        .iter()
        .filter(|p| included.contains(&p.from_node_id) && included.contains(&p.to_node_id))
        .map(|p| {
            let key = EdgeKey::Pending(p.correlation);
            let dimmed = edge_dimmed(&p.from_node_id, &p.to_node_id);
            ViewEdge {
                key,
                source: p.from_node_id,
                target: p.to_node_id,
                edge_type: p.edge_type,
                label: None,
                style: edge_style(p.edge_type, input.theme, true),
                selected: input.selection.edges.contains(&key),
                dimmed,
                opacity: opacity(dimmed),
            }
        });

    ViewModel {
        graph: Some(graph),
        theme: input.theme,
        nodes,
        edges: saved.chain(pending).collect(),
    }
}
