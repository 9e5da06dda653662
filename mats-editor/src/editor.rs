//! The editor: one owned value holding the entity caches, the client-only
//! view state and the debounced writers.
//!
//! All mutation goes through `&mut self`, so state changes are serialized.
//! The subsystems under `crate::subsystems` add the operations in separate
//! `impl Editor` blocks.

use chrono::{DateTime, Utc};
use mats_core::models::{
    Edge, EdgeId, Graph, GraphId, Node, NodeId, PositionMap, TechniqueNote, Theme, User,
};
use mats_core::{ApiError, Backend, EditorConfig, LocalStore, MatsError};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

use crate::scheduler::CoalescingScheduler;
use crate::view::{self, PendingEdge, ProjectionInput, Selection, ViewModel, ViewportCommand};

/// User-facing banner texts.
pub mod messages {
    pub const LOAD_FAILED: &str = "Failed to load data from the server.";
    pub const EDGE_DUPLICATE: &str = "That transition already exists.";
    pub const EDGE_FAILED: &str = "Could not create the transition.";
    pub const EDGE_NETWORK: &str = "Network error while creating the transition.";
    pub const EDGE_UPDATE_FAILED: &str =
        "The server rejected the transition change; it is kept locally until the next reload.";
    pub const GRAPH_CREATE_FAILED: &str = "Could not create the graph.";
    pub const NODE_CREATE_FAILED: &str = "Could not create the technique.";
    pub const NO_ACTIVE_GRAPH: &str = "Select a graph first.";
    pub const NOT_SIGNED_IN: &str = "Sign in to continue.";
    pub const LAYOUT_SAVE_FAILED: &str = "Could not save the layout.";
    pub const TECHNIQUE_LOAD_FAILED: &str = "Could not load the technique notes.";
    pub const TECHNIQUE_SAVE_FAILED: &str = "Could not save the technique notes.";
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Local store error: {0}")]
    Store(#[from] MatsError),

    #[error("Failed to load entities: {0}")]
    LoadFailed(ApiError),

    #[error("No graph is selected")]
    NoActiveGraph,

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Unknown graph {0}")]
    UnknownGraph(GraphId),

    #[error("Unknown node {0}")]
    UnknownNode(NodeId),

    #[error("Unknown edge {0}")]
    UnknownEdge(EdgeId),

    #[error("No technique panel is open")]
    NoTechniquePanel,
}

/// How a backend call failed, as far as the user is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request never produced a response.
    Network,
    /// Non-success status other than the two below.
    Status,
    Conflict,
    NotFound,
}

impl FailureKind {
    pub fn of(error: &ApiError) -> Self {
        match error {
            ApiError::Conflict(_) => FailureKind::Conflict,
            ApiError::NotFound => FailureKind::NotFound,
            e if e.is_transport() => FailureKind::Network,
            _ => FailureKind::Status,
        }
    }
}

// ============================================================================
// Banner
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// The single transient error slot. Shared with background save jobs; the
/// most recent message overwrites any earlier one.
#[derive(Debug, Clone, Default)]
pub struct BannerSlot(Arc<Mutex<Option<Banner>>>);

impl BannerSlot {
    fn guard(&self) -> MutexGuard<'_, Option<Banner>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn raise(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(message = %message, "Banner raised");
        *self.guard() = Some(Banner {
            message,
            raised_at: Utc::now(),
        });
    }

    pub fn clear(&self) {
        *self.guard() = None;
    }

    pub fn current(&self) -> Option<Banner> {
        self.guard().clone()
    }
}

// ============================================================================
// Entity cache
// ============================================================================

/// Local copies of the backend collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entities {
    pub users: Vec<User>,
    pub graphs: Vec<Graph>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Outcome of a best-effort multi-id delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub requested: usize,
    pub failed: usize,
}

impl DeleteReport {
    pub fn merge(self, other: DeleteReport) -> DeleteReport {
        DeleteReport {
            requested: self.requested + other.requested,
            failed: self.failed + other.failed,
        }
    }
}

/// The technique side panel for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct TechniquePanel {
    pub node: NodeId,
    pub draft: TechniqueNote,
}

// ============================================================================
// Editor
// ============================================================================

pub struct Editor {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) store: LocalStore,
    pub(crate) config: EditorConfig,
    pub(crate) current_user: Option<User>,
    pub(crate) entities: Entities,
    pub(crate) active_graph: Option<GraphId>,
    pub(crate) positions: PositionMap,
    pub(crate) pending_edges: Vec<PendingEdge>,
    pub(crate) selection: Selection,
    pub(crate) search: String,
    pub(crate) technique: Option<TechniquePanel>,
    pub(crate) theme: Theme,
    pub(crate) banner: BannerSlot,
    pub(crate) viewport: Option<ViewportCommand>,
    pub(crate) view: ViewModel,
    pub(crate) position_saver: CoalescingScheduler<(GraphId, PositionMap)>,
    pub(crate) technique_saver: CoalescingScheduler<(NodeId, TechniqueNote)>,
}

impl Editor {
    pub fn new(backend: Arc<dyn Backend>, store: LocalStore, config: EditorConfig) -> Self {
        let banner = BannerSlot::default();

        let position_saver = {
            let store = store.clone();
            let banner = banner.clone();
            CoalescingScheduler::new(
                "positions",
                Duration::from_millis(config.position_debounce_ms),
                move |(graph, positions): (GraphId, PositionMap)| {
                    let store = store.clone();
                    let banner = banner.clone();
                    async move {
                        if let Err(e) = store.save_positions(graph, &positions) {
                            tracing::warn!(graph_id = %graph, error = %e, "Failed to persist positions");
                            banner.raise(messages::LAYOUT_SAVE_FAILED);
                        }
                    }
                },
            )
        };

        let technique_saver = {
            let backend = Arc::clone(&backend);
            let banner = banner.clone();
            CoalescingScheduler::new(
                "technique",
                Duration::from_millis(config.technique_debounce_ms),
                move |(node, note): (NodeId, TechniqueNote)| {
                    let backend = Arc::clone(&backend);
                    let banner = banner.clone();
                    async move {
                        if let Err(e) = backend.save_technique(node, &note).await {
                            tracing::warn!(node_id = %node, error = %e, "Technique autosave failed");
                            banner.raise(messages::TECHNIQUE_SAVE_FAILED);
                        }
                    }
                },
            )
        };

        let theme = store.load_theme();

        let mut editor = Self {
            backend,
            store,
            config,
            current_user: None,
            entities: Entities::default(),
            active_graph: None,
            positions: PositionMap::new(),
            pending_edges: Vec::new(),
            selection: Selection::default(),
            search: String::new(),
            technique: None,
            theme,
            banner,
            viewport: None,
            view: ViewModel::default(),
            position_saver,
            technique_saver,
        };
        editor.rebuild();
        editor
    }

    pub fn with_user(mut self, user: Option<User>) -> Self {
        self.current_user = user;
        self
    }

    pub fn set_user(&mut self, user: Option<User>) {
        self.current_user = user;
    }

    // --- read accessors ----------------------------------------------------

    pub fn view(&self) -> &ViewModel {
        &self.view
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn active_graph(&self) -> Option<GraphId> {
        self.active_graph
    }

    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }

    pub fn pending_edges(&self) -> &[PendingEdge] {
        &self.pending_edges
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn banner(&self) -> Option<Banner> {
        self.banner.current()
    }

    pub fn dismiss_banner(&self) {
        self.banner.clear();
    }

    /// Take the last camera instruction for the renderer.
    pub fn take_viewport_command(&mut self) -> Option<ViewportCommand> {
        self.viewport.take()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Nodes of the active graph, in backend order.
    pub fn graph_nodes(&self) -> impl Iterator<Item = &Node> {
        let graph = self.active_graph;
        self.entities
            .nodes
            .iter()
            .filter(move |n| Some(n.graph_id) == graph)
    }

    pub(crate) fn node_in_active_graph(&self, id: NodeId) -> bool {
        self.graph_nodes().any(|n| n.id == id)
    }

    // --- theme -------------------------------------------------------------

    pub fn toggle_theme(&mut self) -> Result<Theme, EditorError> {
        self.theme = self.theme.toggled();
        self.store.save_theme(self.theme)?;
        self.rebuild();
        Ok(self.theme)
    }

    // --- lifecycle ---------------------------------------------------------

    /// Run any pending debounced writes now.
    pub async fn flush(&self) {
        self.position_saver.flush().await;
        self.technique_saver.flush().await;
    }

    /// Recompute the view model from current state.
    pub(crate) fn rebuild(&mut self) {
        let matches: Option<HashSet<NodeId>> = if self.search.trim().is_empty() {
            None
        } else {
            Some(self.matching_nodes().map(|n| n.id).collect())
        };

        self.view = view::project(&ProjectionInput {
            graph: self.active_graph,
            nodes: &self.entities.nodes,
            edges: &self.entities.edges,
            pending: &self.pending_edges,
            positions: &self.positions,
            selection: &self.selection,
            matches: matches.as_ref(),
            theme: self.theme,
        });
    }
}
