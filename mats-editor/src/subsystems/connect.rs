//! Optimistic edge creation and in-place edge edits.
//!
//! Drawing a connection shows a provisional edge immediately. The creation
//! request carries a client correlation id; confirmation swaps the
//! provisional edge for the server entity, rejection reloads everything
//! from the server and raises a message specific to the failure.

use mats_core::models::{Edge, EdgeId, EdgeType, EdgeUpdate, NewEdge, NodeId};
use mats_core::ApiError;
use uuid::Uuid;

use crate::editor::{messages, Editor, EditorError, FailureKind};
use crate::view::{EdgeKey, PendingEdge};

/// Handle for an edge creation that has been applied locally but not yet
/// confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectTicket {
    pub correlation: Uuid,
    pub request: NewEdge,
}

impl ConnectTicket {
    pub fn key(&self) -> EdgeKey {
        EdgeKey::Pending(self.correlation)
    }
}

/// Pick the banner text for a failed edge creation.
pub fn connect_failure_message(error: &ApiError) -> &'static str {
    match FailureKind::of(error) {
        FailureKind::Conflict => messages::EDGE_DUPLICATE,
        FailureKind::Network => messages::EDGE_NETWORK,
        FailureKind::Status | FailureKind::NotFound => messages::EDGE_FAILED,
    }
}

impl Editor {
    /// Show a provisional edge between two techniques of the active graph.
    /// Returns `None` when either endpoint is not part of it.
    pub fn begin_connect(&mut self, from: NodeId, to: NodeId) -> Option<ConnectTicket> {
        if !self.node_in_active_graph(from) || !self.node_in_active_graph(to) {
            tracing::debug!(from = %from, to = %to, "Ignoring connection outside the active graph");
            return None;
        }

        let ticket = ConnectTicket {
            correlation: Uuid::new_v4(),
            request: NewEdge {
                from_node_id: from,
                to_node_id: to,
                edge_type: EdgeType::default(),
            },
        };

        self.pending_edges.push(PendingEdge {
            correlation: ticket.correlation,
            from_node_id: from,
            to_node_id: to,
            edge_type: ticket.request.edge_type,
        });
        self.rebuild();
        Some(ticket)
    }

    /// Reconcile a provisional edge with the server's answer.
    pub async fn complete_connect(
        &mut self,
        ticket: ConnectTicket,
        result: Result<Edge, ApiError>,
    ) -> Result<Edge, EditorError> {
        self.pending_edges
            .retain(|p| p.correlation != ticket.correlation);

        match result {
            Ok(edge) => {
                tracing::info!(
                    edge_id = %edge.id,
                    correlation = %ticket.correlation,
                    "Transition confirmed"
                );
                if !self.entities.edges.iter().any(|e| e.id == edge.id) {
                    self.entities.edges.push(edge.clone());
                }
                if self.selection.edges.remove(&ticket.key()) {
                    self.selection.edges.insert(EdgeKey::Saved(edge.id));
                }
                self.rebuild();
                Ok(edge)
            }
            Err(e) => {
                tracing::warn!(
                    correlation = %ticket.correlation,
                    error = %e,
                    "Transition rejected, reloading from server"
                );
                self.selection.edges.remove(&ticket.key());
                if self.load_all().await.is_err() {
                    // Prior state is kept; only the rejected edge disappears.
                    self.rebuild();
                }
                self.banner.raise(connect_failure_message(&e));
                Err(e.into())
            }
        }
    }

    /// Draw-to-connect: apply optimistically, send the request, reconcile.
    pub async fn connect(&mut self, from: NodeId, to: NodeId) -> Result<Edge, EditorError> {
        let Some(ticket) = self.begin_connect(from, to) else {
            let missing = if self.node_in_active_graph(from) { to } else { from };
            return Err(EditorError::UnknownNode(missing));
        };
        let result = self.backend.create_edge(&ticket.request).await;
        self.complete_connect(ticket, result).await
    }

    /// Change classification and/or label. The local change is kept even if
    /// the server rejects it.
    pub async fn update_edge(
        &mut self,
        id: EdgeId,
        update: EdgeUpdate,
    ) -> Result<Edge, EditorError> {
        let Some(local) = self.entities.edges.iter_mut().find(|e| e.id == id) else {
            return Err(EditorError::UnknownEdge(id));
        };
        if let Some(edge_type) = update.edge_type {
            local.edge_type = edge_type;
        }
        if let Some(label) = &update.label {
            local.label = if label.is_empty() {
                None
            } else {
                Some(label.clone())
            };
        }
        self.rebuild();

        match self.backend.update_edge(id, &update).await {
            Ok(edge) => {
                if let Some(local) = self.entities.edges.iter_mut().find(|e| e.id == id) {
                    *local = edge.clone();
                }
                self.rebuild();
                Ok(edge)
            }
            Err(e) => {
                tracing::warn!(edge_id = %id, error = %e, "Edge update rejected; keeping local change");
                self.banner.raise(messages::EDGE_UPDATE_FAILED);
                Err(e.into())
            }
        }
    }
}
