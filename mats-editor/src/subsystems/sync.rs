//! Entity fetch/sync: bulk load, creation after server acknowledgement,
//! best-effort deletion with edge cascade, and graph selection.

use futures::future::join_all;
use mats_core::models::{EdgeId, Graph, GraphId, NewGraph, NewNode, Node, NodeId};
use mats_core::ApiError;
use std::collections::HashSet;

use crate::editor::{messages, DeleteReport, Editor, EditorError, Entities};
use crate::view::{EdgeKey, ViewportCommand};

impl Editor {
    /// Fetch users, graphs, nodes and edges concurrently. Any failure leaves
    /// the current caches untouched and raises one generic message.
    pub async fn load_all(&mut self) -> Result<(), EditorError> {
        let backend = &self.backend;
        let (users, graphs, nodes, edges) = tokio::join!(
            backend.list_users(),
            backend.list_graphs(),
            backend.list_nodes(),
            backend.list_edges(),
        );

        let loaded = (|| -> Result<Entities, ApiError> {
            Ok(Entities {
                users: users?,
                graphs: graphs?,
                nodes: nodes?,
                edges: edges?,
            })
        })();

        let entities = match loaded {
            Ok(entities) => entities,
            Err(e) => {
                tracing::warn!(error = %e, "Bulk load failed");
                self.banner.raise(messages::LOAD_FAILED);
                return Err(EditorError::LoadFailed(e));
            }
        };

        tracing::debug!(
            users = entities.users.len(),
            graphs = entities.graphs.len(),
            nodes = entities.nodes.len(),
            edges = entities.edges.len(),
            "Entities loaded"
        );
        self.hydrate(entities);
        Ok(())
    }

    /// Replace the caches with an authoritative snapshot. Provisional edges
    /// are discarded; the active graph is kept if it still exists.
    pub fn hydrate(&mut self, entities: Entities) {
        self.entities = entities;
        self.pending_edges.clear();

        if let Some(graph) = self.active_graph {
            if !self.entities.graphs.iter().any(|g| g.id == graph) {
                tracing::info!(graph_id = %graph, "Active graph no longer exists");
                self.active_graph = None;
                self.positions.clear();
            }
        }

        let nodes: HashSet<NodeId> = self.graph_nodes().map(|n| n.id).collect();
        let edges: HashSet<EdgeId> = self.entities.edges.iter().map(|e| e.id).collect();
        self.selection.nodes.retain(|id| nodes.contains(id));
        self.selection.edges.retain(|key| match key {
            EdgeKey::Saved(id) => edges.contains(id),
            EdgeKey::Pending(_) => false,
        });
        if self
            .technique
            .as_ref()
            .is_some_and(|panel| !nodes.contains(&panel.node))
        {
            self.technique = None;
        }

        self.ensure_positions();
        self.rebuild();
    }

    /// Make `graph` the active graph and load its stored layout.
    pub fn select_graph(&mut self, graph: GraphId) -> Result<(), EditorError> {
        if !self.entities.graphs.iter().any(|g| g.id == graph) {
            return Err(EditorError::UnknownGraph(graph));
        }

        self.write_pending_positions(None);
        self.active_graph = Some(graph);
        self.positions = self.store.load_positions(graph);
        self.selection.clear();
        self.technique = None;
        self.ensure_positions();
        self.viewport = Some(ViewportCommand::FitView);
        self.rebuild();

        tracing::debug!(graph_id = %graph, positioned = self.positions.len(), "Graph selected");
        Ok(())
    }

    /// Graphs owned by the signed-in user.
    pub fn my_graphs(&self) -> Vec<&Graph> {
        match &self.current_user {
            Some(user) => self
                .entities
                .graphs
                .iter()
                .filter(|g| g.user_id == user.id)
                .collect(),
            None => self.entities.graphs.iter().collect(),
        }
    }

    pub async fn create_graph(&mut self, title: &str) -> Result<Graph, EditorError> {
        let Some(user_id) = self.current_user.as_ref().map(|u| u.id) else {
            self.banner.raise(messages::NOT_SIGNED_IN);
            return Err(EditorError::NotSignedIn);
        };

        let request = NewGraph {
            title: title.to_string(),
            user_id,
        };
        match self.backend.create_graph(&request).await {
            Ok(graph) => {
                tracing::info!(graph_id = %graph.id, title = %graph.title, "Graph created");
                self.entities.graphs.push(graph.clone());
                Ok(graph)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Graph creation failed");
                self.banner.raise(messages::GRAPH_CREATE_FAILED);
                Err(e.into())
            }
        }
    }

    /// Create a technique in the active graph. It is added locally only
    /// once the server has acknowledged it.
    pub async fn create_node(&mut self, name: &str) -> Result<Node, EditorError> {
        let Some(graph_id) = self.active_graph else {
            self.banner.raise(messages::NO_ACTIVE_GRAPH);
            return Err(EditorError::NoActiveGraph);
        };

        let request = NewNode {
            name: name.to_string(),
            graph_id,
        };
        match self.backend.create_node(&request).await {
            Ok(node) => {
                tracing::info!(node_id = %node.id, name = %node.name, "Technique created");
                self.entities.nodes.push(node.clone());
                self.ensure_positions();
                self.rebuild();
                Ok(node)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Technique creation failed");
                self.banner.raise(messages::NODE_CREATE_FAILED);
                Err(e.into())
            }
        }
    }

    /// Delete nodes one request per id, then drop them and every edge that
    /// references them from the caches regardless of individual outcomes.
    pub async fn delete_nodes(&mut self, ids: &[NodeId]) -> DeleteReport {
        if ids.is_empty() {
            return DeleteReport::default();
        }

        let backend = &self.backend;
        let results = join_all(ids.iter().map(|&id| async move {
            (id, backend.delete_node(id).await)
        }))
        .await;

        let mut report = DeleteReport {
            requested: ids.len(),
            failed: 0,
        };
        for (id, result) in results {
            if let Err(e) = result {
                tracing::warn!(node_id = %id, error = %e, "Node delete failed; local state pruned anyway");
                report.failed += 1;
            }
        }

        let doomed: HashSet<NodeId> = ids.iter().copied().collect();
        self.entities.nodes.retain(|n| !doomed.contains(&n.id));
        self.entities
            .edges
            .retain(|e| !doomed.contains(&e.from_node_id) && !doomed.contains(&e.to_node_id));
        self.pending_edges
            .retain(|p| !doomed.contains(&p.from_node_id) && !doomed.contains(&p.to_node_id));

        let remaining: HashSet<EdgeId> = self.entities.edges.iter().map(|e| e.id).collect();
        self.selection.nodes.retain(|id| !doomed.contains(id));
        self.selection.edges.retain(|key| match key {
            EdgeKey::Saved(id) => remaining.contains(id),
            EdgeKey::Pending(corr) => self.pending_edges.iter().any(|p| p.correlation == *corr),
        });
        if self
            .technique
            .as_ref()
            .is_some_and(|panel| doomed.contains(&panel.node))
        {
            self.technique = None;
        }

        self.rebuild();
        report
    }

    /// Delete edges one request per id. Provisional edges have nothing to
    /// delete server-side and are just dropped.
    pub async fn delete_edges(&mut self, keys: &[EdgeKey]) -> DeleteReport {
        let saved: Vec<EdgeId> = keys
            .iter()
            .filter_map(|k| match k {
                EdgeKey::Saved(id) => Some(*id),
                EdgeKey::Pending(_) => None,
            })
            .collect();

        let backend = &self.backend;
        let results = join_all(saved.iter().map(|&id| async move {
            (id, backend.delete_edge(id).await)
        }))
        .await;

        let mut report = DeleteReport {
            requested: saved.len(),
            failed: 0,
        };
        for (id, result) in results {
            if let Err(e) = result {
                tracing::warn!(edge_id = %id, error = %e, "Edge delete failed; local state pruned anyway");
                report.failed += 1;
            }
        }

        let doomed: HashSet<EdgeKey> = keys.iter().copied().collect();
        self.entities
            .edges
            .retain(|e| !doomed.contains(&EdgeKey::Saved(e.id)));
        self.pending_edges
            .retain(|p| !doomed.contains(&EdgeKey::Pending(p.correlation)));
        self.selection.edges.retain(|k| !doomed.contains(k));

        self.rebuild();
        report
    }
}
