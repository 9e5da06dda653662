//! In-memory `Backend` used by the editor unit tests.

use async_trait::async_trait;
use mats_core::models::{
    Credentials, Edge, EdgeId, EdgeType, EdgeUpdate, Graph, GraphId, NewEdge, NewGraph, NewNode,
    NewUser, Node, NodeId, TechniqueNote, TokenResponse, User, UserId,
};
use mats_core::{ApiError, Backend, EditorConfig, LocalStore};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::editor::Editor;

#[derive(Default)]
pub struct MockState {
    pub users: Vec<User>,
    pub graphs: Vec<Graph>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub techniques: HashMap<NodeId, TechniqueNote>,
    pub next_id: i64,
    /// Every list call fails with a 500.
    pub fail_lists: bool,
    /// Edge creation fails with a 500 instead of succeeding.
    pub fail_create_edge: bool,
    pub fail_edge_update: bool,
    pub fail_node_deletes: HashSet<NodeId>,
    /// Technique reads fail with a 503.
    pub fail_get_technique: bool,
    /// Request log, e.g. `DELETE /edges/3`.
    pub calls: Vec<String>,
}

#[derive(Default, Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

fn server_error() -> ApiError {
    ApiError::Status {
        code: 500,
        body: "boom".to_string(),
    }
}

impl MockBackend {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// One user (id 1) owning graphs 1 and 2.
    pub fn seeded() -> Self {
        let backend = Self::default();
        {
            let mut s = backend.state();
            s.next_id = 100;
            s.users.push(User {
                id: UserId(1),
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
            });
            for (id, title) in [(1, "Guard"), (2, "Standing")] {
                s.graphs.push(Graph {
                    id: GraphId(id),
                    title: title.to_string(),
                    user_id: UserId(1),
                });
            }
        }
        backend
    }

    pub fn add_node(&self, id: i64, name: &str, graph: i64) {
        self.state().nodes.push(Node {
            id: NodeId(id),
            name: name.to_string(),
            graph_id: GraphId(graph),
        });
    }

    pub fn add_edge(&self, id: i64, from: i64, to: i64) {
        self.state().edges.push(Edge {
            id: EdgeId(id),
            from_node_id: NodeId(from),
            to_node_id: NodeId(to),
            edge_type: EdgeType::Neutral,
            label: None,
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn next_id(&self) -> i64 {
        let mut s = self.state();
        s.next_id += 1;
        s.next_id
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn register(&self, user: &NewUser) -> Result<User, ApiError> {
        let id = self.next_id();
        let user = User {
            id: UserId(id),
            name: user.name.clone(),
            email: user.email.clone(),
        };
        self.state().users.push(user.clone());
        Ok(user)
    }

    async fn login(&self, _credentials: &Credentials) -> Result<Option<TokenResponse>, ApiError> {
        Ok(Some(TokenResponse {
            access_token: "token".to_string(),
            token_type: "bearer".to_string(),
        }))
    }

    async fn me(&self) -> Result<Option<User>, ApiError> {
        Ok(self.state().users.first().cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let s = self.state();
        if s.fail_lists {
            return Err(server_error());
        }
        Ok(s.users.clone())
    }

    async fn list_graphs(&self) -> Result<Vec<Graph>, ApiError> {
        let s = self.state();
        if s.fail_lists {
            return Err(server_error());
        }
        Ok(s.graphs.clone())
    }

    async fn create_graph(&self, graph: &NewGraph) -> Result<Graph, ApiError> {
        let id = self.next_id();
        let graph = Graph {
            id: GraphId(id),
            title: graph.title.clone(),
            user_id: graph.user_id,
        };
        self.state().graphs.push(graph.clone());
        Ok(graph)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ApiError> {
        let s = self.state();
        if s.fail_lists {
            return Err(server_error());
        }
        Ok(s.nodes.clone())
    }

    async fn create_node(&self, node: &NewNode) -> Result<Node, ApiError> {
        let id = self.next_id();
        let node = Node {
            id: NodeId(id),
            name: node.name.clone(),
            graph_id: node.graph_id,
        };
        self.state().nodes.push(node.clone());
        Ok(node)
    }

    async fn delete_node(&self, id: NodeId) -> Result<(), ApiError> {
        let mut s = self.state();
        s.calls.push(format!("DELETE /nodes/{}", id));
        if s.fail_node_deletes.contains(&id) {
            return Err(server_error());
        }
        s.nodes.retain(|n| n.id != id);
        s.edges.retain(|e| !e.touches(id));
        Ok(())
    }

    async fn list_edges(&self) -> Result<Vec<Edge>, ApiError> {
        let s = self.state();
        if s.fail_lists {
            return Err(server_error());
        }
        Ok(s.edges.clone())
    }

    async fn create_edge(&self, edge: &NewEdge) -> Result<Edge, ApiError> {
        if self.state().fail_create_edge {
            return Err(server_error());
        }
        let duplicate = self
            .state()
            .edges
            .iter()
            .any(|e| e.from_node_id == edge.from_node_id && e.to_node_id == edge.to_node_id);
        if duplicate {
            return Err(ApiError::Conflict("Edge already exists".to_string()));
        }
        let id = self.next_id();
        let edge = Edge {
            id: EdgeId(id),
            from_node_id: edge.from_node_id,
            to_node_id: edge.to_node_id,
            edge_type: edge.edge_type,
            label: None,
        };
        self.state().edges.push(edge.clone());
        Ok(edge)
    }

    async fn update_edge(&self, id: EdgeId, update: &EdgeUpdate) -> Result<Edge, ApiError> {
        let mut s = self.state();
        if s.fail_edge_update {
            return Err(server_error());
        }
        let edge = s
            .edges
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(ApiError::NotFound)?;
        if let Some(edge_type) = update.edge_type {
            edge.edge_type = edge_type;
        }
        if let Some(label) = &update.label {
            edge.label = (!label.is_empty()).then(|| label.clone());
        }
        Ok(edge.clone())
    }

    async fn delete_edge(&self, id: EdgeId) -> Result<(), ApiError> {
        let mut s = self.state();
        s.calls.push(format!("DELETE /edges/{}", id));
        s.edges.retain(|e| e.id != id);
        Ok(())
    }

    async fn get_technique(&self, node: NodeId) -> Result<Option<TechniqueNote>, ApiError> {
        let s = self.state();
        if s.fail_get_technique {
            return Err(ApiError::Status {
                code: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(s.techniques.get(&node).cloned())
    }

    async fn update_technique(
        &self,
        node: NodeId,
        note: &TechniqueNote,
    ) -> Result<TechniqueNote, ApiError> {
        let mut s = self.state();
        s.calls.push(format!("PUT /nodes/{}/technique", node));
        match s.techniques.get_mut(&node) {
            Some(existing) => {
                *existing = note.clone();
                Ok(note.clone())
            }
            None => Err(ApiError::NotFound),
        }
    }

    async fn create_technique(
        &self,
        node: NodeId,
        note: &TechniqueNote,
    ) -> Result<TechniqueNote, ApiError> {
        let mut s = self.state();
        s.calls.push(format!("POST /nodes/{}/technique", node));
        s.techniques.insert(node, note.clone());
        Ok(note.clone())
    }
}

/// A loaded editor on graph 1 of a seeded backend, signed in as user 1.
pub async fn editor_on(backend: &MockBackend) -> Editor {
    let store = LocalStore::temporary().unwrap();
    editor_with_store(backend, store).await
}

pub async fn editor_with_store(backend: &MockBackend, store: LocalStore) -> Editor {
    let user = backend.state().users.first().cloned();
    let mut editor = Editor::new(Arc::new(backend.clone()), store, EditorConfig::default())
        .with_user(user);
    editor.load_all().await.unwrap();
    editor.select_graph(GraphId(1)).unwrap();
    editor
}
