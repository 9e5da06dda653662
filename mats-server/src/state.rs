//! In-memory storage for the reference backend.
//!
//! Everything lives behind one lock. Ids come from a single counter shared by
//! all entity kinds. Data access is scoped to the graphs the caller owns; the
//! user list is global.

use mats_core::models::{
    Credentials, Edge, EdgeId, EdgeUpdate, Graph, GraphId, NewEdge, NewGraph, NewNode, NewUser,
    Node, NodeId, TechniqueNote, TokenResponse, User, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::auth;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Incorrect email or password")]
    BadCredentials,

    #[error("Could not validate credentials")]
    Unauthenticated,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Edge already exists")]
    DuplicateEdge,

    #[error("Not permitted")]
    Forbidden,

    #[error("{0}")]
    Invalid(String),
}

struct UserRecord {
    user: User,
    salt: String,
    password_hash: String,
}

#[derive(Default)]
struct Db {
    next_id: i64,
    users: BTreeMap<UserId, UserRecord>,
    tokens: HashMap<String, UserId>,
    graphs: BTreeMap<GraphId, Graph>,
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    techniques: HashMap<NodeId, TechniqueNote>,
}

impl Db {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn owns_graph(&self, user: UserId, graph: GraphId) -> bool {
        self.graphs.get(&graph).is_some_and(|g| g.user_id == user)
    }

    fn owned_node(&self, user: UserId, id: NodeId) -> Result<&Node, StoreError> {
        self.nodes
            .get(&id)
            .filter(|n| self.owns_graph(user, n.graph_id))
            .ok_or(StoreError::NotFound("Node"))
    }

    fn owned_edge_mut(&mut self, user: UserId, id: EdgeId) -> Result<&mut Edge, StoreError> {
        let from = self
            .edges
            .get(&id)
            .map(|e| e.from_node_id)
            .ok_or(StoreError::NotFound("Edge"))?;
        self.owned_node(user, from)
            .map_err(|_| StoreError::NotFound("Edge"))?;
        self.edges.get_mut(&id).ok_or(StoreError::NotFound("Edge"))
    }
}

fn require(field: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Invalid(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[derive(Default)]
pub struct AppState {
    db: Mutex<Db>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    fn db(&self) -> MutexGuard<'_, Db> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // Auth
    // ========================================================================

    pub fn register(&self, request: &NewUser) -> Result<User, StoreError> {
        require("name", &request.name)?;
        require("email", &request.email)?;
        require("password", &request.password)?;

        let mut db = self.db();
        let email = request.email.trim().to_lowercase();
        if db.users.values().any(|r| r.user.email == email) {
            return Err(StoreError::EmailTaken);
        }

        let id = UserId(db.next_id());
        let salt = auth::generate_salt();
        let password_hash = auth::hash_password(&request.password, &salt);
        let user = User {
            id,
            name: request.name.trim().to_string(),
            email,
        };
        db.users.insert(
            id,
            UserRecord {
                user: user.clone(),
                salt,
                password_hash,
            },
        );
        tracing::info!(user_id = %id, "User registered");
        Ok(user)
    }

    pub fn login(&self, credentials: &Credentials) -> Result<TokenResponse, StoreError> {
        let mut db = self.db();
        let email = credentials.email.trim().to_lowercase();
        let user_id = db
            .users
            .values()
            .find(|r| r.user.email == email)
            .filter(|r| auth::verify_password(&credentials.password, &r.salt, &r.password_hash))
            .map(|r| r.user.id)
            .ok_or(StoreError::BadCredentials)?;

        let token = auth::issue_token();
        db.tokens.insert(token.clone(), user_id);
        tracing::debug!(user_id = %user_id, "Token issued");
        Ok(TokenResponse {
            access_token: token,
            token_type: "bearer".to_string(),
        })
    }

    /// Resolve a bearer token to its user.
    pub fn authenticate(&self, token: Option<&str>) -> Result<User, StoreError> {
        let db = self.db();
        token
            .and_then(|t| db.tokens.get(t))
            .and_then(|id| db.users.get(id))
            .map(|r| r.user.clone())
            .ok_or(StoreError::Unauthenticated)
    }

    pub fn list_users(&self) -> Vec<User> {
        self.db().users.values().map(|r| r.user.clone()).collect()
    }

    // ========================================================================
    // Graphs and nodes
    // ========================================================================

    pub fn list_graphs(&self, caller: &User) -> Vec<Graph> {
        self.db()
            .graphs
            .values()
            .filter(|g| g.user_id == caller.id)
            .cloned()
            .collect()
    }

    pub fn create_graph(&self, caller: &User, request: &NewGraph) -> Result<Graph, StoreError> {
        require("title", &request.title)?;
        if request.user_id != caller.id {
            return Err(StoreError::Forbidden);
        }

        let mut db = self.db();
        let graph = Graph {
            id: GraphId(db.next_id()),
            title: request.title.trim().to_string(),
            user_id: caller.id,
        };
        db.graphs.insert(graph.id, graph.clone());
        Ok(graph)
    }

    pub fn list_nodes(&self, caller: &User) -> Vec<Node> {
        let db = self.db();
        db.nodes
            .values()
            .filter(|n| db.owns_graph(caller.id, n.graph_id))
            .cloned()
            .collect()
    }

    pub fn create_node(&self, caller: &User, request: &NewNode) -> Result<Node, StoreError> {
        require("name", &request.name)?;

        let mut db = self.db();
        if !db.owns_graph(caller.id, request.graph_id) {
            return Err(StoreError::NotFound("Graph"));
        }
        let node = Node {
            id: NodeId(db.next_id()),
            name: request.name.trim().to_string(),
            graph_id: request.graph_id,
        };
        db.nodes.insert(node.id, node.clone());
        Ok(node)
    }

    /// Remove a node together with its edges and technique note.
    pub fn delete_node(&self, caller: &User, id: NodeId) -> Result<(), StoreError> {
        let mut db = self.db();
        db.owned_node(caller.id, id)?;

        db.nodes.remove(&id);
        db.techniques.remove(&id);
        let before = db.edges.len();
        db.edges.retain(|_, e| !e.touches(id));
        tracing::debug!(node_id = %id, edges_removed = before - db.edges.len(), "Node deleted");
        Ok(())
    }

    // ========================================================================
    // Edges
    // ========================================================================

    pub fn list_edges(&self, caller: &User) -> Vec<Edge> {
        let db = self.db();
        db.edges
            .values()
            .filter(|e| db.owned_node(caller.id, e.from_node_id).is_ok())
            .cloned()
            .collect()
    }

    /// Create a transition. The ordered `(from, to)` pair is unique; the
    /// reverse direction is a different transition.
    pub fn create_edge(&self, caller: &User, request: &NewEdge) -> Result<Edge, StoreError> {
        let mut db = self.db();
        let from_graph = db.owned_node(caller.id, request.from_node_id)?.graph_id;
        let to_graph = db.owned_node(caller.id, request.to_node_id)?.graph_id;
        if from_graph != to_graph {
            return Err(StoreError::Invalid(
                "Both techniques must belong to the same graph".to_string(),
            ));
        }
        let duplicate = db.edges.values().any(|e| {
            e.from_node_id == request.from_node_id && e.to_node_id == request.to_node_id
        });
        if duplicate {
            return Err(StoreError::DuplicateEdge);
        }

        let edge = Edge {
            id: EdgeId(db.next_id()),
            from_node_id: request.from_node_id,
            to_node_id: request.to_node_id,
            edge_type: request.edge_type,
            label: None,
        };
        db.edges.insert(edge.id, edge.clone());
        Ok(edge)
    }

    pub fn update_edge(
        &self,
        caller: &User,
        id: EdgeId,
        update: &EdgeUpdate,
    ) -> Result<Edge, StoreError> {
        let mut db = self.db();
        let edge = db.owned_edge_mut(caller.id, id)?;
        if let Some(edge_type) = update.edge_type {
            edge.edge_type = edge_type;
        }
        if let Some(label) = &update.label {
            edge.label = (!label.is_empty()).then(|| label.clone());
        }
        Ok(edge.clone())
    }

    pub fn delete_edge(&self, caller: &User, id: EdgeId) -> Result<(), StoreError> {
        let mut db = self.db();
        db.owned_edge_mut(caller.id, id)?;
        db.edges.remove(&id);
        Ok(())
    }

    // ========================================================================
    // Technique notes
    // ========================================================================

    pub fn get_technique(&self, caller: &User, node: NodeId) -> Result<TechniqueNote, StoreError> {
        let db = self.db();
        db.owned_node(caller.id, node)?;
        db.techniques
            .get(&node)
            .cloned()
            .ok_or(StoreError::NotFound("Technique"))
    }

    /// Replace an existing note; absent notes are reported as not found.
    pub fn update_technique(
        &self,
        caller: &User,
        node: NodeId,
        note: &TechniqueNote,
    ) -> Result<TechniqueNote, StoreError> {
        let mut db = self.db();
        db.owned_node(caller.id, node)?;
        let existing = db
            .techniques
            .get_mut(&node)
            .ok_or(StoreError::NotFound("Technique"))?;
        *existing = note.clone();
        Ok(note.clone())
    }

    pub fn create_technique(
        &self,
        caller: &User,
        node: NodeId,
        note: &TechniqueNote,
    ) -> Result<TechniqueNote, StoreError> {
        let mut db = self.db();
        db.owned_node(caller.id, node)?;
        db.techniques.insert(node, note.clone());
        Ok(note.clone())
    }

    /// Entity counts, for the health endpoint.
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let db = self.db();
        (db.users.len(), db.graphs.len(), db.nodes.len(), db.edges.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mats_core::models::EdgeType;

    fn signed_up(state: &AppState, email: &str) -> User {
        state
            .register(&NewUser {
                name: "Ana".to_string(),
                email: email.to_string(),
                password: "pw".to_string(),
            })
            .unwrap()
    }

    fn graph_with_nodes(state: &AppState, user: &User, names: &[&str]) -> (Graph, Vec<Node>) {
        let graph = state
            .create_graph(
                user,
                &NewGraph {
                    title: "Guard".to_string(),
                    user_id: user.id,
                },
            )
            .unwrap();
        let nodes = names
            .iter()
            .map(|name| {
                state
                    .create_node(
                        user,
                        &NewNode {
                            name: name.to_string(),
                            graph_id: graph.id,
                        },
                    )
                    .unwrap()
            })
            .collect();
        (graph, nodes)
    }

    fn new_edge(from: &Node, to: &Node) -> NewEdge {
        NewEdge {
            from_node_id: from.id,
            to_node_id: to.id,
            edge_type: EdgeType::Neutral,
        }
    }

    #[test]
    fn test_register_rejects_duplicate_email_case_insensitively() {
        let state = AppState::new();
        signed_up(&state, "ana@example.com");
        let err = state
            .register(&NewUser {
                name: "Other".to_string(),
                email: "ANA@example.com".to_string(),
                password: "x".to_string(),
            })
            .unwrap_err();
        assert_eq!(err, StoreError::EmailTaken);
    }

    #[test]
    fn test_login_and_authenticate() {
        let state = AppState::new();
        let user = signed_up(&state, "ana@example.com");

        let bad = Credentials {
            email: "ana@example.com".to_string(),
            password: "wrong".to_string(),
        };
        assert_eq!(state.login(&bad).unwrap_err(), StoreError::BadCredentials);

        let good = Credentials {
            password: "pw".to_string(),
            ..bad
        };
        let token = state.login(&good).unwrap();
        assert_eq!(token.token_type, "bearer");
        assert_eq!(state.authenticate(Some(&token.access_token)).unwrap(), user);
        assert_eq!(
            state.authenticate(Some("nope")).unwrap_err(),
            StoreError::Unauthenticated
        );
    }

    #[test]
    fn test_duplicate_edges_are_directional() {
        let state = AppState::new();
        let user = signed_up(&state, "ana@example.com");
        let (_, nodes) = graph_with_nodes(&state, &user, &["A", "B"]);

        state.create_edge(&user, &new_edge(&nodes[0], &nodes[1])).unwrap();
        assert_eq!(
            state
                .create_edge(&user, &new_edge(&nodes[0], &nodes[1]))
                .unwrap_err(),
            StoreError::DuplicateEdge
        );
        assert!(state.create_edge(&user, &new_edge(&nodes[1], &nodes[0])).is_ok());
    }

    #[test]
    fn test_delete_node_cascades_edges_and_note() {
        let state = AppState::new();
        let user = signed_up(&state, "ana@example.com");
        let (_, nodes) = graph_with_nodes(&state, &user, &["A", "B", "C"]);
        state.create_edge(&user, &new_edge(&nodes[0], &nodes[1])).unwrap();
        state.create_edge(&user, &new_edge(&nodes[1], &nodes[2])).unwrap();
        state
            .create_technique(&user, nodes[1].id, &TechniqueNote::new("v", "s"))
            .unwrap();

        state.delete_node(&user, nodes[1].id).unwrap();

        assert!(state.list_edges(&user).is_empty());
        assert_eq!(
            state.get_technique(&user, nodes[1].id).unwrap_err(),
            StoreError::NotFound("Node")
        );
        assert_eq!(state.list_nodes(&user).len(), 2);
    }

    #[test]
    fn test_update_technique_requires_existing_note() {
        let state = AppState::new();
        let user = signed_up(&state, "ana@example.com");
        let (_, nodes) = graph_with_nodes(&state, &user, &["A"]);
        let note = TechniqueNote::new("https://x", "1) grip");

        assert_eq!(
            state.update_technique(&user, nodes[0].id, &note).unwrap_err(),
            StoreError::NotFound("Technique")
        );
        state.create_technique(&user, nodes[0].id, &note).unwrap();
        assert_eq!(state.get_technique(&user, nodes[0].id).unwrap(), note);
    }

    #[test]
    fn test_data_is_scoped_to_owner() {
        let state = AppState::new();
        let ana = signed_up(&state, "ana@example.com");
        let bo = signed_up(&state, "bo@example.com");
        let (graph, nodes) = graph_with_nodes(&state, &ana, &["A", "B"]);

        assert!(state.list_graphs(&bo).is_empty());
        assert!(state.list_nodes(&bo).is_empty());
        assert_eq!(state.list_users().len(), 2);
        assert_eq!(
            state
                .create_node(
                    &bo,
                    &NewNode {
                        name: "X".to_string(),
                        graph_id: graph.id
                    }
                )
                .unwrap_err(),
            StoreError::NotFound("Graph")
        );
        assert_eq!(
            state.delete_node(&bo, nodes[0].id).unwrap_err(),
            StoreError::NotFound("Node")
        );
    }

    #[test]
    fn test_graph_for_someone_else_is_forbidden() {
        let state = AppState::new();
        let ana = signed_up(&state, "ana@example.com");
        let bo = signed_up(&state, "bo@example.com");
        let err = state
            .create_graph(
                &bo,
                &NewGraph {
                    title: "Mine".to_string(),
                    user_id: ana.id,
                },
            )
            .unwrap_err();
        assert_eq!(err, StoreError::Forbidden);
    }
}
