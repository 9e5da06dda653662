//! MatsLogic reference HTTP API
//!
//! Axum server implementing the REST collections the editor consumes, backed
//! by the in-memory `AppState`.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function returning `(StatusCode, serde_json::Value)`. The inner
//! functions are directly testable without axum dispatch machinery.
//!
//! Endpoints (all but `/health` under `/api`):
//! - GET  /health
//! - POST /auth/register, POST /auth/token, GET /auth/me
//! - GET  /users/
//! - GET|POST /graphs/
//! - GET|POST /nodes/, DELETE /nodes/:id
//! - GET|PUT|POST /nodes/:id/technique
//! - GET|POST /edges/, PUT|DELETE /edges/:id

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use mats_core::config::ServerConfig;
use mats_core::models::{
    Credentials, EdgeId, EdgeUpdate, NewEdge, NewGraph, NewNode, NewUser, NodeId, TechniqueNote,
    User,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::auth::bearer_token;
use crate::state::{AppState, StoreError};

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/token", post(token_handler))
        .route("/auth/me", get(me_handler))
        .route("/users/", get(list_users_handler))
        .route("/graphs/", get(list_graphs_handler).post(create_graph_handler))
        .route("/nodes/", get(list_nodes_handler).post(create_node_handler))
        .route("/nodes/:id", delete(delete_node_handler))
        .route(
            "/nodes/:id/technique",
            get(get_technique_handler)
                .put(update_technique_handler)
                .post(create_technique_handler),
        )
        .route("/edges/", get(list_edges_handler).post(create_edge_handler))
        .route("/edges/:id", put(update_edge_handler).delete(delete_edge_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    config: ServerConfig,
    state: Arc<AppState>,
    shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("MatsLogic API listening on http://{}/api", addr);
    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener (port 0 in tests).
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Response helpers
// ============================================================================

type Reply = (StatusCode, Value);

/// Error bodies use a `detail` field.
pub fn error_reply(error: &StoreError) -> Reply {
    let status = match error {
        StoreError::EmailTaken | StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::BadCredentials | StoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::DuplicateEdge => StatusCode::CONFLICT,
        StoreError::Forbidden => StatusCode::FORBIDDEN,
    };
    (status, json!({ "detail": error.to_string() }))
}

fn reply<T: Serialize>(status: StatusCode, result: Result<T, StoreError>) -> Reply {
    match result.map(serde_json::to_value) {
        Ok(Ok(body)) => (status, body),
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "detail": e.to_string() }),
        ),
        Err(e) => error_reply(&e),
    }
}

fn into_response((status, body): Reply) -> Response {
    if status == StatusCode::NO_CONTENT {
        status.into_response()
    } else {
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub fn health_inner(state: &AppState) -> Reply {
    let (users, graphs, nodes, edges) = state.counts();
    (
        StatusCode::OK,
        json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "users": users,
            "graphs": graphs,
            "nodes": nodes,
            "edges": edges,
        }),
    )
}

pub fn register_inner(state: &AppState, req: NewUser) -> Reply {
    reply(StatusCode::CREATED, state.register(&req))
}

pub fn token_inner(state: &AppState, req: Credentials) -> Reply {
    reply(StatusCode::OK, state.login(&req))
}

/// Run `op` as the user owning `token`, or answer 401.
fn as_caller(state: &AppState, token: Option<&str>, op: impl FnOnce(&User) -> Reply) -> Reply {
    match state.authenticate(token) {
        Ok(user) => op(&user),
        Err(e) => error_reply(&e),
    }
}

pub fn me_inner(state: &AppState, token: Option<&str>) -> Reply {
    as_caller(state, token, |user| reply(StatusCode::OK, Ok(user)))
}

pub fn list_users_inner(state: &AppState, token: Option<&str>) -> Reply {
    as_caller(state, token, |_| reply(StatusCode::OK, Ok(state.list_users())))
}

pub fn list_graphs_inner(state: &AppState, token: Option<&str>) -> Reply {
    as_caller(state, token, |user| {
        reply(StatusCode::OK, Ok(state.list_graphs(user)))
    })
}

pub fn create_graph_inner(state: &AppState, token: Option<&str>, req: NewGraph) -> Reply {
    as_caller(state, token, |user| {
        reply(StatusCode::CREATED, state.create_graph(user, &req))
    })
}

pub fn list_nodes_inner(state: &AppState, token: Option<&str>) -> Reply {
    as_caller(state, token, |user| {
        reply(StatusCode::OK, Ok(state.list_nodes(user)))
    })
}

pub fn create_node_inner(state: &AppState, token: Option<&str>, req: NewNode) -> Reply {
    as_caller(state, token, |user| {
        reply(StatusCode::CREATED, state.create_node(user, &req))
    })
}

pub fn delete_node_inner(state: &AppState, token: Option<&str>, id: NodeId) -> Reply {
    as_caller(state, token, |user| {
        reply(StatusCode::NO_CONTENT, state.delete_node(user, id))
    })
}

pub fn list_edges_inner(state: &AppState, token: Option<&str>) -> Reply {
    as_caller(state, token, |user| {
        reply(StatusCode::OK, Ok(state.list_edges(user)))
    })
}

pub fn create_edge_inner(state: &AppState, token: Option<&str>, req: NewEdge) -> Reply {
    as_caller(state, token, |user| {
        let result = state.create_edge(user, &req);
        if matches!(result, Err(StoreError::DuplicateEdge)) {
            tracing::debug!(
                from = %req.from_node_id,
                to = %req.to_node_id,
                "Rejected duplicate edge"
            );
        }
        reply(StatusCode::CREATED, result)
    })
}

pub fn update_edge_inner(
    state: &AppState,
    token: Option<&str>,
    id: EdgeId,
    req: EdgeUpdate,
) -> Reply {
    as_caller(state, token, |user| {
        reply(StatusCode::OK, state.update_edge(user, id, &req))
    })
}

pub fn delete_edge_inner(state: &AppState, token: Option<&str>, id: EdgeId) -> Reply {
    as_caller(state, token, |user| {
        reply(StatusCode::NO_CONTENT, state.delete_edge(user, id))
    })
}

pub fn get_technique_inner(state: &AppState, token: Option<&str>, node: NodeId) -> Reply {
    as_caller(state, token, |user| {
        reply(StatusCode::OK, state.get_technique(user, node))
    })
}

pub fn update_technique_inner(
    state: &AppState,
    token: Option<&str>,
    node: NodeId,
    req: TechniqueNote,
) -> Reply {
    as_caller(state, token, |user| {
        reply(StatusCode::OK, state.update_technique(user, node, &req))
    })
}

pub fn create_technique_inner(
    state: &AppState,
    token: Option<&str>,
    node: NodeId,
    req: TechniqueNote,
) -> Reply {
    as_caller(state, token, |user| {
        reply(StatusCode::CREATED, state.create_technique(user, node, &req))
    })
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    into_response(health_inner(&state))
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewUser>,
) -> Response {
    into_response(register_inner(&state, req))
}

pub async fn token_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Credentials>,
) -> Response {
    into_response(token_inner(&state, req))
}

pub async fn me_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    into_response(me_inner(&state, bearer_token(&headers)))
}

pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    into_response(list_users_inner(&state, bearer_token(&headers)))
}

pub async fn list_graphs_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    into_response(list_graphs_inner(&state, bearer_token(&headers)))
}

pub async fn create_graph_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewGraph>,
) -> Response {
    into_response(create_graph_inner(&state, bearer_token(&headers), req))
}

pub async fn list_nodes_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    into_response(list_nodes_inner(&state, bearer_token(&headers)))
}

pub async fn create_node_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewNode>,
) -> Response {
    into_response(create_node_inner(&state, bearer_token(&headers), req))
}

pub async fn delete_node_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<NodeId>,
) -> Response {
    into_response(delete_node_inner(&state, bearer_token(&headers), id))
}

pub async fn list_edges_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    into_response(list_edges_inner(&state, bearer_token(&headers)))
}

pub async fn create_edge_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewEdge>,
) -> Response {
    into_response(create_edge_inner(&state, bearer_token(&headers), req))
}

pub async fn update_edge_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<EdgeId>,
    Json(req): Json<EdgeUpdate>,
) -> Response {
    into_response(update_edge_inner(&state, bearer_token(&headers), id, req))
}

pub async fn delete_edge_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<EdgeId>,
) -> Response {
    into_response(delete_edge_inner(&state, bearer_token(&headers), id))
}

pub async fn get_technique_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<NodeId>,
) -> Response {
    into_response(get_technique_inner(&state, bearer_token(&headers), id))
}

pub async fn update_technique_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<NodeId>,
    Json(req): Json<TechniqueNote>,
) -> Response {
    into_response(update_technique_inner(&state, bearer_token(&headers), id, req))
}

pub async fn create_technique_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<NodeId>,
    Json(req): Json<TechniqueNote>,
) -> Response {
    into_response(create_technique_inner(&state, bearer_token(&headers), id, req))
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================
