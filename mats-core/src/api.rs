//! REST client for the MatsLogic backend.
//!
//! Provides a `Backend` trait covering every documented endpoint and an
//! `ApiClient` implementation over `reqwest`. Status codes are mapped into
//! `ApiError` so callers can tell transport failures, conflicts, and
//! not-found control-flow signals apart.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::models::{
    Credentials, Edge, EdgeId, EdgeUpdate, Graph, NewEdge, NewGraph, NewNode, NewUser, Node,
    NodeId, TechniqueNote, TokenResponse, User,
};

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {body}")]
    Status { code: u16, body: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,
}

impl ApiError {
    /// True when the request never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Http(e) if !e.is_decode() && !e.is_status())
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            ApiError::Status { code, .. } => Some(*code),
            ApiError::Conflict(_) => Some(409),
            ApiError::NotFound => Some(404),
            ApiError::Unauthorized => Some(401),
        }
    }
}

// ============================================================================
// Backend trait
// ============================================================================

/// Abstraction over the backend REST API.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn register(&self, user: &NewUser) -> Result<User, ApiError>;

    /// Exchange credentials for a token. `None` on any non-2xx response.
    async fn login(&self, credentials: &Credentials) -> Result<Option<TokenResponse>, ApiError>;

    /// Resolve the current bearer token. `None` on any non-2xx response.
    async fn me(&self) -> Result<Option<User>, ApiError>;

    async fn list_users(&self) -> Result<Vec<User>, ApiError>;
    async fn list_graphs(&self) -> Result<Vec<Graph>, ApiError>;
    async fn create_graph(&self, graph: &NewGraph) -> Result<Graph, ApiError>;

    async fn list_nodes(&self) -> Result<Vec<Node>, ApiError>;
    async fn create_node(&self, node: &NewNode) -> Result<Node, ApiError>;
    async fn delete_node(&self, id: NodeId) -> Result<(), ApiError>;

    async fn list_edges(&self) -> Result<Vec<Edge>, ApiError>;
    async fn create_edge(&self, edge: &NewEdge) -> Result<Edge, ApiError>;
    async fn update_edge(&self, id: EdgeId, update: &EdgeUpdate) -> Result<Edge, ApiError>;
    async fn delete_edge(&self, id: EdgeId) -> Result<(), ApiError>;

    /// Fetch the technique note for a node. `None` when none exists yet.
    async fn get_technique(&self, node: NodeId) -> Result<Option<TechniqueNote>, ApiError>;
    async fn update_technique(
        &self,
        node: NodeId,
        note: &TechniqueNote,
    ) -> Result<TechniqueNote, ApiError>;
    async fn create_technique(
        &self,
        node: NodeId,
        note: &TechniqueNote,
    ) -> Result<TechniqueNote, ApiError>;

    /// Update-or-create: try `PUT` first and fall back to `POST` when the
    /// server reports the note does not exist.
    async fn save_technique(
        &self,
        node: NodeId,
        note: &TechniqueNote,
    ) -> Result<TechniqueNote, ApiError> {
        match self.update_technique(node, note).await {
            Err(ApiError::NotFound) => self.create_technique(node, note).await,
            other => other,
        }
    }
}

// ============================================================================
// ApiClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::new(&ApiConfig {
            base_url: base_url.into(),
            ..ApiConfig::default()
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.authorized(self.client.get(self.url(path))).send().await?;
        decode(response).await
    }

    async fn post<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .authorized(self.client.post(self.url(path)))
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    async fn put<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .authorized(self.client.put(self.url(path)))
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let response = self
            .authorized(self.client.delete(self.url(path)))
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }
}

/// Map non-success statuses onto `ApiError`, passing successful responses through.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(code = status.as_u16(), body = %body, "Backend returned error status");

    Err(match status {
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::CONFLICT => ApiError::Conflict(body),
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        other => ApiError::Status {
            code: other.as_u16(),
            body,
        },
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = check_status(response).await?;
    Ok(response.json().await?)
}

#[async_trait]
impl Backend for ApiClient {
    async fn register(&self, user: &NewUser) -> Result<User, ApiError> {
        self.post("/auth/register", user).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<Option<TokenResponse>, ApiError> {
        let response = self
            .client
            .post(self.url("/auth/token"))
            .json(credentials)
            .send()
            .await?;
        if !response.status().is_success() {
            tracing::debug!(code = response.status().as_u16(), "Token request rejected");
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }

    async fn me(&self) -> Result<Option<User>, ApiError> {
        if self.token.is_none() {
            return Ok(None);
        }
        let response = self
            .authorized(self.client.get(self.url("/auth/me")))
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }

    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.get("/users/").await
    }

    async fn list_graphs(&self) -> Result<Vec<Graph>, ApiError> {
        self.get("/graphs/").await
    }

    async fn create_graph(&self, graph: &NewGraph) -> Result<Graph, ApiError> {
        self.post("/graphs/", graph).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ApiError> {
        self.get("/nodes/").await
    }

    async fn create_node(&self, node: &NewNode) -> Result<Node, ApiError> {
        self.post("/nodes/", node).await
    }

    async fn delete_node(&self, id: NodeId) -> Result<(), ApiError> {
        self.delete(&format!("/nodes/{}", id)).await
    }

    async fn list_edges(&self) -> Result<Vec<Edge>, ApiError> {
        self.get("/edges/").await
    }

    async fn create_edge(&self, edge: &NewEdge) -> Result<Edge, ApiError> {
        self.post("/edges/", edge).await
    }

    async fn update_edge(&self, id: EdgeId, update: &EdgeUpdate) -> Result<Edge, ApiError> {
        self.put(&format!("/edges/{}", id), update).await
    }

    async fn delete_edge(&self, id: EdgeId) -> Result<(), ApiError> {
        self.delete(&format!("/edges/{}", id)).await
    }

    async fn get_technique(&self, node: NodeId) -> Result<Option<TechniqueNote>, ApiError> {
        match self.get(&format!("/nodes/{}/technique", node)).await {
            Ok(note) => Ok(Some(note)),
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update_technique(
        &self,
        node: NodeId,
        note: &TechniqueNote,
    ) -> Result<TechniqueNote, ApiError> {
        self.put(&format!("/nodes/{}/technique", node), note).await
    }

    async fn create_technique(
        &self,
        node: NodeId,
        note: &TechniqueNote,
    ) -> Result<TechniqueNote, ApiError> {
        self.post(&format!("/nodes/{}/technique", node), note).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
