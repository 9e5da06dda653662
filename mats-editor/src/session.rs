//! Authentication state: the bearer token persisted in the local store and
//! the user it resolves to.

use mats_core::models::{Credentials, NewUser, User};
use mats_core::{ApiClient, ApiError, Backend, LocalStore, MatsError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Local store error: {0}")]
    Store(#[from] MatsError),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Token was accepted but the current user could not be fetched")]
    UserUnavailable,
}

pub struct Session {
    store: LocalStore,
    client: ApiClient,
    user: Option<User>,
}

impl Session {
    /// Resume from a stored token. A token the server no longer accepts is
    /// discarded and the session starts signed out.
    pub async fn restore(store: LocalStore, mut client: ApiClient) -> Self {
        let Some(token) = store.load_token() else {
            return Self {
                store,
                client,
                user: None,
            };
        };

        client.set_token(Some(token));
        let user = match client.me().await {
            Ok(Some(user)) => {
                tracing::debug!(user_id = %user.id, "Session restored");
                Some(user)
            }
            Ok(None) => {
                tracing::info!("Stored token rejected, signing out");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not validate stored token");
                None
            }
        };

        if user.is_none() {
            client.set_token(None);
            if let Err(e) = store.clear_token() {
                tracing::warn!(error = %e, "Failed to clear stored token");
            }
        }

        Self {
            store,
            client,
            user,
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<&User, SessionError> {
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let Some(token) = self.client.login(&credentials).await? else {
            return Err(SessionError::InvalidCredentials);
        };

        self.store.save_token(&token.access_token)?;
        self.client.set_token(Some(token.access_token));

        let user = self.client.me().await?.ok_or(SessionError::UserUnavailable)?;
        tracing::info!(user_id = %user.id, "Signed in");
        Ok(self.user.insert(user))
    }

    /// Create an account, then sign in with it.
    pub async fn register(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<&User, SessionError> {
        let request = NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let created = self.client.register(&request).await?;
        tracing::info!(user_id = %created.id, "Account registered");
        self.login(email, password).await
    }

    pub fn logout(&mut self) -> Result<(), SessionError> {
        self.store.clear_token()?;
        self.client.set_token(None);
        self.user = None;
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The authenticated client, for building an `Editor`.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::with_base_url(server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({ "detail": "Invalid credentials" })),
            )
            .mount(&server)
            .await;

        let store = LocalStore::temporary().unwrap();
        let mut session = Session::restore(store.clone(), client_for(&server)).await;
        let err = session.login("ana@example.com", "nope").await.unwrap_err();

        assert!(matches!(err, SessionError::InvalidCredentials));
        assert!(!session.is_authenticated());
        assert!(session.client().token().is_none());
        assert!(store.load_token().is_none());
    }

    #[tokio::test]
    async fn test_login_stores_token_and_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 1, "name": "Ana", "email": "ana@example.com"
            })))
            .mount(&server)
            .await;

        let store = LocalStore::temporary().unwrap();
        let mut session = Session::restore(store.clone(), client_for(&server)).await;
        let user = session.login("ana@example.com", "secret").await.unwrap();

        assert_eq!(user.name, "Ana");
        assert_eq!(store.load_token().as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_restore_without_token_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let session = Session::restore(LocalStore::temporary().unwrap(), client_for(&server)).await;
        assert!(!session.is_authenticated());
    }
}
