//! HTTP client for the integration dashboard backend

use crate::session::{MemorySessionStore, Session, SessionStore};
use integrator_core::connection::missing_fields;
use integrator_core::{
    BackendConfig, Credentials, Error, NewUser, PasswordChange, Result, SchemaDocument, Secret,
    TokenResponse, User, UserRef,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use validator::Validate;

/// API client for the dashboard backend.
///
/// Authenticated calls read the bearer token from the injected
/// [`SessionStore`]; without a session they fail before sending anything.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    session: Arc<dyn SessionStore>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client with the default request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, BackendConfig::default().request_timeout())
    }

    /// Create a client from the backend configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::with_timeout(config.base_url.clone(), config.request_timeout())
    }

    /// Create a client whose requests give up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            session: Arc::new(MemorySessionStore::new()),
        })
    }

    /// Use `store` for session state
    #[must_use]
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session = store;
        self
    }

    /// Backend base URL without trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current session, if logged in
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session.get()
    }

    /// Whether a session is present
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.get().is_some()
    }

    /// Exchange credentials for a token, then fetch the account behind it
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for empty credentials, or the backend's
    /// error. No session is kept when either request fails.
    pub async fn login(&self, credentials: &Credentials) -> Result<User> {
        if credentials.validate().is_err() {
            return Err(Error::validation("login", missing_fields(credentials)));
        }

        let request = self.client.post(self.url("/token")).form(&[
            ("username", credentials.username.as_str()),
            ("password", credentials.password.expose()),
        ]);
        let issued: TokenResponse = decode(self.send(request).await?).await?;
        self.session.set(Session::new(issued.access_token.clone()));

        match self.current_user().await {
            Ok(user) => {
                self.session.set(Session {
                    token: issued.access_token,
                    user: Some(user.clone()),
                });
                info!(username = %user.username, admin = user.is_admin, "logged in");
                Ok(user)
            }
            Err(e) => {
                self.session.clear();
                Err(e)
            }
        }
    }

    /// Drop the session
    pub fn logout(&self) {
        self.session.clear();
        info!("logged out");
    }

    /// `GET /users/me/`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] without a session, or the request error.
    pub async fn current_user(&self) -> Result<User> {
        let request = self.authorized(self.client.get(self.url("/users/me/")))?;
        decode(self.send(request).await?).await
    }

    /// `GET /users/`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] without a session, or the request error.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let request = self.authorized(self.client.get(self.url("/users/")))?;
        decode(self.send(request).await?).await
    }

    /// `POST /users/`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an incomplete form,
    /// [`Error::Authentication`] without a session, or the request error.
    pub async fn create_user(&self, user: &NewUser) -> Result<()> {
        if user.validate().is_err() {
            return Err(Error::validation("new user", missing_fields(user)));
        }
        let request = self
            .authorized(self.client.post(self.url("/users/")))?
            .json(user);
        self.send(request).await?;
        debug!(username = %user.username, "user created");
        Ok(())
    }

    /// `DELETE /users/{idOrEmail}`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] without a session, or the request error.
    pub async fn delete_user(&self, target: &UserRef) -> Result<()> {
        let path = format!("/users/{}", urlencoding::encode(&target.to_string()));
        let request = self.authorized(self.client.delete(self.url(&path)))?;
        self.send(request).await?;
        debug!(user = %target, "user deleted");
        Ok(())
    }

    /// `POST /users/change-password`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when either password is empty,
    /// [`Error::Authentication`] without a session, or the request error.
    pub async fn change_password(&self, change: &PasswordChange) -> Result<()> {
        if change.validate().is_err() {
            return Err(Error::validation("password change", missing_fields(change)));
        }
        let request = self
            .authorized(self.client.post(self.url("/users/change-password")))?
            .json(change);
        self.send(request).await?;
        Ok(())
    }

    /// `GET /schemas`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the document cannot be parsed.
    pub async fn fetch_schemas(&self) -> Result<SchemaDocument> {
        let request = self.client.get(self.url("/schemas"));
        decode(self.send(request).await?).await
    }

    /// `GET /healthcheck`; any 2xx answer is healthy
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or answers non-2xx.
    pub async fn healthcheck(&self) -> Result<()> {
        let request = self.client.get(self.url("/healthcheck"));
        self.send(request).await?;
        Ok(())
    }

    pub(crate) const fn http(&self) -> &Client {
        &self.client
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| self.transport_error(&e))?;
        check_status(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer(&self) -> Result<Secret> {
        self.session
            .get()
            .map(|session| session.token)
            .ok_or_else(|| Error::Authentication("not logged in".to_string()))
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.bearer()?;
        Ok(request.bearer_auth(token.expose()))
    }

    fn transport_error(&self, error: &reqwest::Error) -> Error {
        if error.is_timeout() {
            warn!(timeout = ?self.timeout, "request timed out");
            Error::Timeout {
                duration_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            warn!(error = %error, "request failed");
            Error::network(error.to_string())
        }
    }
}

/// Map a non-2xx response to [`Error::Api`], keeping the body's `detail` string
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| {
            body.get("detail")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        });
    warn!(
        status = status.as_u16(),
        detail = detail.as_deref().unwrap_or(""),
        "backend returned error"
    );
    Err(Error::api(status.as_u16(), detail))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| Error::network(format!("Failed to read response: {e}")))?;
    Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/schemas"), "http://localhost:8000/schemas");
    }

    #[test]
    fn test_new_client_has_no_session() {
        let client = ApiClient::new("http://localhost:8000").unwrap();
        assert!(!client.is_authenticated());
        assert!(matches!(client.bearer(), Err(Error::Authentication(_))));
    }

    #[test]
    fn test_debug_reports_session_state() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(Session::new("tok".into()));
        let client = ApiClient::new("http://x").unwrap().with_session_store(store);

        let debug = format!("{client:?}");
        assert!(debug.contains("authenticated: true"));
    }

    #[tokio::test]
    async fn test_authenticated_call_without_session_sends_nothing() {
        // Unroutable address: reaching the network would surface a Network error instead.
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(client.list_users().await, Err(Error::Authentication(_))));
        assert!(matches!(client.current_user().await, Err(Error::Authentication(_))));
        assert!(matches!(
            client.delete_user(&UserRef::Id(1)).await,
            Err(Error::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_credentials_are_rejected_locally() {
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        let result = client.login(&Credentials::new("", "")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
    }
}
