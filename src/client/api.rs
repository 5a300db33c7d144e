use reqwest::{multipart::Form, Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const LOGIN_PATH: &str = "/login";

/// Errors surfaced by the wardrobe API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict { message: String, item_count: Option<i64> },

    #[error("{message}")]
    Validation {
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Token storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// The JSON error envelope returned by the server.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: BTreeMap<String, Vec<String>>,
    item_count: Option<i64>,
}

impl ClientError {
    fn from_status(status: StatusCode, body: ErrorBody) -> Self {
        let message = if body.message.is_empty() {
            status.canonical_reason().unwrap_or("Unknown error").to_string()
        } else {
            body.message
        };

        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::CONFLICT => ClientError::Conflict {
                message,
                item_count: body.item_count,
            },
            StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation {
                message,
                errors: body.errors,
            },
            status if status.is_server_error() => ClientError::Server(message),
            _ => ClientError::BadRequest(message),
        }
    }

    /// The message the server put in the payload, when there was one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Unauthorized(m)
            | ClientError::Forbidden(m)
            | ClientError::NotFound(m)
            | ClientError::BadRequest(m)
            | ClientError::Server(m) => Some(m),
            ClientError::Conflict { message, .. } | ClientError::Validation { message, .. } => Some(message),
            ClientError::Network(_) | ClientError::Storage(_) => None,
        }
    }

    pub fn message_or(&self, fallback: &str) -> String {
        self.server_message().unwrap_or(fallback).to_string()
    }
}

/// Persisted client-side storage for the bearer credential.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str) -> std::io::Result<()>;
    fn clear(&self) -> std::io::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.lock().ok().and_then(|token| token.clone())
    }

    fn save(&self, token: &str) -> std::io::Result<()> {
        if let Ok(mut slot) = self.token.lock() {
            *slot = Some(token.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> std::io::Result<()> {
        if let Ok(mut slot) = self.token.lock() {
            *slot = None;
        }
        Ok(())
    }
}

/// Keeps the token in a single file, e.g. `~/.config/wardrobe/token`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        std::fs::read_to_string(&self.path)
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }

    fn save(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)
    }

    fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

struct SessionInner {
    store: Box<dyn TokenStore>,
    redirect: Mutex<Option<String>>,
}

/// Credential handle shared by the client and all state containers.
///
/// Cloning is cheap; every clone sees the same token and pending redirect.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(store: impl TokenStore + 'static) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                store: Box::new(store),
                redirect: Mutex::new(None),
            }),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.inner.store.load()
    }

    pub fn has_token(&self) -> bool {
        self.token().is_some()
    }

    pub fn set_token(&self, token: &str) -> std::io::Result<()> {
        self.inner.store.save(token)
    }

    pub fn clear(&self) -> std::io::Result<()> {
        self.inner.store.clear()
    }

    /// Forced logout after a 401: drop the credential and ask for the login view.
    pub fn expire(&self) {
        if let Err(err) = self.clear() {
            tracing::warn!(error = %err, "Failed to clear stored token");
        }
        if let Ok(mut redirect) = self.inner.redirect.lock() {
            *redirect = Some(LOGIN_PATH.to_string());
        }
    }

    /// Takes the pending redirect, if a request forced a logout since the last call.
    pub fn take_redirect(&self) -> Option<String> {
        self.inner.redirect.lock().ok().and_then(|mut redirect| redirect.take())
    }
}

/// Thin typed wrapper over the REST endpoints.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    /// `base_url` includes the API prefix, e.g. `http://localhost:8000/api`.
    pub fn new(base_url: &str, session: Session) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let mut request = request.header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            tracing::info!("Received 401, clearing session");
            self.session.expire();
        }

        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        Err(ClientError::from_status(status, body))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        Ok(self.execute(request).await?.json().await?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(String, String)]) -> Result<T, ClientError> {
        self.json(self.http.get(self.url(path)).query(query)).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.json(self.http.post(self.url(path)).json(body)).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.json(self.http.put(self.url(path)).json(body)).await
    }

    pub async fn post_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T, ClientError> {
        self.json(self.http.post(self.url(path)).multipart(form)).await
    }

    pub async fn put_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T, ClientError> {
        self.json(self.http.put(self.url(path)).multipart(form)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.execute(self.http.delete(self.url(path))).await?;
        Ok(())
    }

    /// For endpoints that return a body we do not need, such as `POST /logout`.
    pub async fn post_empty(&self, path: &str) -> Result<(), ClientError> {
        self.execute(self.http.post(self.url(path))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_variants_with_fallback_messages() {
        let err = ClientError::from_status(StatusCode::CONFLICT, ErrorBody {
            message: "busy".into(),
            item_count: Some(2),
            ..Default::default()
        });
        assert!(matches!(err, ClientError::Conflict { item_count: Some(2), .. }));
        assert_eq!(err.message_or("fallback"), "busy");

        let err = ClientError::from_status(StatusCode::FORBIDDEN, ErrorBody::default());
        assert_eq!(err.to_string(), "Forbidden");

        let err = ClientError::Storage(std::io::Error::other("disk"));
        assert_eq!(err.message_or("Failed to load"), "Failed to load");
    }

    #[test]
    fn expire_clears_token_and_requests_login() {
        let session = Session::new(MemoryTokenStore::with_token("abc"));
        assert!(session.has_token());

        session.expire();
        assert!(!session.has_token());
        assert_eq!(session.take_redirect().as_deref(), Some(LOGIN_PATH));
        assert_eq!(session.take_redirect(), None);
    }

    #[test]
    fn file_store_persists_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token");

        FileTokenStore::new(&path).save("persisted").unwrap();
        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.load().as_deref(), Some("persisted"));

        reopened.clear().unwrap();
        reopened.clear().unwrap();
        assert_eq!(reopened.load(), None);
    }
}
