//! Thin console API client over a composed [`Transport`].

use crate::Transport;
use consolectl_types::{ConsoleError, Result};
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt as _;

/// Path probed by [`ApiClient::server_version`].
pub const VERSION_PATH: &str = "/version";

#[derive(serde::Deserialize)]
struct VersionBody {
    version: String,
}

/// Remembers the server version after the first successful probe.
#[derive(Debug, Default)]
pub struct VersionCache {
    value: Mutex<Option<String>>,
}

impl VersionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value, if any.
    pub async fn get(&self) -> Option<String> {
        self.value.lock().await.clone()
    }

    /// Forget the cached value so the next lookup probes again.
    pub async fn reset(&self) {
        *self.value.lock().await = None;
    }
}

/// Console API client. Clones share the transport and the version cache.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Transport,
    http: reqwest::Client,
    versions: Arc<VersionCache>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// `http` is only used to assemble requests; they are always sent through
    /// `transport`.
    pub fn new(base_url: impl Into<String>, transport: Transport, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            transport,
            http,
            versions: Arc::new(VersionCache::new()),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn get(&self, path: &str) -> ApiRequest {
        self.verb(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> ApiRequest {
        self.verb(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> ApiRequest {
        self.verb(Method::PUT, path)
    }

    pub fn delete(&self, path: &str) -> ApiRequest {
        self.verb(Method::DELETE, path)
    }

    /// Start a request with an arbitrary method.
    pub fn verb(&self, method: Method, path: &str) -> ApiRequest {
        ApiRequest {
            builder: self.http.request(method, self.url(path)),
            transport: self.transport.clone(),
        }
    }

    /// Server version from `GET /version`, probed once and then cached.
    ///
    /// # Errors
    ///
    /// Propagates transport and authentication errors, and
    /// [`ConsoleError::Upstream`] for a non-success status. Failures are not
    /// cached.
    pub async fn server_version(&self) -> Result<String> {
        let mut cached = self.versions.value.lock().await;
        if let Some(version) = cached.as_ref() {
            return Ok(version.clone());
        }
        let body: VersionBody = self.get(VERSION_PATH).send_json().await?;
        tracing::debug!(version = %body.version, "probed server version");
        *cached = Some(body.version.clone());
        Ok(body.version)
    }

    /// Drop the cached server version.
    pub async fn reset_version_cache(&self) {
        self.versions.reset().await;
    }
}

/// A request being assembled; nothing is sent until [`send`](Self::send).
pub struct ApiRequest {
    builder: reqwest::RequestBuilder,
    transport: Transport,
}

impl ApiRequest {
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        self.builder = self.builder.json(body);
        self
    }

    /// Raw body with an explicit content type.
    #[must_use]
    pub fn body(mut self, content_type: &str, body: impl Into<reqwest::Body>) -> Self {
        self.builder = self
            .builder
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        self
    }

    #[must_use]
    pub fn query<T: Serialize + ?Sized>(mut self, query: &T) -> Self {
        self.builder = self.builder.query(query);
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Set `Authorization` explicitly; the auth wrapper then leaves it alone.
    #[must_use]
    pub fn bearer_auth(mut self, token: &str) -> Self {
        self.builder = self.builder.bearer_auth(token);
        self
    }

    /// Send through the transport and return the raw response, whatever its status.
    ///
    /// # Errors
    ///
    /// Request assembly, authentication, and transport errors.
    pub async fn send(self) -> Result<reqwest::Response> {
        let request = self.builder.build()?;
        self.transport.oneshot(request).await
    }

    /// Send and decode a JSON success body.
    ///
    /// # Errors
    ///
    /// As [`send`](Self::send), plus [`ConsoleError::Upstream`] for a
    /// non-success status and [`ConsoleError::Serialization`] for a body that
    /// does not decode.
    pub async fn send_json<T: DeserializeOwned>(self) -> Result<T> {
        let resp = self.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ConsoleError::Upstream {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
