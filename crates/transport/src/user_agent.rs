use consolectl_types::{ConsoleError, Result};
use reqwest::header::{HeaderValue, USER_AGENT};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// `User-Agent` sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("consolectl/", env!("CARGO_PKG_VERSION"));

/// Layer producing [`UserAgent`].
#[derive(Debug, Clone)]
pub struct UserAgentLayer {
    value: HeaderValue,
}

impl UserAgentLayer {
    /// Falls back to [`DEFAULT_USER_AGENT`] when `value` is empty or not a
    /// legal header value.
    pub fn new(value: Option<&str>) -> Self {
        let value = value
            .filter(|v| !v.trim().is_empty())
            .and_then(|v| HeaderValue::from_str(v).ok())
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_USER_AGENT));
        Self { value }
    }
}

impl Default for UserAgentLayer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<S> Layer<S> for UserAgentLayer {
    type Service = UserAgent<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAgent {
            inner,
            value: self.value.clone(),
        }
    }
}

/// Sets `User-Agent` unless the caller already did.
#[derive(Debug, Clone)]
pub struct UserAgent<S> {
    inner: S,
    value: HeaderValue,
}

impl<S> Service<reqwest::Request> for UserAgent<S>
where
    S: Service<reqwest::Request, Response = reqwest::Response, Error = ConsoleError>,
{
    type Response = reqwest::Response;
    type Error = ConsoleError;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: reqwest::Request) -> Self::Future {
        req.headers_mut()
            .entry(USER_AGENT)
            .or_insert_with(|| self.value.clone());
        self.inner.call(req)
    }
}
