//! Request/response tracing for `--debug`.

use consolectl_types::{ConsoleError, Result};
use futures_util::future::BoxFuture;
use reqwest::header::{AUTHORIZATION, HeaderMap, PROXY_AUTHORIZATION};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

const REDACTED: &str = "<redacted>";

/// Layer producing [`DebugLogging`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugLayer;

impl DebugLayer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for DebugLayer {
    type Service = DebugLogging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DebugLogging { inner }
    }
}

/// Logs every exchange at `debug` level. Credentials never reach the log.
#[derive(Debug, Clone)]
pub struct DebugLogging<S> {
    inner: S,
}

impl<S> Service<reqwest::Request> for DebugLogging<S>
where
    S: Service<reqwest::Request, Response = reqwest::Response, Error = ConsoleError>,
    S::Future: Send + 'static,
{
    type Response = reqwest::Response;
    type Error = ConsoleError;
    type Future = BoxFuture<'static, Result<reqwest::Response>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: reqwest::Request) -> Self::Future {
        let method = req.method().clone();
        let url = req.url().clone();
        tracing::debug!(
            %method,
            %url,
            headers = %describe_headers(req.headers()),
            "--> request"
        );

        let start = Instant::now();
        let fut = self.inner.call(req);
        Box::pin(async move {
            let result = fut.await;
            let elapsed_ms = start.elapsed().as_millis();
            match &result {
                Ok(resp) => tracing::debug!(
                    %method,
                    %url,
                    status = resp.status().as_u16(),
                    elapsed_ms,
                    headers = %describe_headers(resp.headers()),
                    "<-- response"
                ),
                Err(e) => tracing::debug!(%method, %url, elapsed_ms, error = %e, "<-- failed"),
            }
            result
        })
    }
}

/// Render headers as `name: value` pairs with credentials masked.
#[must_use]
pub fn describe_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if *name == AUTHORIZATION || *name == PROXY_AUTHORIZATION || value.is_sensitive() {
                REDACTED
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            format!("{name}: {shown}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{CONTENT_TYPE, HeaderValue};

    #[test]
    fn test_authorization_is_redacted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret-token"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let rendered = describe_headers(&headers);

        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("authorization: <redacted>"));
        assert!(rendered.contains("content-type: application/json"));
    }

    #[test]
    fn test_sensitive_values_are_redacted() {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_static("hunter2");
        value.set_sensitive(true);
        headers.insert("x-api-key", value);

        assert_eq!(describe_headers(&headers), "x-api-key: <redacted>");
    }

    #[test]
    fn test_empty_headers() {
        assert_eq!(describe_headers(&HeaderMap::new()), "");
    }
}
