//! Injects the `Authorization` header on outgoing requests.
//!
//! Requests that already carry a non-empty `Authorization` header are
//! forwarded as-is and the token provider is not consulted. Otherwise a token is obtained from
//! the provider and attached; if that fails the request never reaches the
//! network.

use consolectl_types::{ConsoleError, Result, TokenProvider};
use futures_util::future::BoxFuture;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer wrapping a service with [`Authenticated`].
pub struct AuthLayer<P: ?Sized> {
    provider: Arc<P>,
}

impl<P: ?Sized> AuthLayer<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

impl<P: ?Sized> Clone for AuthLayer<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<S, P: ?Sized> Layer<S> for AuthLayer<P> {
    type Service = Authenticated<S, P>;

    fn layer(&self, inner: S) -> Self::Service {
        Authenticated {
            inner,
            provider: Arc::clone(&self.provider),
        }
    }
}

/// Service that attaches `<type> <access_token>` before delegating.
pub struct Authenticated<S, P: ?Sized> {
    inner: S,
    provider: Arc<P>,
}

impl<S: Clone, P: ?Sized> Clone for Authenticated<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<S, P> Service<reqwest::Request> for Authenticated<S, P>
where
    S: Service<reqwest::Request, Response = reqwest::Response, Error = ConsoleError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    P: TokenProvider + ?Sized + 'static,
{
    type Response = reqwest::Response;
    type Error = ConsoleError;
    type Future = BoxFuture<'static, Result<reqwest::Response>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: reqwest::Request) -> Self::Future {
        // Take the readied service, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let provider = Arc::clone(&self.provider);

        Box::pin(async move {
            if has_credential(&req) {
                return inner.call(req).await;
            }

            let token = provider.access_token().await?;
            let mut value = HeaderValue::from_str(&token.authorization()).map_err(|e| {
                ConsoleError::Auth(format!("token is not a valid header value: {e}"))
            })?;
            value.set_sensitive(true);
            req.headers_mut().insert(AUTHORIZATION, value);

            inner.call(req).await
        })
    }
}

/// A blank `Authorization` value does not count as a credential.
fn has_credential(req: &reqwest::Request) -> bool {
    req.headers()
        .get(AUTHORIZATION)
        .is_some_and(|v| !v.as_bytes().iter().all(u8::is_ascii_whitespace))
}
