//! Stacking wrappers into the final transport.

use crate::{
    DebugLayer, HttpTransport, TlsOptions, Transport, UserAgentLayer, Wrapper, build_http_client,
    wrapper,
};
use consolectl_types::Result;
use std::time::Duration;
use tower::util::BoxCloneService;

/// Wrap `base` with every present wrapper, in order.
///
/// The first wrapper sits directly on `base`; each later one wraps the result
/// of the previous, so the last wrapper sees a request first. `None` entries
/// are skipped. With no wrappers, `base` is returned unchanged.
pub fn compose<I>(base: Transport, wrappers: I) -> Transport
where
    I: IntoIterator<Item = Option<Wrapper>>,
{
    wrappers
        .into_iter()
        .flatten()
        .fold(base, |inner, wrap| wrap(inner))
}

/// Everything [`build_transport`] needs.
#[derive(Clone, Default)]
pub struct TransportConfig {
    pub tls: TlsOptions,
    pub timeout: Option<Duration>,
    /// `None` means [`crate::DEFAULT_USER_AGENT`].
    pub user_agent: Option<String>,
    pub debug: bool,
    /// Usually `AuthStrategy::wrapper()`; `None` sends requests unauthenticated.
    pub auth: Option<Wrapper>,
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("tls", &self.tls)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("debug", &self.debug)
            .field("auth", &self.auth.is_some())
            .finish()
    }
}

impl TransportConfig {
    /// The `reqwest` client for this configuration's TLS and timeout settings.
    ///
    /// # Errors
    ///
    /// See [`build_http_client`].
    pub fn http_client(&self) -> Result<reqwest::Client> {
        build_http_client(&self.tls, self.timeout)
    }
}

/// Apply the fixed wrapper order to `base`: auth, then debug logging (only
/// when enabled), then user agent.
pub fn pipeline(
    base: Transport,
    auth: Option<Wrapper>,
    debug: bool,
    user_agent: Option<&str>,
) -> Transport {
    compose(
        base,
        [
            auth,
            debug.then(|| wrapper(DebugLayer::new())),
            Some(wrapper(UserAgentLayer::new(user_agent))),
        ],
    )
}

/// Build the full transport on top of `client`.
///
/// `client` should come from [`TransportConfig::http_client`] so the TLS
/// settings apply; it is shared with the token endpoints by the caller.
pub fn build_transport(config: &TransportConfig, client: reqwest::Client) -> Transport {
    pipeline(
        BoxCloneService::new(HttpTransport::new(client)),
        config.auth.clone(),
        config.debug,
        config.user_agent.as_deref(),
    )
}
