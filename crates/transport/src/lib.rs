//! Authenticated HTTP transport pipeline.
//!
//! A [`Transport`] is a type-erased `tower` service from [`reqwest::Request`]
//! to [`reqwest::Response`]. Wrappers (auth, debug logging, user agent) are
//! plain functions from one transport to another and are stacked by
//! [`compose`] in registration order, first-registered nearest the wire.
//!
//! ```text
//! request ─▶ user-agent ─▶ debug ─▶ auth ─▶ base (TLS) ─▶ network
//! ```

pub mod client;
pub mod compose;
pub mod debug;
pub mod interceptor;
pub mod tls;
pub mod user_agent;

use consolectl_types::ConsoleError;
use std::sync::Arc;
use tower::{Layer, Service, util::BoxCloneService};

pub use client::{ApiClient, ApiRequest, VersionCache};
pub use compose::{TransportConfig, build_transport, compose, pipeline};
pub use debug::DebugLayer;
pub use interceptor::AuthLayer;
pub use tls::{HttpTransport, TlsOptions, build_http_client};
pub use user_agent::{DEFAULT_USER_AGENT, UserAgentLayer};

/// The composed, type-erased request handler.
pub type Transport = BoxCloneService<reqwest::Request, reqwest::Response, ConsoleError>;

/// Takes the next handler and returns a new one wrapping it.
pub type Wrapper = Arc<dyn Fn(Transport) -> Transport + Send + Sync>;

/// Turn any `tower` layer speaking the transport's request/response/error
/// types into a [`Wrapper`].
pub fn wrapper<L>(layer: L) -> Wrapper
where
    L: Layer<Transport> + Send + Sync + 'static,
    L::Service: Service<reqwest::Request, Response = reqwest::Response, Error = ConsoleError>
        + Clone
        + Send
        + 'static,
    <L::Service as Service<reqwest::Request>>::Future: Send + 'static,
{
    Arc::new(move |inner| BoxCloneService::new(layer.layer(inner)))
}
