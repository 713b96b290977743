//! Base transport: the shared `reqwest` client with the configured TLS trust.

use consolectl_types::{ConsoleError, Result};
use futures_util::future::BoxFuture;
use std::path::Path;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

/// Certificate trust for the base transport.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Accept any server certificate.
    pub insecure: bool,
    /// PEM bundle trusted in addition to the built-in roots.
    pub ca_pem: Option<Vec<u8>>,
}

impl TlsOptions {
    /// Read the extra trust bundle from `ca_file`, if given.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Config`] if the file cannot be read.
    pub fn from_parts(insecure: bool, ca_file: Option<&Path>) -> Result<Self> {
        let ca_pem = ca_file
            .map(|path| {
                std::fs::read(path).map_err(|e| {
                    ConsoleError::Config(format!("failed to read CA file {}: {e}", path.display()))
                })
            })
            .transpose()?;
        Ok(Self { insecure, ca_pem })
    }
}

/// Build the `reqwest` client every outgoing call goes through.
///
/// # Errors
///
/// Returns [`ConsoleError::Config`] when the CA bundle is unparsable or the
/// client cannot be constructed.
pub fn build_http_client(tls: &TlsOptions, timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .danger_accept_invalid_certs(tls.insecure);

    if tls.insecure {
        tracing::warn!("TLS certificate verification is disabled");
    }

    if let Some(pem) = &tls.ca_pem {
        let certs = reqwest::Certificate::from_pem_bundle(pem)
            .map_err(|e| ConsoleError::Config(format!("invalid CA bundle: {e}")))?;
        for cert in certs {
            builder = builder.add_root_certificate(cert);
        }
    }

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| ConsoleError::Config(format!("failed to build HTTP client: {e}")))
}

/// Innermost handler: sends the request on the wire.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Service<reqwest::Request> for HttpTransport {
    type Response = reqwest::Response;
    type Error = ConsoleError;
    type Future = BoxFuture<'static, Result<reqwest::Response>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: reqwest::Request) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move { Ok(client.execute(req).await?) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_client_builds() {
        assert!(build_http_client(&TlsOptions::default(), Some(Duration::from_secs(5))).is_ok());
    }

    #[test]
    fn test_insecure_client_builds() {
        let tls = TlsOptions {
            insecure: true,
            ca_pem: None,
        };
        assert!(build_http_client(&tls, None).is_ok());
    }

    #[test]
    fn test_missing_ca_file_is_config_error() {
        let err = TlsOptions::from_parts(false, Some(Path::new("/nonexistent/ca.pem"))).unwrap_err();
        assert!(err.is_configuration());
    }
}
