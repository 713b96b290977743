//! Unified error type for the consolectl workspace.

use thiserror::Error;

/// Enumerates all error kinds that can occur across consolectl crates.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Inconsistent or missing credential configuration. Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic authentication failure (e.g. a token unusable as a header).
    #[error("authentication error: {0}")]
    Auth(String),

    /// The identity endpoint answered with a non-success status.
    #[error("authorization server returned {status}: {message}")]
    AuthServer { status: u16, message: String },

    /// The interactive browser login could not be completed.
    #[error("interactive login failed: {0}")]
    InteractiveLogin(String),

    /// Building or signing a JWT assertion failed.
    #[error("assertion error: {0}")]
    Assertion(String),

    /// Token cache read/write failure. Only ever logged by the stores.
    #[error("cache error: {0}")]
    Cache(String),

    /// HTTP transport error (unreachable endpoint, TLS, timeout).
    #[error("http error: {0}")]
    Http(String),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The console API returned a non-success status.
    #[error("upstream error: status={status}, body={body}")]
    Upstream { status: u16, body: String },
}

// ── Feature-gated From impls ──────────────────────────────────────────────────

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for ConsoleError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl ConsoleError {
    /// Returns `true` for errors caused by credential configuration rather than
    /// by the network or the remote side.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ConsoleError>;
