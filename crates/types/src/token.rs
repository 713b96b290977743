//! OAuth token value object and expiry logic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A token is treated as stale this many seconds before its real expiry, so
/// that a request never leaves with a token that dies in flight.
pub const EXPIRY_SKEW_SECS: u64 = 10;

/// An access token with optional refresh capability and an absolute expiry.
///
/// Tokens are replaced, never patched: every builder method consumes `self`.
/// The serialized form is the on-disk cache record.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as Unix epoch seconds; `0` means "already expired".
    #[serde(default)]
    pub expires_at: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_type: String,
}

/// Current Unix time in seconds.
#[must_use]
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

impl Token {
    /// Create a token with the given access token and `Bearer` type. It has no
    /// expiry yet and is therefore not [`valid`](Self::valid) until one is set.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: 0,
            token_type: "Bearer".to_string(),
        }
    }

    /// Set the expiry to `expires_in_secs` seconds from now.
    #[must_use]
    pub fn with_expiry(mut self, expires_in_secs: u64) -> Self {
        self.expires_at = now_secs().saturating_add(expires_in_secs);
        self
    }

    /// Set an absolute expiry (Unix epoch seconds).
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: u64) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Attach a refresh token. Empty strings are treated as absent.
    #[must_use]
    pub fn with_refresh(mut self, refresh_token: impl Into<String>) -> Self {
        let refresh_token = refresh_token.into();
        self.refresh_token = (!refresh_token.is_empty()).then_some(refresh_token);
        self
    }

    /// Override the token type (`Bearer` by default).
    #[must_use]
    pub fn with_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// `true` iff the access token is non-empty and the current time is
    /// strictly before the expiry minus [`EXPIRY_SKEW_SECS`].
    #[must_use]
    pub fn valid(&self) -> bool {
        !self.access_token.is_empty()
            && now_secs().saturating_add(EXPIRY_SKEW_SECS) < self.expires_at
    }

    /// Whether a silent refresh can be attempted.
    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|r| !r.is_empty())
    }

    /// The value for the `Authorization` header: `<type> <access_token>`.
    #[must_use]
    pub fn authorization(&self) -> String {
        let kind = if self.token_type.is_empty() {
            "Bearer"
        } else {
            self.token_type.as_str()
        };
        format!("{kind} {}", self.access_token)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token_len", &self.access_token.len())
            .field("has_refresh_token", &self.can_refresh())
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .finish()
    }
}
