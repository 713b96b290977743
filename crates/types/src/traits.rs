//! Async traits shared across all consolectl crates.
//!
//! Every cross-crate abstraction is defined here so that higher layers depend
//! only on `consolectl-types`, not on each other.

use crate::{Fingerprint, Result, Token};
use async_trait::async_trait;

/// Persistent storage for tokens, keyed by credential fingerprint.
///
/// Both operations are infallible from the caller's point of view: a failed
/// read is a cache miss and a failed write is logged and forgotten, so a broken
/// cache can never fail an otherwise successful authentication.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the token for `fingerprint`, or [`Token::default`] if absent or unreadable.
    async fn read(&self, fingerprint: &Fingerprint) -> Token;
    /// Persist `token` for `fingerprint`, replacing any previous value.
    async fn write(&self, fingerprint: &Fingerprint, token: &Token);
}

/// Supplies a valid access token, acquiring one if necessary.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a token for which [`Token::valid`] holds, performing whatever
    /// grant, refresh, or login the strategy needs.
    async fn access_token(&self) -> Result<Token>;
}
