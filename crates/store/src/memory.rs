//! In-memory token store backed by a `HashMap` behind a `Mutex`.

use async_trait::async_trait;
use consolectl_types::{CredentialStore, Fingerprint, Token};
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-memory [`CredentialStore`] implementation for testing and ephemeral use.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    /// Fingerprint-keyed token map.
    data: Mutex<HashMap<Fingerprint, Token>>,
    /// Number of `write` calls observed.
    writes: Mutex<usize>,
}

impl InMemoryTokenStore {
    /// Creates a new empty in-memory token store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with one token.
    #[must_use]
    pub fn with_token(fingerprint: &Fingerprint, token: Token) -> Self {
        let store = Self::new();
        store
            .data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(fingerprint.clone(), token);
        store
    }

    /// How many times [`CredentialStore::write`] has been called.
    #[must_use]
    pub fn write_count(&self) -> usize {
        *self
            .writes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl CredentialStore for InMemoryTokenStore {
    async fn read(&self, fingerprint: &Fingerprint) -> Token {
        self.data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(fingerprint)
            .cloned()
            .unwrap_or_default()
    }

    async fn write(&self, fingerprint: &Fingerprint, token: &Token) {
        self.data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(fingerprint.clone(), token.clone());
        *self
            .writes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consolectl_types::Credential;

    fn fp(id: &str) -> Fingerprint {
        Fingerprint::new("https://console.example", &Credential::browser(id))
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let store = InMemoryTokenStore::new();
        let token = Token::new("test-access").with_expiry(60);
        store.write(&fp("a"), &token).await;
        assert_eq!(store.read(&fp("a")).await, token);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_read_missing() {
        let store = InMemoryTokenStore::new();
        assert_eq!(store.read(&fp("b")).await, Token::default());
    }

    #[tokio::test]
    async fn test_overwrite() {
        let store = InMemoryTokenStore::with_token(&fp("a"), Token::new("first"));
        store.write(&fp("a"), &Token::new("second")).await;
        assert_eq!(store.read(&fp("a")).await.access_token, "second");
    }
}
