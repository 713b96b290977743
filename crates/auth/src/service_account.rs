//! Headless client-credentials grant.
//!
//! A client secret authenticates with HTTP Basic; a private key signs a fresh
//! `private_key_jwt` assertion per grant. The resulting token is held in
//! memory and, when a store is attached, shared with other processes through
//! it. Concurrent callers of one strategy wait on a single grant.

use crate::grant::{self, BasicAuth};
use crate::jwt::{self, DEFAULT_ASSERTION_AUDIENCE, JWT_BEARER_ASSERTION_TYPE};
use async_trait::async_trait;
use consolectl_types::{
    CredentialStore, Fingerprint, Result, ServiceAccountCredential, ServiceAccountSecret, Token,
    TokenProvider,
};
use jsonwebtoken::EncodingKey;
use secrecy::{ExposeSecret as _, SecretString};
use std::sync::Arc;
use tokio::sync::Mutex;

enum Secret {
    ClientSecret(SecretString),
    PrivateKey { key_id: String, key: EncodingKey },
}

impl Secret {
    fn flavor(&self) -> &'static str {
        match self {
            Self::ClientSecret(_) => "client-secret",
            Self::PrivateKey { .. } => "private-key",
        }
    }
}

/// Obtains tokens with the client-credentials grant.
pub struct ServiceAccountStrategy {
    client_id: String,
    secret: Secret,
    token_url: String,
    audience: String,
    http: reqwest::Client,
    store: Option<(Arc<dyn CredentialStore>, Fingerprint)>,
    current: Mutex<Option<Token>>,
}

impl std::fmt::Debug for ServiceAccountStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountStrategy")
            .field("client_id", &self.client_id)
            .field("flavor", &self.secret.flavor())
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountStrategy {
    /// The private key, if any, is decoded here so a bad key fails before
    /// any network call.
    ///
    /// # Errors
    ///
    /// Returns [`consolectl_types::ConsoleError::Config`] for an undecodable
    /// private key.
    pub fn new(
        credential: ServiceAccountCredential,
        token_url: impl Into<String>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let secret = match credential.secret {
            ServiceAccountSecret::ClientSecret(s) => Secret::ClientSecret(s),
            ServiceAccountSecret::PrivateKey {
                key_id,
                private_key,
            } => Secret::PrivateKey {
                key: jwt::decode_private_key(private_key.expose_secret())?,
                key_id,
            },
        };
        Ok(Self {
            client_id: credential.client_id,
            secret,
            token_url: token_url.into(),
            audience: DEFAULT_ASSERTION_AUDIENCE.to_string(),
            http,
            store: None,
            current: Mutex::new(None),
        })
    }

    /// Share tokens through `store` under `fingerprint`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>, fingerprint: Fingerprint) -> Self {
        self.store = Some((store, fingerprint));
        self
    }

    /// `aud` claim of signed assertions.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn grant(&self) -> Result<Token> {
        tracing::debug!(
            client_id = %self.client_id,
            flavor = self.secret.flavor(),
            "requesting client-credentials token"
        );
        match &self.secret {
            Secret::ClientSecret(secret) => {
                grant::request_token(
                    &self.http,
                    &self.token_url,
                    &[("grant_type", "client_credentials")],
                    Some(BasicAuth {
                        user: &self.client_id,
                        password: secret.expose_secret(),
                    }),
                )
                .await
            }
            Secret::PrivateKey { key_id, key } => {
                let assertion = jwt::sign_assertion(&self.client_id, key_id, &self.audience, key)?;
                grant::request_token(
                    &self.http,
                    &self.token_url,
                    &[
                        ("grant_type", "client_credentials"),
                        ("client_assertion_type", JWT_BEARER_ASSERTION_TYPE),
                        ("client_assertion", assertion.as_str()),
                        ("client_id", self.client_id.as_str()),
                        ("token_endpoint_auth_method", "private_key_jwt"),
                    ],
                    None,
                )
                .await
            }
        }
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountStrategy {
    async fn access_token(&self) -> Result<Token> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref().filter(|t| t.valid()) {
            return Ok(token.clone());
        }

        if let Some((store, fingerprint)) = &self.store {
            let cached = store.read(fingerprint).await;
            if cached.valid() {
                tracing::debug!(%fingerprint, "using cached service-account token");
                *current = Some(cached.clone());
                return Ok(cached);
            }
        }

        let token = match self.grant().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(client_id = %self.client_id, error = %e, "client-credentials grant failed");
                return Err(e);
            }
        };
        tracing::info!(client_id = %self.client_id, expires_at = token.expires_at, "obtained service-account token");

        if let Some((store, fingerprint)) = &self.store {
            store.write(fingerprint, &token).await;
        }
        *current = Some(token.clone());
        Ok(token)
    }
}
