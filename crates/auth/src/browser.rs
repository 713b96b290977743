//! Interactive login: authorization code with PKCE over a loopback redirect.
//!
//! Every acquisition walks the same ladder and stops at the first rung that
//! yields a valid token:
//!
//! 1. the token persisted in the store for this credential's fingerprint;
//! 2. a refresh-token grant, if the persisted token carries one;
//! 3. a full browser login.
//!
//! A token obtained by the login is persisted even when the login as a whole
//! reports an error, so the next invocation can start from it.

use crate::callback::{Callback, CallbackListener};
use crate::grant;
use crate::opener::{self, SystemBrowser, UrlOpener};
use crate::pkce::{Pkce, random_state};
use async_trait::async_trait;
use consolectl_types::{
    ConsoleError, CredentialStore, Fingerprint, Result, Token, TokenProvider,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Endpoints and knobs of the interactive login.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub client_id: String,
    pub authorize_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    /// Loopback port for the redirect; `0` picks a free one.
    pub callback_port: u16,
    /// How long to wait for the browser to come back.
    pub login_timeout: Duration,
}

/// Obtains user tokens through the browser.
pub struct BrowserStrategy {
    settings: BrowserSettings,
    http: reqwest::Client,
    store: Arc<dyn CredentialStore>,
    fingerprint: Fingerprint,
    opener: Arc<dyn UrlOpener>,
    lock: Mutex<()>,
}

impl std::fmt::Debug for BrowserStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserStrategy")
            .field("settings", &self.settings)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// What a full login produced. Both fields may be set.
#[derive(Debug, Default)]
struct LoginOutcome {
    token: Option<Token>,
    error: Option<ConsoleError>,
}

impl LoginOutcome {
    fn failed(error: ConsoleError) -> Self {
        Self {
            token: None,
            error: Some(error),
        }
    }
}

impl BrowserStrategy {
    pub fn new(
        settings: BrowserSettings,
        http: reqwest::Client,
        store: Arc<dyn CredentialStore>,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            settings,
            http,
            store,
            fingerprint,
            opener: Arc::new(SystemBrowser),
            lock: Mutex::new(()),
        }
    }

    /// Replace the default system browser.
    #[must_use]
    pub fn with_opener(mut self, opener: Arc<dyn UrlOpener>) -> Self {
        self.opener = opener;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    /// Redeem `refresh_token` for a new token. A response without a refresh
    /// token keeps the old one.
    async fn refresh(&self, refresh_token: &str) -> Result<Token> {
        let token = grant::request_token(
            &self.http,
            &self.settings.token_url,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.settings.client_id.as_str()),
            ],
            None,
        )
        .await?;
        Ok(if token.can_refresh() {
            token
        } else {
            token.with_refresh(refresh_token)
        })
    }

    /// Authorization URL for one login attempt.
    fn authorization_url(&self, redirect_uri: &str, pkce: &Pkce, state: &str) -> Result<String> {
        let scope = self.settings.scopes.join(" ");
        let url = reqwest::Url::parse_with_params(
            &self.settings.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", scope.as_str()),
                ("state", state),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", Pkce::METHOD),
            ],
        )
        .map_err(|e| {
            ConsoleError::Config(format!(
                "invalid authorize_url {}: {e}",
                self.settings.authorize_url
            ))
        })?;
        Ok(url.into())
    }

    async fn full_login(&self) -> LoginOutcome {
        let listener = match CallbackListener::bind(self.settings.callback_port).await {
            Ok(l) => l,
            Err(e) => return LoginOutcome::failed(e),
        };
        let redirect_uri = listener.redirect_uri();
        let pkce = Pkce::generate();
        let state = random_state();

        let url = match self.authorization_url(&redirect_uri, &pkce, &state) {
            Ok(u) => u,
            Err(e) => return LoginOutcome::failed(e),
        };
        opener::launch(self.opener.as_ref(), &url);

        let callback =
            match tokio::time::timeout(self.settings.login_timeout, listener.accept()).await {
                Ok(Ok(cb)) => cb,
                Ok(Err(e)) => return LoginOutcome::failed(e),
                Err(_) => {
                    return LoginOutcome::failed(ConsoleError::InteractiveLogin(format!(
                        "timed out after {}s waiting for the browser",
                        self.settings.login_timeout.as_secs()
                    )));
                }
            };

        let exchanged = self
            .exchange(&callback, &state, &pkce.verifier, &redirect_uri)
            .await;
        let answered = callback.respond(exchanged.is_ok()).await;

        match (exchanged, answered) {
            (Ok(token), Ok(())) => LoginOutcome {
                token: Some(token),
                error: None,
            },
            (Ok(token), Err(e)) => LoginOutcome {
                token: Some(token),
                error: Some(e),
            },
            (Err(e), _) => LoginOutcome::failed(e),
        }
    }

    /// Validate the redirect and trade its code for a token.
    async fn exchange(
        &self,
        callback: &Callback,
        state: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<Token> {
        if let Some(error) = callback.param("error") {
            let detail = callback.param("error_description").unwrap_or_default();
            return Err(ConsoleError::InteractiveLogin(format!(
                "authorization denied: {error} {detail}"
            )
            .trim_end()
            .to_string()));
        }
        if callback.param("state") != Some(state) {
            return Err(ConsoleError::InteractiveLogin(
                "state mismatch, possible CSRF attack".into(),
            ));
        }
        let code = callback
            .param("code")
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                ConsoleError::InteractiveLogin("missing code parameter in callback".into())
            })?;

        grant::request_token(
            &self.http,
            &self.settings.token_url,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.settings.client_id.as_str()),
                ("code_verifier", verifier),
            ],
            None,
        )
        .await
        .map_err(|e| ConsoleError::InteractiveLogin(format!("code exchange failed: {e}")))
    }

    /// Persist whatever token the login produced, then report its result.
    async fn settle(&self, outcome: LoginOutcome) -> Result<Token> {
        if let Some(token) = &outcome.token {
            self.store.write(&self.fingerprint, token).await;
        }
        match outcome {
            LoginOutcome {
                error: Some(e), ..
            } => Err(e),
            LoginOutcome {
                token: Some(token),
                error: None,
            } => Ok(token),
            LoginOutcome {
                token: None,
                error: None,
            } => Err(ConsoleError::InteractiveLogin(
                "login finished without a token".into(),
            )),
        }
    }
}

#[async_trait]
impl TokenProvider for BrowserStrategy {
    async fn access_token(&self) -> Result<Token> {
        let _guard = self.lock.lock().await;

        let cached = self.store.read(&self.fingerprint).await;
        if cached.valid() {
            return Ok(cached);
        }

        if let Some(refresh_token) = cached.refresh_token.as_deref().filter(|r| !r.is_empty()) {
            match self.refresh(refresh_token).await {
                Ok(token) => {
                    tracing::debug!(fingerprint = %self.fingerprint, "refreshed browser token");
                    self.store.write(&self.fingerprint, &token).await;
                    return Ok(token);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "token refresh failed, falling back to browser login");
                }
            }
        }

        let outcome = self.full_login().await;
        if outcome.error.is_none() {
            tracing::info!(client_id = %self.settings.client_id, "browser login completed");
        }
        self.settle(outcome).await
    }
}
