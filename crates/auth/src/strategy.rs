use crate::browser::{BrowserSettings, BrowserStrategy};
use crate::service_account::ServiceAccountStrategy;
use async_trait::async_trait;
use consolectl_config::Config;
use consolectl_transport::{AuthLayer, Wrapper, wrapper};
use consolectl_types::{Credential, CredentialStore, Fingerprint, Result, Token, TokenProvider};
use std::sync::Arc;
use std::time::Duration;

/// The active way of obtaining tokens, chosen once from the credential.
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    ServiceAccount(Arc<ServiceAccountStrategy>),
    Browser(Arc<BrowserStrategy>),
}

impl AuthStrategy {
    /// Pick and build the strategy for `config`'s credential. Both flavors
    /// persist through `store`.
    ///
    /// # Errors
    ///
    /// Returns [`consolectl_types::ConsoleError::Config`] for inconsistent
    /// credential fields or an undecodable private key.
    pub fn from_config(
        config: &Config,
        http: reqwest::Client,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let credential = config.credential()?;
        let fingerprint = Fingerprint::new(config.endpoint(), &credential);

        Ok(match credential {
            Credential::ServiceAccount(sa) => {
                let mut strategy =
                    ServiceAccountStrategy::new(sa, config.service_account_token_url(), http)?
                        .with_store(store, fingerprint.clone());
                if let Some(audience) = config
                    .service_account
                    .audience
                    .as_deref()
                    .filter(|a| !a.trim().is_empty())
                {
                    strategy = strategy.with_audience(audience);
                }
                Self::ServiceAccount(Arc::new(strategy))
            }
            Credential::Browser(browser) => {
                let settings = BrowserSettings {
                    client_id: browser.client_id,
                    authorize_url: config.browser_authorize_url(),
                    token_url: config.browser_token_url(),
                    scopes: config.browser.scopes.clone(),
                    callback_port: config.browser.callback_port,
                    login_timeout: Duration::from_secs(config.browser.login_timeout_secs),
                };
                Self::Browser(Arc::new(BrowserStrategy::new(
                    settings,
                    http,
                    store,
                    fingerprint,
                )))
            }
        })
    }

    /// `"service-account"` or `"browser"`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceAccount(_) => "service-account",
            Self::Browser(_) => "browser",
        }
    }

    /// Transport wrapper attaching this strategy's tokens.
    #[must_use]
    pub fn wrapper(&self) -> Wrapper {
        wrapper(AuthLayer::new(Arc::new(self.clone())))
    }
}

#[async_trait]
impl TokenProvider for AuthStrategy {
    async fn access_token(&self) -> Result<Token> {
        match self {
            Self::ServiceAccount(s) => s.access_token().await,
            Self::Browser(b) => b.access_token().await,
        }
    }
}
