use consolectl_types::{ConsoleError, Credential, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix; nested keys use `__`, e.g.
/// `CONSOLECTL_SERVICE_ACCOUNT__CLIENT_ID`.
pub const ENV_PREFIX: &str = "CONSOLECTL_";

/// Fixed loopback port the browser redirect is bound to.
pub const DEFAULT_CALLBACK_PORT: u16 = 8250;

fn default_endpoint() -> String {
    "http://localhost:8080".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_browser_client_id() -> String {
    "consolectl".to_string()
}
fn default_scopes() -> Vec<String> {
    vec!["openid".to_string(), "offline_access".to_string()]
}
fn default_callback_port() -> u16 {
    DEFAULT_CALLBACK_PORT
}
fn default_login_timeout_secs() -> u64 {
    300
}

/// TLS options for the base transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Skip certificate verification.
    #[serde(default)]
    pub insecure: bool,
    /// Extra PEM bundle trusted in addition to the system roots.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
}

/// Headless credential fields. Any non-empty field selects the service-account flavor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceAccountConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub key_id: Option<String>,
    /// Base64 of the PEM-encoded RSA private key.
    #[serde(default)]
    pub private_key: Option<String>,
    /// Token endpoint override (defaults to `<endpoint>/oauth/token`).
    #[serde(default)]
    pub token_url: Option<String>,
    /// `aud` claim of signed assertions.
    #[serde(default)]
    pub audience: Option<String>,
}

impl ServiceAccountConfig {
    fn is_configured(&self) -> bool {
        [
            &self.client_id,
            &self.client_secret,
            &self.key_id,
            &self.private_key,
        ]
        .into_iter()
        .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

/// Interactive login settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_browser_client_id")]
    pub client_id: String,
    /// Defaults to `<endpoint>/oauth/authorize`.
    #[serde(default)]
    pub authorize_url: Option<String>,
    /// Defaults to `<endpoint>/oauth/token`.
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
    /// Upper bound on waiting for the browser redirect.
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            client_id: default_browser_client_id(),
            authorize_url: None,
            token_url: None,
            scopes: default_scopes(),
            callback_port: default_callback_port(),
            login_timeout_secs: default_login_timeout_secs(),
        }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the management console.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// `User-Agent` override.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Enable the debug-logging wrapper.
    #[serde(default)]
    pub debug: bool,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Token cache directory override.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub service_account: ServiceAccountConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            user_agent: None,
            debug: false,
            timeout_secs: default_timeout_secs(),
            cache_dir: None,
            tls: TlsConfig::default(),
            service_account: ServiceAccountConfig::default(),
            browser: BrowserConfig::default(),
        }
    }
}

impl Config {
    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Loads configuration: defaults, then the YAML file (if any), then
    /// `CONSOLECTL_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file cannot be parsed or a value has
    /// the wrong type.
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Env, Format as _, Serialized, Yaml},
        };
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Endpoint without a trailing slash.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// Resolve the configured credential flavor.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Config`] when the service-account section is
    /// present but inconsistent.
    pub fn credential(&self) -> Result<Credential> {
        if self.service_account.is_configured() {
            let sa = self.service_account.clone();
            Credential::service_account(sa.client_id, sa.client_secret, sa.key_id, sa.private_key)
        } else if self.browser.client_id.trim().is_empty() {
            Err(ConsoleError::Config(
                "no service account configured and browser.client_id is empty".into(),
            ))
        } else {
            Ok(Credential::browser(self.browser.client_id.clone()))
        }
    }

    /// Token endpoint used by the service-account grant.
    #[must_use]
    pub fn service_account_token_url(&self) -> String {
        self.service_account
            .token_url
            .clone()
            .unwrap_or_else(|| format!("{}/oauth/token", self.endpoint()))
    }

    /// Authorization endpoint the browser is sent to.
    #[must_use]
    pub fn browser_authorize_url(&self) -> String {
        self.browser
            .authorize_url
            .clone()
            .unwrap_or_else(|| format!("{}/oauth/authorize", self.endpoint()))
    }

    /// Token endpoint for the authorization-code and refresh grants.
    #[must_use]
    pub fn browser_token_url(&self) -> String {
        self.browser
            .token_url
            .clone()
            .unwrap_or_else(|| format!("{}/oauth/token", self.endpoint()))
    }
}
