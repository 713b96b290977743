//! Configuration loading for consolectl.
//!
//! Uses figment to layer defaults, an optional YAML file and `CONSOLECTL_*`
//! environment variables, and resolves the credential flavor from the result.

pub mod paths;
pub mod schema;

pub use schema::{
    BrowserConfig, Config, DEFAULT_CALLBACK_PORT, ENV_PREFIX, ServiceAccountConfig, TlsConfig,
};
