//! Credential shapes accepted by the transport.
//!
//! A credential is either a headless service account (client secret *or*
//! signed private-key assertion) or an interactive browser login. The
//! constructors are the only place where field presence is interpreted, so an
//! inconsistent shape can never reach a strategy.

use crate::{ConsoleError, Result};
use secrecy::SecretString;

/// How a service account proves its identity to the token endpoint.
#[derive(Debug)]
pub enum ServiceAccountSecret {
    /// Shared secret sent with HTTP Basic client authentication.
    ClientSecret(SecretString),
    /// RSA private key used to sign a `private_key_jwt` assertion.
    PrivateKey {
        key_id: String,
        /// Base64 of the PEM-encoded private key.
        private_key: SecretString,
    },
}

/// Headless machine credential.
#[derive(Debug)]
pub struct ServiceAccountCredential {
    pub client_id: String,
    pub secret: ServiceAccountSecret,
}

/// Interactive credential; the identity is resolved in the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCredential {
    /// Public OAuth client id of the CLI application.
    pub client_id: String,
}

/// The identity a client authenticates as. Immutable once built.
#[derive(Debug)]
pub enum Credential {
    ServiceAccount(ServiceAccountCredential),
    Browser(BrowserCredential),
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Credential {
    /// Build a service-account credential from optional fields.
    ///
    /// Exactly one of `client_secret` or the pair `key_id` + `private_key`
    /// must be present alongside `client_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Config`] when `client_id` is missing, when both
    /// shapes are supplied, or when neither shape is complete.
    pub fn service_account(
        client_id: Option<String>,
        client_secret: Option<String>,
        key_id: Option<String>,
        private_key: Option<String>,
    ) -> Result<Self> {
        let client_id = non_empty(client_id)
            .ok_or_else(|| ConsoleError::Config("service account requires a client_id".into()))?;
        let client_secret = non_empty(client_secret);
        let key_id = non_empty(key_id);
        let private_key = non_empty(private_key);

        let secret = match (client_secret, key_id, private_key) {
            (Some(secret), None, None) => ServiceAccountSecret::ClientSecret(secret.into()),
            (None, Some(key_id), Some(private_key)) => ServiceAccountSecret::PrivateKey {
                key_id,
                private_key: private_key.into(),
            },
            (Some(_), _, _) => {
                return Err(ConsoleError::Config(
                    "client_secret and key_id/private_key are mutually exclusive".into(),
                ));
            }
            (None, _, _) => {
                return Err(ConsoleError::Config(
                    "service account requires either client_secret or both key_id and private_key"
                        .into(),
                ));
            }
        };

        Ok(Self::ServiceAccount(ServiceAccountCredential { client_id, secret }))
    }

    /// Build an interactive browser credential for the given public client id.
    pub fn browser(client_id: impl Into<String>) -> Self {
        Self::Browser(BrowserCredential {
            client_id: client_id.into(),
        })
    }

    /// The OAuth client id in use, whatever the flavor.
    #[must_use]
    pub fn client_id(&self) -> &str {
        match self {
            Self::ServiceAccount(sa) => &sa.client_id,
            Self::Browser(b) => &b.client_id,
        }
    }

    /// Short human-readable name of the flavor (`service-account` / `browser`).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceAccount(_) => "service-account",
            Self::Browser(_) => "browser",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_client_secret_shape() {
        let c = Credential::service_account(s("cid"), s("secret"), None, None).unwrap();
        let Credential::ServiceAccount(sa) = c else {
            panic!("expected service account");
        };
        assert_eq!(sa.client_id, "cid");
        assert!(matches!(sa.secret, ServiceAccountSecret::ClientSecret(_)));
    }

    #[test]
    fn test_private_key_shape() {
        let c = Credential::service_account(s("cid"), None, s("kid"), s("cGVt")).unwrap();
        let Credential::ServiceAccount(sa) = c else {
            panic!("expected service account");
        };
        assert!(matches!(
            sa.secret,
            ServiceAccountSecret::PrivateKey { ref key_id, .. } if key_id == "kid"
        ));
    }

    #[test]
    fn test_both_shapes_rejected() {
        let err =
            Credential::service_account(s("cid"), s("secret"), s("kid"), s("cGVt")).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_neither_shape_rejected() {
        let err = Credential::service_account(s("cid"), None, None, None).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_incomplete_key_shape_rejected() {
        let err = Credential::service_account(s("cid"), None, s("kid"), None).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_missing_client_id_rejected() {
        let err = Credential::service_account(None, s("secret"), None, None).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_blank_fields_count_as_absent() {
        let c = Credential::service_account(s("cid"), s("secret"), s(" "), s("")).unwrap();
        assert_eq!(c.kind(), "service-account");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let c = Credential::service_account(s("cid"), s("hunter2"), None, None).unwrap();
        assert!(!format!("{c:?}").contains("hunter2"));
    }

    #[test]
    fn test_browser_credential() {
        let c = Credential::browser("consolectl");
        assert_eq!(c.client_id(), "consolectl");
        assert_eq!(c.kind(), "browser");
    }
}
