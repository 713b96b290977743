//! Cache keys derived from a credential and the endpoint it talks to.

use crate::{Credential, ServiceAccountSecret};
use secrecy::ExposeSecret as _;
use sha2::{Digest, Sha256};
use std::fmt;

const SECRET_MARKER: &str = "client-secret";
const BROWSER_MARKER: &str = "browser";

/// Deterministic one-way hash identifying a credential + endpoint pair.
///
/// Stable across process restarts, so it doubles as the cache file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash `{endpoint, client_id, key_id, private_key | marker}`.
    #[must_use]
    pub fn new(endpoint: &str, credential: &Credential) -> Self {
        match credential {
            Credential::ServiceAccount(sa) => match &sa.secret {
                ServiceAccountSecret::ClientSecret(_) => {
                    Self::from_fields(&[endpoint, &sa.client_id, "", SECRET_MARKER])
                }
                ServiceAccountSecret::PrivateKey {
                    key_id,
                    private_key,
                } => Self::from_fields(&[
                    endpoint,
                    &sa.client_id,
                    key_id,
                    private_key.expose_secret(),
                ]),
            },
            Credential::Browser(b) => Self::from_fields(&[endpoint, &b.client_id, "", BROWSER_MARKER]),
        }
    }

    fn from_fields(fields: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        for field in fields {
            hasher.update(field.as_bytes());
            // NUL separator keeps ("ab","c") and ("a","bc") apart.
            hasher.update([0u8]);
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Lowercase hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
