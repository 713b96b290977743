//! Signed client assertions for the `private_key_jwt` client authentication
//! method (RFC 7523).

use base64::{Engine as _, engine::general_purpose::STANDARD};
use consolectl_types::{ConsoleError, Result, now_secs};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// `client_assertion_type` form value.
pub const JWT_BEARER_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// `aud` claim used unless the configuration names another.
pub const DEFAULT_ASSERTION_AUDIENCE: &str = "console-api";

/// How long an assertion is accepted for.
pub const ASSERTION_LIFETIME_SECS: u64 = 300;

/// Claims of a client assertion. Issuer and subject are both the client id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    /// Unique per assertion so the server can reject replays.
    pub jti: String,
    pub iat: u64,
    pub exp: u64,
}

impl AssertionClaims {
    #[must_use]
    pub fn new(client_id: &str, audience: &str) -> Self {
        let iat = now_secs();
        Self {
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            aud: audience.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }
}

/// `{"typ":"JWT","alg":"RS256","kid":<key_id>}`.
#[must_use]
pub fn assertion_header(key_id: &str) -> Header {
    let mut header = Header::new(Algorithm::RS256);
    header.typ = Some("JWT".to_string());
    header.kid = Some(key_id.to_string());
    header
}

/// Decode the configured private key: base64 of a PEM document. A raw PEM
/// document is accepted as well.
///
/// # Errors
///
/// Returns [`ConsoleError::Config`] if the value is not base64 or not an RSA
/// private key.
pub fn decode_private_key(encoded: &str) -> Result<EncodingKey> {
    let trimmed = encoded.trim();
    let pem = if trimmed.starts_with("-----BEGIN") {
        trimmed.as_bytes().to_vec()
    } else {
        let compact: String = trimmed.split_whitespace().collect();
        STANDARD.decode(compact).map_err(|e| {
            ConsoleError::Config(format!("private_key is not valid base64: {e}"))
        })?
    };
    EncodingKey::from_rsa_pem(&pem)
        .map_err(|e| ConsoleError::Config(format!("private_key is not an RSA PEM key: {e}")))
}

/// Sign a fresh assertion for `client_id`.
///
/// # Errors
///
/// Returns [`ConsoleError::Assertion`] if signing fails.
pub fn sign_assertion(
    client_id: &str,
    key_id: &str,
    audience: &str,
    key: &EncodingKey,
) -> Result<String> {
    let claims = AssertionClaims::new(client_id, audience);
    jsonwebtoken::encode(&assertion_header(key_id), &claims, key)
        .map_err(|e| ConsoleError::Assertion(e.to_string()))
}
