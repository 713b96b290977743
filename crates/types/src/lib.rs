//! Core types and traits for the consolectl workspace.
//!
//! This crate defines the shared abstractions used by every layer of the
//! authenticated transport: the error type, the OAuth token value object,
//! the credential shapes, cache fingerprints, and the async traits that the
//! strategies and stores implement.

pub mod credential;
pub mod error;
pub mod fingerprint;
pub mod token;
pub mod traits;

pub use credential::{BrowserCredential, Credential, ServiceAccountCredential, ServiceAccountSecret};
pub use error::{ConsoleError, Result};
pub use fingerprint::Fingerprint;
pub use token::{EXPIRY_SKEW_SECS, Token, now_secs};
pub use traits::{CredentialStore, TokenProvider};
