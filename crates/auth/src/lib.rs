//! Token acquisition for the console transport.
//!
//! Two strategies implement [`consolectl_types::TokenProvider`]:
//!
//! - [`ServiceAccountStrategy`]: headless client-credentials grant, using a
//!   client secret or a signed private-key assertion.
//! - [`BrowserStrategy`]: interactive authorization code + PKCE through a
//!   loopback redirect, with silent refresh.
//!
//! [`AuthStrategy`] picks one from the configuration and exposes it as a
//! transport wrapper.

pub mod browser;
pub mod callback;
pub mod grant;
pub mod jwt;
pub mod opener;
pub mod pkce;
pub mod service_account;
pub mod strategy;

pub use browser::{BrowserSettings, BrowserStrategy};
pub use opener::{SystemBrowser, UrlOpener};
pub use service_account::ServiceAccountStrategy;
pub use strategy::AuthStrategy;
