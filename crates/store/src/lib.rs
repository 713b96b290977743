//! Token storage backends keyed by credential fingerprint.
//!
//! Provides an in-memory store for testing and a file-backed cache for
//! persisting tokens across process invocations.

pub mod file;
pub mod memory;

pub use file::FileTokenCache;
pub use memory::InMemoryTokenStore;
