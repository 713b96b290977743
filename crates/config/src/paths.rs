//! Default on-disk locations, rooted at `$HOME`.

use consolectl_types::{ConsoleError, Result};
use std::path::PathBuf;

/// Return the user's home directory, or error if unset.
///
/// # Errors
///
/// Returns [`ConsoleError::Config`] when `HOME` is not set.
pub fn home_dir() -> Result<PathBuf> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| ConsoleError::Config("cannot determine home directory".into()))
}

/// `~/.config/consolectl/config.yaml`
///
/// # Errors
///
/// Returns [`ConsoleError::Config`] when `HOME` is not set.
pub fn config_path() -> Result<PathBuf> {
    Ok(home_dir()?
        .join(".config")
        .join("consolectl")
        .join("config.yaml"))
}

/// `~/.cache/consolectl/tokens`
///
/// # Errors
///
/// Returns [`ConsoleError::Config`] when `HOME` is not set.
pub fn token_cache_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join(".cache").join("consolectl").join("tokens"))
}
