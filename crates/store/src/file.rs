//! File-backed token cache.
//!
//! One JSON file per fingerprint under a cache directory. Writes go to a
//! uniquely named temp file that is renamed over the target, so readers only
//! ever see a whole record. Nothing guards against other processes: when two
//! invocations write the same fingerprint, the last rename wins.

use async_trait::async_trait;
use consolectl_types::{ConsoleError, CredentialStore, Fingerprint, Result, Token};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt as _;

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// A [`CredentialStore`] persisting one file per fingerprint.
#[derive(Debug, Clone)]
pub struct FileTokenCache {
    dir: PathBuf,
}

impl FileTokenCache {
    /// Creates a cache rooted at `dir`. The directory is created lazily on the
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the cache files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the record for `fingerprint`.
    #[must_use]
    pub fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{fingerprint}.json"))
    }

    /// Delete the record for `fingerprint`. Returns whether a file existed.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Cache`] if the file exists but cannot be removed.
    pub async fn remove(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let path = self.path_for(fingerprint);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ConsoleError::Cache(format!(
                "failed to remove {}: {e}",
                path.display()
            ))),
        }
    }

    async fn try_read(&self, fingerprint: &Fingerprint) -> Result<Token> {
        let path = self.path_for(fingerprint);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ConsoleError::Cache(format!("failed to read {}: {e}", path.display())))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn try_write(&self, fingerprint: &Fingerprint, token: &Token) -> Result<()> {
        self.ensure_dir().await?;

        let path = self.path_for(fingerprint);
        let tmp_path = self.dir.join(format!(
            "{fingerprint}.json.{}.tmp",
            uuid::Uuid::new_v4().simple()
        ));
        let bytes = serde_json::to_vec_pretty(token)?;

        if let Err(e) = write_private(&tmp_path, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| {
            ConsoleError::Cache(format!("failed to finalize {}: {e}", path.display()))
        })
    }

    async fn ensure_dir(&self) -> Result<()> {
        if tokio::fs::metadata(&self.dir).await.is_ok() {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ConsoleError::Cache(format!("failed to create {}: {e}", self.dir.display()))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            tokio::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(DIR_MODE))
                .await
                .map_err(|e| {
                    ConsoleError::Cache(format!(
                        "failed to set permissions on {}: {e}",
                        self.dir.display()
                    ))
                })?;
        }
        Ok(())
    }
}

async fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);

    let io_err = |e: std::io::Error| {
        ConsoleError::Cache(format!("failed to write {}: {e}", path.display()))
    };
    let mut file = options.open(path).await.map_err(io_err)?;
    file.write_all(bytes).await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    Ok(())
}

#[async_trait]
impl CredentialStore for FileTokenCache {
    async fn read(&self, fingerprint: &Fingerprint) -> Token {
        match self.try_read(fingerprint).await {
            Ok(token) => token,
            Err(e) => {
                tracing::debug!(%fingerprint, error = %e, "token cache miss");
                Token::default()
            }
        }
    }

    async fn write(&self, fingerprint: &Fingerprint, token: &Token) {
        match self.try_write(fingerprint, token).await {
            Ok(()) => tracing::debug!(%fingerprint, "token cached"),
            Err(e) => tracing::warn!(%fingerprint, error = %e, "failed to cache token"),
        }
    }
}
