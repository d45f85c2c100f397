use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha1::{Digest, Sha1};
use tracing::debug;
use uuid::Uuid;

use crate::core::error::{FetchError, FetchErrorKind, LauncherError, LauncherResult};

use super::fetch::Fetcher;

/// Where an artifact comes from and, optionally, what it must hash to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSource {
    pub url: String,
    pub sha1: Option<String>,
}

impl ArtifactSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sha1: None,
        }
    }

    pub fn with_sha1(mut self, sha1: Option<String>) -> Self {
        self.sha1 = sha1.filter(|s| !s.trim().is_empty());
        self
    }
}

/// What [`ArtifactStore::ensure`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    AlreadyPresent,
    Downloaded,
}

/// Idempotent download-if-missing on top of a [`Fetcher`].
///
/// Files are written under a unique temporary name next to the destination
/// and renamed into place only after the transfer (and checksum, if any)
/// succeeded, so a failed fetch never leaves something that a later call
/// would mistake for a present artifact.
#[derive(Clone)]
pub struct ArtifactStore {
    fetcher: Arc<dyn Fetcher>,
}

impl ArtifactStore {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Make sure `dest` exists. An existing file is trusted as-is unless `force`.
    pub async fn ensure(
        &self,
        source: &ArtifactSource,
        dest: &Path,
        force: bool,
    ) -> LauncherResult<EnsureOutcome> {
        if !force && tokio::fs::try_exists(dest).await.unwrap_or(false) {
            return Ok(EnsureOutcome::AlreadyPresent);
        }

        if let Some(parent) = dest.parent() {
            // create_dir_all treats an existing directory as success, which makes
            // concurrent creation of the same parent harmless.
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let tmp = temp_path_for(dest);
        if let Err(err) = self.fetch_verified(source, &tmp).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err);
        }

        if let Err(e) = tokio::fs::rename(&tmp, dest).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(LauncherError::io(dest, e));
        }

        debug!("Stored {} -> {:?}", source.url, dest);
        Ok(EnsureOutcome::Downloaded)
    }

    async fn fetch_verified(&self, source: &ArtifactSource, tmp: &Path) -> LauncherResult<()> {
        self.fetcher.fetch_to_file(&source.url, tmp).await?;

        if let Some(expected) = &source.sha1 {
            let actual = sha1_of_file(tmp).await?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(FetchError {
                    url: source.url.clone(),
                    retries: 0,
                    kind: FetchErrorKind::ChecksumMismatch {
                        expected: expected.clone(),
                        actual,
                    },
                }
                .into());
            }
        }
        Ok(())
    }
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.{}.part", name, Uuid::new_v4().simple()))
}

/// Lowercase hex SHA-1 of a file on disk.
pub async fn sha1_of_file(path: &Path) -> LauncherResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    let mut hasher = Sha1::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
