// ─── Version Manifest ───
// Fetching and parsing the remote version index (manifest v2).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::downloader::Fetcher;
use crate::core::error::{LauncherError, LauncherResult};

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// Top-level version index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionManifest {
    #[serde(default)]
    pub latest: Option<LatestVersions>,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// A single entry in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(rename = "releaseTime", default)]
    pub release_time: Option<String>,
}

impl VersionManifest {
    pub fn from_slice(raw: &[u8]) -> LauncherResult<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Fetch the index and keep a copy at `save_to`.
    pub async fn fetch(fetcher: &dyn Fetcher, url: &str, save_to: &Path) -> LauncherResult<Self> {
        info!("Fetching version manifest...");
        let raw = fetcher.fetch(url).await?;
        let manifest = Self::from_slice(&raw)?;

        if let Some(parent) = save_to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        // A stale local copy is harmless; the index is refetched on every sync.
        if let Err(e) = tokio::fs::write(save_to, &raw).await {
            warn!("Could not save version manifest to {:?}: {}", save_to, e);
        }

        info!("Loaded {} versions from manifest", manifest.versions.len());
        Ok(manifest)
    }

    /// Find a specific version entry by id (e.g. "1.20.4").
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Entries of the given type, in index order. `None` lists everything.
    pub fn installable(&self, version_type: Option<&str>) -> Vec<&VersionEntry> {
        self.versions
            .iter()
            .filter(|v| version_type.map_or(true, |t| v.version_type == t))
            .collect()
    }
}
