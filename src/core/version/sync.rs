// ─── Metadata Sync ───
// Makes sure every version document of an inheritance chain is on disk before
// the resolver reads it.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::core::downloader::{ArtifactSource, ArtifactStore};
use crate::core::error::{LauncherError, LauncherResult, ResolutionError};
use crate::core::settings::GameLayout;

use super::manifest::VersionManifest;
use super::version_file::VersionDocument;

pub struct MetadataSync<'a> {
    store: &'a ArtifactStore,
    layout: &'a GameLayout,
    manifest_url: &'a str,
    manifest: Option<VersionManifest>,
}

impl<'a> MetadataSync<'a> {
    pub fn new(store: &'a ArtifactStore, layout: &'a GameLayout, manifest_url: &'a str) -> Self {
        Self {
            store,
            layout,
            manifest_url,
            manifest: None,
        }
    }

    /// The index is only fetched once something actually needs it.
    async fn manifest(&mut self) -> LauncherResult<&VersionManifest> {
        if self.manifest.is_none() {
            let fetched = VersionManifest::fetch(
                self.store.fetcher().as_ref(),
                self.manifest_url,
                &self.layout.manifest_path(),
            )
            .await?;
            self.manifest = Some(fetched);
        }
        self.manifest
            .as_ref()
            .ok_or_else(|| LauncherError::Other("version manifest unavailable".into()))
    }

    /// Fetch every missing document from `id` up to the chain root, returning
    /// the chain leaf first. With `force`, documents listed in the index are
    /// refetched; documents the index does not know (loader profiles) are kept.
    pub async fn sync_chain(&mut self, id: &str, force: bool) -> LauncherResult<Vec<String>> {
        let mut chain: Vec<String> = Vec::new();
        let mut visited = HashSet::new();
        let mut current = id.to_string();

        loop {
            if !visited.insert(current.clone()) {
                chain.push(current);
                return Err(ResolutionError::Cycle { chain }.into());
            }

            let path = self.layout.version_json(&current);
            let present = tokio::fs::try_exists(&path).await.unwrap_or(false);

            if force || !present {
                let entry = self.manifest().await?.find_version(&current).cloned();
                match entry {
                    Some(entry) => {
                        info!("Fetching version document {}", current);
                        let source = ArtifactSource::new(entry.url).with_sha1(entry.sha1);
                        self.store.ensure(&source, &path, force).await?;
                    }
                    None if present => {
                        debug!("{} is not in the version index, keeping local copy", current);
                    }
                    None => {
                        return Err(match chain.last() {
                            None => ResolutionError::UnknownVersion(current),
                            Some(child) => ResolutionError::MissingParent {
                                child: child.clone(),
                                parent: current,
                            },
                        }
                        .into());
                    }
                }
            }

            let raw = tokio::fs::read(&path)
                .await
                .map_err(|e| LauncherError::io(&path, e))?;
            let parent = VersionDocument::parse(&current, &raw)?
                .inherits_from
                .filter(|p| !p.trim().is_empty());
            chain.push(current);

            match parent {
                Some(parent) => current = parent,
                None => return Ok(chain),
            }
        }
    }
}
