use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::core::downloader::{ArtifactSource, ArtifactStore, EnsureOutcome};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::settings::GameLayout;
use crate::core::version::AssetIndexRef;

pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Top-level asset index JSON structure.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: BTreeMap<String, AssetObject>,
}

#[derive(Debug, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    #[serde(default)]
    pub size: u64,
}

/// One validated (logical name, content hash) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetIndexEntry {
    pub name: String,
    pub hash: String,
    pub size: u64,
}

impl AssetIndex {
    pub fn from_slice(raw: &[u8]) -> LauncherResult<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Every entry, rejecting hashes that are not lowercase hex and names that
    /// would escape the virtual directory.
    pub fn entries(&self) -> LauncherResult<Vec<AssetIndexEntry>> {
        self.objects
            .iter()
            .map(|(name, object)| {
                if !is_valid_hash(&object.hash) {
                    return Err(LauncherError::InvalidAsset {
                        name: name.clone(),
                        reason: format!("bad hash {:?}", object.hash),
                    });
                }
                if !is_safe_name(name) {
                    return Err(LauncherError::InvalidAsset {
                        name: name.clone(),
                        reason: "unsafe logical name".into(),
                    });
                }
                Ok(AssetIndexEntry {
                    name: name.clone(),
                    hash: object.hash.clone(),
                    size: object.size,
                })
            })
            .collect()
    }

    /// Entries grouped by hash, so each object is fetched once.
    pub fn by_hash(&self) -> LauncherResult<BTreeMap<String, Vec<String>>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in self.entries()? {
            grouped.entry(entry.hash).or_default().push(entry.name);
        }
        Ok(grouped)
    }
}

fn is_valid_hash(hash: &str) -> bool {
    hash.len() >= 2 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && !name.contains('\\')
        && name.split('/').all(|segment| !segment.is_empty() && segment != "..")
}

fn check_hash(hash: &str, name: &str) -> LauncherResult<()> {
    if is_valid_hash(hash) {
        Ok(())
    } else {
        Err(LauncherError::InvalidAsset {
            name: name.to_string(),
            reason: format!("bad hash {:?}", hash),
        })
    }
}

fn check_name(name: &str) -> LauncherResult<()> {
    if is_safe_name(name) {
        Ok(())
    } else {
        Err(LauncherError::InvalidAsset {
            name: name.to_string(),
            reason: "unsafe logical name".into(),
        })
    }
}

/// Download URL of an object: bucket is the first two hash characters.
pub fn object_url(hash: &str) -> String {
    let bucket = hash.get(..2).unwrap_or(hash);
    format!("{}/{}/{}", RESOURCES_URL, bucket, hash)
}

/// Content-addressed object cache plus its legacy virtual projection.
#[derive(Clone)]
pub struct AssetStore {
    store: ArtifactStore,
    layout: GameLayout,
}

impl AssetStore {
    pub fn new(store: ArtifactStore, layout: GameLayout) -> Self {
        Self { store, layout }
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    /// Make sure the index document is on disk and parse it.
    pub async fn load_index(&self, index: &AssetIndexRef, force: bool) -> LauncherResult<AssetIndex> {
        let path = self.layout.asset_index_path(&index.id);
        match &index.url {
            Some(url) => {
                let source = ArtifactSource::new(url.clone()).with_sha1(index.sha1.clone());
                self.store.ensure(&source, &path, force).await?;
            }
            None if path.exists() => {}
            None => {
                return Err(LauncherError::Other(format!(
                    "asset index {} has no download URL and is not present locally",
                    index.id
                )))
            }
        }

        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| LauncherError::io(&path, e))?;
        AssetIndex::from_slice(&raw)
    }

    /// Ensure `objects/<hh>/<hash>` exists.
    pub async fn ensure_object(&self, hash: &str, force: bool) -> LauncherResult<EnsureOutcome> {
        check_hash(hash, hash)?;
        // Object files are named by their own SHA-1.
        let source = ArtifactSource::new(object_url(hash)).with_sha1(Some(hash.to_string()));
        self.store
            .ensure(&source, &self.layout.asset_object_path(hash), force)
            .await
    }

    /// Copy a cached object to `virtual/legacy/<name>`. The cached object stays.
    pub async fn project(&self, hash: &str, logical_name: &str) -> LauncherResult<PathBuf> {
        check_hash(hash, logical_name)?;
        check_name(logical_name)?;
        let object = self.layout.asset_object_path(hash);
        let target = self.layout.virtual_asset_path(logical_name);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::copy(&object, &target)
            .await
            .map_err(|e| LauncherError::io(&target, e))?;
        Ok(target)
    }

    /// Ensure the object, then project it under its logical name.
    pub async fn materialize(
        &self,
        hash: &str,
        logical_name: &str,
        force: bool,
    ) -> LauncherResult<PathBuf> {
        check_hash(hash, logical_name)?;
        check_name(logical_name)?;
        let outcome = self.ensure_object(hash, force).await?;
        debug!("Asset {} ({}): {:?}", logical_name, hash, outcome);
        self.project(hash, logical_name).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sha1::{Digest, Sha1};

    use super::*;
    use crate::core::downloader::fetch::testing::MemoryFetcher;

    fn sha1_hex(bytes: &[u8]) -> String {
        hex::encode(Sha1::digest(bytes))
    }

    fn setup() -> (Arc<MemoryFetcher>, AssetStore, tempfile::TempDir) {
        let fetcher = Arc::new(MemoryFetcher::new());
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetStore::new(
            ArtifactStore::new(fetcher.clone()),
            GameLayout::new(dir.path()),
        );
        (fetcher, assets, dir)
    }

    #[test]
    fn entries_validate_hash_and_name() {
        let good = AssetIndex::from_slice(
            br#"{"objects": {"icons/icon_16x16.png": {"hash": "bdf48ef6b5d0d23bbb02e17d04865216179f510a", "size": 3665}}}"#,
        )
        .unwrap();
        assert_eq!(good.entries().unwrap()[0].name, "icons/icon_16x16.png");

        let upper = AssetIndex::from_slice(br#"{"objects": {"a": {"hash": "ABCDEF"}}}"#).unwrap();
        assert!(upper.entries().is_err());

        let short = AssetIndex::from_slice(br#"{"objects": {"a": {"hash": "a"}}}"#).unwrap();
        assert!(short.entries().is_err());

        let escape =
            AssetIndex::from_slice(br#"{"objects": {"../evil": {"hash": "abcd"}}}"#).unwrap();
        assert!(escape.entries().is_err());
    }

    #[test]
    fn shared_hashes_are_grouped() {
        let index = AssetIndex::from_slice(
            br#"{"objects": {
                "a.ogg": {"hash": "aa11", "size": 1},
                "b.ogg": {"hash": "aa11", "size": 1},
                "c.ogg": {"hash": "bb22", "size": 2}
            }}"#,
        )
        .unwrap();
        let grouped = index.by_hash().unwrap();
        assert_eq!(grouped["aa11"], vec!["a.ogg", "b.ogg"]);
        assert_eq!(grouped["bb22"], vec!["c.ogg"]);
    }

    #[test]
    fn object_url_uses_hash_bucket() {
        assert_eq!(
            object_url("bdf48ef6b5d0d23bbb02e17d04865216179f510a"),
            "https://resources.download.minecraft.net/bd/bdf48ef6b5d0d23bbb02e17d04865216179f510a"
        );
    }

    #[tokio::test]
    async fn materialize_is_idempotent_and_reproducible() {
        let (fetcher, assets, dir) = setup();
        let body = b"sound bytes".to_vec();
        let hash = sha1_hex(&body);
        fetcher.serve(&object_url(&hash), body.clone());

        let first = assets.materialize(&hash, "sounds/step/grass1.ogg", false).await.unwrap();
        let second = assets.materialize(&hash, "sounds/step/grass1.ogg", false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), body);
        assert_eq!(fetcher.request_count(), 1);

        // Deleting the projection and re-running restores it without network.
        std::fs::remove_file(&first).unwrap();
        assets.materialize(&hash, "sounds/step/grass1.ogg", false).await.unwrap();
        assert_eq!(std::fs::read(&first).unwrap(), body);
        assert_eq!(fetcher.request_count(), 1);

        let object = GameLayout::new(dir.path()).asset_object_path(&hash);
        assert_eq!(std::fs::read(object).unwrap(), body);
    }

    #[tokio::test]
    async fn one_hash_many_names_each_get_a_copy() {
        let (fetcher, assets, dir) = setup();
        let body = b"shared".to_vec();
        let hash = sha1_hex(&body);
        fetcher.serve(&object_url(&hash), body.clone());

        assets.materialize(&hash, "a/one.txt", false).await.unwrap();
        assets.materialize(&hash, "b/two.txt", false).await.unwrap();

        let layout = GameLayout::new(dir.path());
        assert_eq!(std::fs::read(layout.virtual_asset_path("a/one.txt")).unwrap(), body);
        assert_eq!(std::fs::read(layout.virtual_asset_path("b/two.txt")).unwrap(), body);
        assert_eq!(fetcher.request_count(), 1);
    }

    #[tokio::test]
    async fn materialize_rejects_bad_hashes_and_escaping_names() {
        let (fetcher, assets, dir) = setup();
        let body = b"ok".to_vec();
        let hash = sha1_hex(&body);
        fetcher.serve(&object_url(&hash), body);

        for bad_hash in ["", "a", "ZZ11", "../x"] {
            let err = assets.materialize(bad_hash, "ok.txt", false).await.unwrap_err();
            assert!(matches!(err, LauncherError::InvalidAsset { .. }), "{bad_hash:?}");
        }
        for bad_name in ["", "/etc/passwd", "../outside.txt", "a/../../b", "a\\b"] {
            let err = assets.materialize(&hash, bad_name, false).await.unwrap_err();
            assert!(matches!(err, LauncherError::InvalidAsset { .. }), "{bad_name:?}");
        }
        assert_eq!(fetcher.request_count(), 0);
        assert!(!dir.path().join("assets/virtual/outside.txt").exists());
    }

    #[tokio::test]
    async fn index_without_url_must_exist_locally() {
        let (_fetcher, assets, _dir) = setup();
        let missing = AssetIndexRef {
            id: "legacy".into(),
            url: None,
            sha1: None,
        };
        assert!(assets.load_index(&missing, false).await.is_err());
    }
}
