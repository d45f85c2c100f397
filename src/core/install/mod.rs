// ─── Installer ───
// Drives an acquisition plan through the artifact store with a bounded
// number of transfers in flight.

mod natives;
mod plan;

pub use natives::extract_native_archive;
pub use plan::{plan, AcquisitionTask};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::core::assets::AssetStore;
use crate::core::downloader::{ArtifactSource, ArtifactStore};
use crate::core::error::{AcquisitionFailure, LauncherError, LauncherResult};
use crate::core::events::{DownloadPhase, EventSink};
use crate::core::settings::GameLayout;
use crate::core::version::{AssetIndexRef, ClientJarRef, LibraryRef};

pub struct Installer {
    store: ArtifactStore,
    assets: AssetStore,
    concurrency: usize,
    events: Arc<dyn EventSink>,
}

impl Installer {
    pub fn new(
        store: ArtifactStore,
        layout: GameLayout,
        concurrency: usize,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            assets: AssetStore::new(store.clone(), layout),
            store,
            concurrency: concurrency.max(1),
            events,
        }
    }

    /// Run every task. Transfer failures are collected and reported together
    /// once all tasks were attempted; an extraction failure aborts at once.
    pub async fn execute(&self, tasks: &[AcquisitionTask], force: bool) -> LauncherResult<()> {
        let mut libraries = Vec::new();
        let mut indexes = Vec::new();
        let mut clients = Vec::new();
        let mut natives = Vec::new();
        for task in tasks {
            match task {
                AcquisitionTask::Library { library, .. } => libraries.push(library),
                AcquisitionTask::Assets { index } => indexes.push(index),
                AcquisitionTask::ClientJar { jar, dest } => clients.push((jar, dest.as_path())),
                AcquisitionTask::Native {
                    native,
                    natives_dir,
                    ..
                } => natives.push((native, natives_dir.as_path())),
            }
        }

        let mut failures: Vec<AcquisitionFailure> = Vec::new();

        if !libraries.is_empty() {
            self.events.on_download(DownloadPhase::Libraries);
            info!("Acquiring {} libraries", libraries.len());
            failures.extend(
                self.run_all(libraries, |lib| async move {
                    self.acquire_library(lib, force)
                        .await
                        .map(|_| ())
                        .map_err(|e| AcquisitionFailure::new(lib.identity(), e))
                })
                .await,
            );
        }

        if !indexes.is_empty() {
            self.events.on_download(DownloadPhase::Assets);
            for index in indexes {
                failures.extend(self.acquire_assets(index, force).await);
            }
        }

        if !clients.is_empty() {
            self.events.on_download(DownloadPhase::Client);
            for (jar, dest) in clients {
                if let Err(e) = self.acquire_client(jar, dest, force).await {
                    failures.push(AcquisitionFailure::new(format!("client {}", jar.version_id), e));
                }
            }
        }

        if !natives.is_empty() {
            self.events.on_download(DownloadPhase::Natives);
            let fetched: Vec<_> = stream::iter(natives)
                .map(|(native, dir)| async move {
                    (native, dir, self.acquire_library(&native.library, force).await)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

            for (native, natives_dir, result) in fetched {
                match result {
                    Ok(archive) => {
                        extract_native_archive(&archive, natives_dir, &native.exclude).await?;
                    }
                    Err(e) => failures.push(AcquisitionFailure::new(native.library.identity(), e)),
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            warn!("{} artifact(s) failed", failures.len());
            Err(LauncherError::Acquisition(failures))
        }
    }

    /// Only the native archives: download and unpack.
    pub async fn execute_natives(&self, tasks: &[AcquisitionTask], force: bool) -> LauncherResult<()> {
        let natives: Vec<AcquisitionTask> = tasks
            .iter()
            .filter(|t| matches!(t, AcquisitionTask::Native { .. }))
            .cloned()
            .collect();
        self.execute(&natives, force).await
    }

    async fn run_all<T, F, Fut>(&self, items: Vec<T>, work: F) -> Vec<AcquisitionFailure>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<(), AcquisitionFailure>>,
    {
        stream::iter(items)
            .map(work)
            .buffer_unordered(self.concurrency)
            .filter_map(|r| async move { r.err() })
            .collect()
            .await
    }

    /// Fetch a library to its local path; on failure retry once from the
    /// coordinate-derived URL. Returns the local file.
    async fn acquire_library(
        &self,
        lib: &LibraryRef,
        force: bool,
    ) -> LauncherResult<PathBuf> {
        let dest = self.assets.layout().library_path(&lib.local_path()?);
        let primary = lib
            .primary_url()
            .ok_or_else(|| LauncherError::InvalidCoordinate(lib.name.clone()))?;

        let source = ArtifactSource::new(primary.clone()).with_sha1(lib.sha1.clone());
        let first = match self.store.ensure(&source, &dest, force).await {
            Ok(_) => return Ok(dest),
            Err(e) => e,
        };

        let Some(fallback) = lib.derived_url() else {
            return Err(first);
        };
        warn!(
            "Library {} failed from {} ({}), retrying from {}",
            lib.identity(),
            primary,
            first,
            fallback
        );
        let source = ArtifactSource::new(fallback).with_sha1(lib.sha1.clone());
        self.store.ensure(&source, &dest, force).await?;
        Ok(dest)
    }

    async fn acquire_assets(&self, index: &AssetIndexRef, force: bool) -> Vec<AcquisitionFailure> {
        let subject = format!("asset index {}", index.id);
        let grouped = match self
            .assets
            .load_index(index, force)
            .await
            .and_then(|loaded| loaded.by_hash())
        {
            Ok(grouped) => grouped,
            Err(e) => return vec![AcquisitionFailure::new(subject, e)],
        };
        info!("Materializing {} asset objects from index {}", grouped.len(), index.id);

        let groups: Vec<(String, Vec<String>)> = grouped.into_iter().collect();
        self.run_all(groups, |(hash, names)| async move {
            let assets = &self.assets;
            let first_name = names.first().cloned().unwrap_or_else(|| hash.clone());
            let result = async {
                assets.ensure_object(&hash, force).await?;
                for name in &names {
                    assets.project(&hash, name).await?;
                }
                Ok::<_, LauncherError>(())
            }
            .await;
            result.map_err(|e| AcquisitionFailure::new(first_name, e))
        })
        .await
    }

    async fn acquire_client(
        &self,
        jar: &ClientJarRef,
        dest: &Path,
        force: bool,
    ) -> LauncherResult<()> {
        match &jar.url {
            Some(url) => {
                let source = ArtifactSource::new(url.clone()).with_sha1(jar.sha1.clone());
                self.store.ensure(&source, dest, force).await?;
                Ok(())
            }
            None if dest.exists() => Ok(()),
            None => Err(LauncherError::Other(format!(
                "client jar {} has no download URL and is not present locally",
                jar.version_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use sha1::{Digest, Sha1};

    use super::*;
    use crate::core::assets::object_url;
    use crate::core::downloader::fetch::testing::MemoryFetcher;
    use crate::core::events::testing::RecordingEvents;
    use crate::core::maven::LibraryCoordinate;
    use crate::core::version::{NativeRef, ResolvedInstallation};

    const FOO_DERIVED: &str = "https://libraries.minecraft.net/com/example/foo/1.0/foo-1.0.jar";

    struct Harness {
        fetcher: Arc<MemoryFetcher>,
        events: Arc<RecordingEvents>,
        layout: GameLayout,
        installer: Installer,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let fetcher = Arc::new(MemoryFetcher::new());
        let events = Arc::new(RecordingEvents::default());
        let dir = tempfile::tempdir().unwrap();
        let layout = GameLayout::new(dir.path());
        let installer = Installer::new(
            ArtifactStore::new(fetcher.clone()),
            layout.clone(),
            4,
            events.clone(),
        );
        Harness {
            fetcher,
            events,
            layout,
            installer,
            _dir: dir,
        }
    }

    fn foo() -> LibraryRef {
        LibraryRef::from_coordinate(LibraryCoordinate::parse("com.example:foo:1.0").unwrap())
    }

    fn installation(libraries: Vec<LibraryRef>) -> ResolvedInstallation {
        ResolvedInstallation {
            id: "vanilla-1".into(),
            chain: vec!["vanilla-1".into()],
            version_type: None,
            main_class: "Main".into(),
            launch_arguments: vec![],
            asset_index: None,
            client_jar: ClientJarRef {
                version_id: "vanilla-1".into(),
                url: Some("https://piston/client.jar".into()),
                sha1: None,
            },
            libraries,
            natives: vec![],
        }
    }

    #[tokio::test]
    async fn missing_declared_url_uses_derived_path_and_url() {
        let h = harness();
        h.fetcher.serve(FOO_DERIVED, b"foo".to_vec());
        h.fetcher.serve("https://piston/client.jar", b"client".to_vec());

        let tasks = plan(&installation(vec![foo()]), &h.layout).unwrap();
        h.installer.execute(&tasks, false).await.unwrap();

        assert_eq!(
            std::fs::read(h.layout.library_path("com/example/foo/1.0/foo-1.0.jar")).unwrap(),
            b"foo"
        );
        assert!(h.layout.version_jar("vanilla-1").exists());
        assert_eq!(
            *h.events.downloads.lock().unwrap(),
            vec![DownloadPhase::Libraries, DownloadPhase::Client]
        );
    }

    #[tokio::test]
    async fn broken_declared_url_falls_back_once() {
        let h = harness();
        h.fetcher.serve(FOO_DERIVED, b"foo".to_vec());
        h.fetcher.serve("https://piston/client.jar", b"client".to_vec());
        let mut lib = foo();
        lib.url = Some("https://dead.example.com/foo.jar".into());

        let tasks = plan(&installation(vec![lib]), &h.layout).unwrap();
        h.installer.execute(&tasks, false).await.unwrap();

        let requests = h.fetcher.requests();
        assert!(requests.contains(&"https://dead.example.com/foo.jar".to_string()));
        assert!(requests.contains(&FOO_DERIVED.to_string()));
        assert!(h
            .layout
            .library_path("com/example/foo/1.0/foo-1.0.jar")
            .exists());
    }

    #[tokio::test]
    async fn failures_are_aggregated_after_all_tasks_ran() {
        let h = harness();
        let good = LibraryRef::from_coordinate(LibraryCoordinate::parse("com.example:good:1.0").unwrap());
        h.fetcher.serve(
            "https://libraries.minecraft.net/com/example/good/1.0/good-1.0.jar",
            b"good".to_vec(),
        );

        let tasks = plan(&installation(vec![foo(), good]), &h.layout).unwrap();
        let err = h.installer.execute(&tasks, false).await.unwrap_err();

        match err {
            LauncherError::Acquisition(failures) => {
                let subjects: Vec<_> = failures.iter().map(|f| f.subject.as_str()).collect();
                assert!(subjects.contains(&"com.example:foo:1.0"));
                assert!(subjects.contains(&"client vanilla-1"));
                assert_eq!(failures.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Foo was tried twice (primary, then the single retry).
        let foo_requests = h
            .fetcher
            .requests()
            .into_iter()
            .filter(|u| u == FOO_DERIVED)
            .count();
        assert_eq!(foo_requests, 2);
        assert!(h
            .layout
            .library_path("com/example/good/1.0/good-1.0.jar")
            .exists());
    }

    #[tokio::test]
    async fn assets_and_natives_are_acquired() {
        let h = harness();
        let body = b"icon".to_vec();
        let hash = hex::encode(Sha1::digest(&body));
        let index = format!(
            r#"{{"objects": {{"icons/a.png": {{"hash": "{hash}", "size": 4}}, "icons/b.png": {{"hash": "{hash}", "size": 4}}}}}}"#
        );
        h.fetcher.serve("https://meta/5.json", index.into_bytes());
        h.fetcher.serve(&object_url(&hash), body.clone());
        h.fetcher.serve("https://piston/client.jar", b"client".to_vec());
        let native_jar = natives::tests::native_jar(&[("liblwjgl.so", b"elf")]);
        h.fetcher.serve(
            "https://libraries.minecraft.net/org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar",
            native_jar,
        );

        let mut resolved = installation(vec![]);
        resolved.asset_index = Some(AssetIndexRef {
            id: "5".into(),
            url: Some("https://meta/5.json".into()),
            sha1: None,
        });
        resolved.natives = vec![NativeRef {
            library: LibraryRef::from_coordinate(
                LibraryCoordinate::parse("org.lwjgl:lwjgl:3.3.1:natives-linux").unwrap(),
            ),
            exclude: vec![],
        }];

        let tasks = plan(&resolved, &h.layout).unwrap();
        h.installer.execute(&tasks, false).await.unwrap();

        assert_eq!(std::fs::read(h.layout.virtual_asset_path("icons/a.png")).unwrap(), body);
        assert_eq!(std::fs::read(h.layout.virtual_asset_path("icons/b.png")).unwrap(), body);
        assert!(h.layout.asset_index_path("5").exists());
        assert_eq!(
            std::fs::read(h.layout.natives_dir("vanilla-1").join("liblwjgl.so")).unwrap(),
            b"elf"
        );
        let object_fetches = h
            .fetcher
            .requests()
            .into_iter()
            .filter(|u| *u == object_url(&hash))
            .count();
        assert_eq!(object_fetches, 1);

        // A second run over a populated tree needs no network at all.
        let before = h.fetcher.request_count();
        h.installer.execute(&tasks, false).await.unwrap();
        assert_eq!(h.fetcher.request_count(), before);
    }

    #[tokio::test]
    async fn corrupt_native_archive_aborts_with_extraction_error() {
        let h = harness();
        h.fetcher.serve("https://piston/client.jar", b"client".to_vec());
        h.fetcher.serve(
            "https://libraries.minecraft.net/org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar",
            b"not a zip archive".to_vec(),
        );

        let mut resolved = installation(vec![]);
        resolved.natives = vec![NativeRef {
            library: LibraryRef::from_coordinate(
                LibraryCoordinate::parse("org.lwjgl:lwjgl:3.3.1:natives-linux").unwrap(),
            ),
            exclude: vec![],
        }];

        let tasks = plan(&resolved, &h.layout).unwrap();
        match h.installer.execute(&tasks, false).await.unwrap_err() {
            LauncherError::Extraction { archive, .. } => assert_eq!(
                archive,
                h.layout
                    .library_path("org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-linux.jar")
            ),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!h.layout.natives_dir("vanilla-1").join("liblwjgl.so").exists());
    }
}
