// ─── Launcher ───
// Composes the pipeline: metadata sync → resolve → acquire → build → supervise.

use std::sync::Arc;

use chrono::Local;
use tracing::info;

use crate::core::auth::SessionIdentity;
use crate::core::downloader::{ArtifactStore, Fetcher};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::events::{DownloadPhase, EventSink, LaunchPhase};
use crate::core::install::{plan, Installer};
use crate::core::launch::{
    build_command, classpath_entries, FileLogSink, LaunchOutcome, LogSink, SupervisedProcess,
    Supervisor, TracingLogSink,
};
use crate::core::settings::{GameLayout, LauncherSettings, RuntimeOptions};
use crate::core::version::{
    installed_versions, read_registered_versions, unregistered_versions, FsVersionSource,
    MetadataSync, ResolvedInstallation, VersionEntry, VersionManifest, VersionResolver,
    VERSION_MANIFEST_URL,
};

pub struct Launcher {
    layout: GameLayout,
    settings: LauncherSettings,
    store: ArtifactStore,
    events: Arc<dyn EventSink>,
    manifest_url: String,
}

/// Versions on disk and the ones no profile mentions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalState {
    pub installed: Vec<String>,
    pub unregistered: Vec<String>,
}

impl Launcher {
    pub fn new(
        layout: GameLayout,
        settings: LauncherSettings,
        fetcher: Arc<dyn Fetcher>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            layout,
            settings,
            store: ArtifactStore::new(fetcher),
            events,
            manifest_url: VERSION_MANIFEST_URL.to_string(),
        }
    }

    pub fn with_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.manifest_url = url.into();
        self
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    pub fn settings(&self) -> &LauncherSettings {
        &self.settings
    }

    /// Remote index entries, optionally restricted to one version type.
    pub async fn list_versions(&self, version_type: Option<&str>) -> LauncherResult<Vec<VersionEntry>> {
        let manifest = VersionManifest::fetch(
            self.store.fetcher().as_ref(),
            &self.manifest_url,
            &self.layout.manifest_path(),
        )
        .await?;
        Ok(manifest.installable(version_type).into_iter().cloned().collect())
    }

    pub fn local_state(&self) -> LauncherResult<LocalState> {
        let installed = installed_versions(&self.layout)?;
        let registered = read_registered_versions(&self.layout.profiles_path())?;
        Ok(LocalState {
            unregistered: unregistered_versions(&installed, &registered),
            installed: installed.into_iter().collect(),
        })
    }

    pub fn resolve(&self, id: &str) -> LauncherResult<ResolvedInstallation> {
        VersionResolver::new(FsVersionSource::new(self.layout.clone())).resolve(id)
    }

    async fn sync_and_resolve(&self, id: &str, force: bool) -> LauncherResult<ResolvedInstallation> {
        self.events.on_download(DownloadPhase::Metadata);
        MetadataSync::new(&self.store, &self.layout, &self.manifest_url)
            .sync_chain(id, force)
            .await?;
        self.resolve(id)
    }

    fn installer(&self) -> Installer {
        Installer::new(
            self.store.clone(),
            self.layout.clone(),
            self.settings.concurrency(),
            self.events.clone(),
        )
    }

    /// Download everything `id` needs to run, without launching it.
    pub async fn download(&self, id: &str, force: bool) -> LauncherResult<ResolvedInstallation> {
        let resolved = self.sync_and_resolve(id, force).await?;
        let tasks = plan(&resolved, &self.layout)?;
        info!("Planned {} acquisition tasks for {}", tasks.len(), id);

        self.installer().execute(&tasks, force).await?;
        self.events.on_download(DownloadPhase::Complete);
        Ok(resolved)
    }

    /// Prepare and start `id`.
    ///
    /// Missing classpath files trigger a full acquisition, as does `verify`;
    /// natives are always re-extracted.
    pub async fn launch(
        &self,
        id: &str,
        session: SessionIdentity,
        verify: bool,
    ) -> LauncherResult<SupervisedProcess> {
        self.events.on_launch(LaunchPhase::Validating);
        let resolved = self.sync_and_resolve(id, false).await?;
        let tasks = plan(&resolved, &self.layout)?;
        let installer = self.installer();

        let missing = classpath_entries(&resolved, &self.layout)?
            .into_iter()
            .filter(|p| !p.exists())
            .count();
        if verify || missing > 0 {
            info!("Acquiring {} ({} classpath entries missing)", id, missing);
            installer.execute(&tasks, false).await?;
        } else {
            self.events.on_launch(LaunchPhase::DownloadingNatives);
            installer.execute_natives(&tasks, false).await?;
        }

        self.events.on_launch(LaunchPhase::Starting);
        let game_dir = self.layout.root().to_path_buf();
        tokio::fs::create_dir_all(&game_dir)
            .await
            .map_err(|e| LauncherError::io(&game_dir, e))?;

        let options = RuntimeOptions::from_settings(&self.settings, session, game_dir);
        let command = build_command(&resolved, &self.layout, &options)?;

        let log_path = self
            .layout
            .logs_dir()
            .join(format!("launch-{}.log", Local::now().format("%Y-%m-%d_%H-%M-%S")));
        let sinks: Vec<Arc<dyn LogSink>> = vec![
            Arc::new(TracingLogSink),
            Arc::new(FileLogSink::create(&log_path)?),
        ];
        info!("Game output is logged to {:?}", log_path);

        let supervisor = Supervisor::new(self.settings.probe_timeout(), Arc::new(sinks));
        let process = supervisor.launch(&command).await?;

        match process.outcome {
            LaunchOutcome::GameStarted => self.events.on_launch(LaunchPhase::Started),
            LaunchOutcome::GameCorrupted(code) => {
                self.events.on_launch(LaunchPhase::Corrupted(code))
            }
        }
        Ok(process)
    }
}
