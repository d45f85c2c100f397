// ─── Settings & Layout ───
// User-tunable runtime options and the on-disk layout every component shares.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::auth::SessionIdentity;
use crate::core::error::{LauncherError, LauncherResult};

const SETTINGS_FILE: &str = "launcher_settings.json";
const PROFILES_FILE: &str = "launcher_profiles.json";
const MAX_CONCURRENCY: usize = 16;

/// Every path the pipeline reads or writes, derived from one root.
///
/// ```text
/// <root>/versions/<id>/<id>.json
/// <root>/versions/<id>/<id>.jar
/// <root>/versions/<id>/natives/
/// <root>/libraries/<derived-path>
/// <root>/assets/indexes/<index>.json
/// <root>/assets/objects/<hash[0:2]>/<hash>
/// <root>/assets/virtual/legacy/<logical name>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLayout {
    root: PathBuf,
}

impl GameLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout rooted at the platform's conventional game directory.
    pub fn default_location() -> Self {
        Self::new(default_root())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id)
    }

    pub fn version_json(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{}.json", id))
    }

    pub fn version_jar(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{}.jar", id))
    }

    pub fn natives_dir(&self, id: &str) -> PathBuf {
        self.version_dir(id).join("natives")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.versions_dir().join("version_manifest_v2.json")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    /// Local file for a `/`-separated path relative to the libraries directory.
    pub fn library_path(&self, relative: &str) -> PathBuf {
        join_relative(&self.libraries_dir(), relative)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn asset_index_path(&self, index_id: &str) -> PathBuf {
        self.assets_dir()
            .join("indexes")
            .join(format!("{}.json", index_id))
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.assets_dir().join("objects")
    }

    /// `objects/<first two hash chars>/<hash>`.
    pub fn asset_object_path(&self, hash: &str) -> PathBuf {
        let bucket = hash.get(..2).unwrap_or(hash);
        self.objects_dir().join(bucket).join(hash)
    }

    pub fn virtual_legacy_dir(&self) -> PathBuf {
        self.assets_dir().join("virtual").join("legacy")
    }

    pub fn virtual_asset_path(&self, logical_name: &str) -> PathBuf {
        join_relative(&self.virtual_legacy_dir(), logical_name)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn profiles_path(&self) -> PathBuf {
        self.root.join(PROFILES_FILE)
    }
}

fn join_relative(base: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(base.to_path_buf(), |path, segment| path.join(segment))
}

/// Conventional game directory: `%APPDATA%\.minecraft`, `~/Library/Application
/// Support/minecraft` or `~/.minecraft`.
pub fn default_root() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".minecraft")
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("minecraft")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".minecraft")
    }
}

/// Persisted launcher configuration (`launcher_settings.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LauncherSettings {
    pub java_path: PathBuf,
    pub min_memory_mb: u32,
    pub max_memory_mb: u32,
    /// Extra runtime flags, placed before the memory flags.
    pub jvm_args: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub version_type: String,
    pub probe_timeout_secs: u64,
    pub download_concurrency: usize,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            java_path: PathBuf::from("java"),
            min_memory_mb: 1024,
            max_memory_mb: 1024,
            jvm_args: Vec::new(),
            width: 854,
            height: 480,
            version_type: "release".into(),
            probe_timeout_secs: 10,
            download_concurrency: 8,
        }
    }
}

impl LauncherSettings {
    /// Load settings, falling back to defaults when the file is absent or unreadable.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Cannot read settings {:?}, using defaults: {}", path, e);
                return Self::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Invalid settings {:?}, using defaults: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> LauncherResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| LauncherError::io(path, e))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn concurrency(&self) -> usize {
        self.download_concurrency.clamp(1, MAX_CONCURRENCY)
    }
}

/// Everything the command builder needs from the caller.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub java_path: PathBuf,
    pub min_memory_mb: u32,
    pub max_memory_mb: u32,
    pub extra_jvm_args: Vec<String>,
    pub window: Option<(u32, u32)>,
    pub version_type: String,
    pub game_dir: PathBuf,
    pub session: SessionIdentity,
}

impl RuntimeOptions {
    pub fn from_settings(
        settings: &LauncherSettings,
        session: SessionIdentity,
        game_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            java_path: settings.java_path.clone(),
            min_memory_mb: settings.min_memory_mb,
            max_memory_mb: settings.max_memory_mb,
            extra_jvm_args: settings
                .jvm_args
                .iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            window: Some((settings.width, settings.height)),
            version_type: settings.version_type.clone(),
            game_dir: game_dir.into(),
            session,
        }
    }
}
