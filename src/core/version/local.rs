// ─── Local Installation State ───
// Versions present on disk versus versions a profile registry declares.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::settings::GameLayout;

/// Ids of every `<root>/versions/<id>/<id>.json` on disk, sorted.
pub fn installed_versions(layout: &GameLayout) -> LauncherResult<BTreeSet<String>> {
    let dir = layout.versions_dir();
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(LauncherError::io(dir, e)),
    };

    let mut installed = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| LauncherError::io(&dir, e))?;
        let Ok(id) = entry.file_name().into_string() else {
            continue;
        };
        if layout.version_json(&id).is_file() {
            installed.insert(id);
        }
    }
    Ok(installed)
}

#[derive(Debug, Default, Deserialize)]
struct ProfileRegistry {
    #[serde(default)]
    profiles: HashMap<String, Profile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    #[serde(default)]
    last_version_id: Option<String>,
}

/// Version ids named by the profile registry. A missing registry is empty.
pub fn read_registered_versions(profiles_path: &Path) -> LauncherResult<BTreeSet<String>> {
    let raw = match std::fs::read(profiles_path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(LauncherError::io(profiles_path, e)),
    };

    let registry: ProfileRegistry = serde_json::from_slice(&raw).unwrap_or_else(|e| {
        warn!("Ignoring unreadable profile registry {:?}: {}", profiles_path, e);
        ProfileRegistry::default()
    });

    Ok(registry
        .profiles
        .into_values()
        .filter_map(|p| p.last_version_id)
        .filter(|id| !id.trim().is_empty())
        .collect())
}

/// Installed versions that no profile refers to.
pub fn unregistered_versions(
    installed: &BTreeSet<String>,
    registered: &BTreeSet<String>,
) -> Vec<String> {
    installed.difference(registered).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_installed_and_diffs_against_registry() {
        let dir = tempfile::tempdir().unwrap();
        let layout = GameLayout::new(dir.path());
        for id in ["1.20.4", "fabric-loader-0.15.0-1.20.4"] {
            let path = layout.version_json(id);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "{}").unwrap();
        }
        // A directory without its document is not an installation.
        std::fs::create_dir_all(layout.version_dir("partial")).unwrap();

        let installed = installed_versions(&layout).unwrap();
        assert_eq!(
            installed.iter().collect::<Vec<_>>(),
            vec!["1.20.4", "fabric-loader-0.15.0-1.20.4"]
        );

        std::fs::write(
            layout.profiles_path(),
            r#"{"profiles": {"a": {"name": "Latest", "lastVersionId": "1.20.4"}, "b": {"name": "Empty"}}}"#,
        )
        .unwrap();
        let registered = read_registered_versions(&layout.profiles_path()).unwrap();
        assert_eq!(registered.len(), 1);

        assert_eq!(
            unregistered_versions(&installed, &registered),
            vec!["fabric-loader-0.15.0-1.20.4"]
        );
    }

    #[test]
    fn empty_root_has_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = GameLayout::new(dir.path().join("missing"));
        assert!(installed_versions(&layout).unwrap().is_empty());
        assert!(read_registered_versions(&layout.profiles_path())
            .unwrap()
            .is_empty());
    }
}
