// ─── Version Resolver ───
// Walks an `inheritsFrom` chain and folds it into one ResolvedInstallation.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult, ResolutionError};
use crate::core::settings::GameLayout;

use super::record::{ResolvedInstallation, VersionRecord};
use super::version_file::VersionDocument;

/// Where version records come from. `Ok(None)` means "no such version".
pub trait VersionSource {
    fn load(&self, id: &str) -> LauncherResult<Option<VersionRecord>>;
}

impl VersionSource for HashMap<String, VersionRecord> {
    fn load(&self, id: &str) -> LauncherResult<Option<VersionRecord>> {
        Ok(self.get(id).cloned())
    }
}

/// Reads `<root>/versions/<id>/<id>.json`.
pub struct FsVersionSource {
    layout: GameLayout,
}

impl FsVersionSource {
    pub fn new(layout: GameLayout) -> Self {
        Self { layout }
    }
}

impl VersionSource for FsVersionSource {
    fn load(&self, id: &str) -> LauncherResult<Option<VersionRecord>> {
        let path = self.layout.version_json(id);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LauncherError::io(path, e)),
        };

        let mut record = VersionDocument::parse(id, &raw)?.into_record(id)?;
        // The directory name is the identity other documents refer to.
        record.id = id.to_string();
        Ok(Some(record))
    }
}

pub struct VersionResolver<S> {
    source: S,
}

impl<S: VersionSource> VersionResolver<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Resolve `id` and every ancestor into one launch-ready record.
    ///
    /// Ancestors are applied root first, so a field set anywhere in the chain
    /// is visible only if no descendant overrides it.
    pub fn resolve(&self, id: &str) -> LauncherResult<ResolvedInstallation> {
        let mut chain: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut records: Vec<VersionRecord> = Vec::new();
        let mut current = id.to_string();

        loop {
            if !visited.insert(current.clone()) {
                chain.push(current);
                return Err(ResolutionError::Cycle { chain }.into());
            }

            let record = match self.source.load(&current)? {
                Some(record) => record,
                None => {
                    return Err(match chain.last() {
                        None => ResolutionError::UnknownVersion(current),
                        Some(child) => ResolutionError::MissingParent {
                            child: child.clone(),
                            parent: current,
                        },
                    }
                    .into())
                }
            };

            let parent = record.inherits_from.clone();
            chain.push(current);
            records.push(record);

            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        debug!("Resolved inheritance chain: {}", chain.join(" -> "));

        let mut from_root = records.into_iter().rev();
        let root = from_root
            .next()
            .ok_or_else(|| ResolutionError::UnknownVersion(id.to_string()))?;
        let merged = from_root.fold(root, |parent, child| child.overlay_onto(parent));

        Ok(merged.into_resolved(chain)?)
    }
}
