use std::path::{Path, PathBuf};

use crate::core::error::LauncherResult;
use crate::core::settings::GameLayout;
use crate::core::version::ResolvedInstallation;

/// Classpath entries in resolver order, client jar last.
///
/// Order decides which class wins when two jars ship the same one, so it is
/// kept exactly as declared, duplicates included.
pub fn classpath_entries(
    resolved: &ResolvedInstallation,
    layout: &GameLayout,
) -> LauncherResult<Vec<PathBuf>> {
    let mut entries = Vec::with_capacity(resolved.libraries.len() + 1);
    for library in &resolved.libraries {
        entries.push(layout.library_path(&library.local_path()?));
    }
    entries.push(layout.version_jar(&resolved.client_jar.version_id));
    Ok(entries)
}

pub fn build_classpath(resolved: &ResolvedInstallation, layout: &GameLayout) -> LauncherResult<String> {
    Ok(classpath_entries(resolved, layout)?
        .iter()
        .map(|p| safe_path_str(p))
        .collect::<Vec<_>>()
        .join(get_classpath_separator()))
}

/// Platform-specific Java classpath separator.
pub fn get_classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// Path as text for the command line, without the `\\?\` prefix Java rejects.
pub fn safe_path_str(path: &Path) -> String {
    let text = path.to_string_lossy().to_string();

    #[cfg(target_os = "windows")]
    {
        if let Some(stripped) = text.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }

    text
}
