use std::path::PathBuf;

use crate::core::error::LauncherResult;
use crate::core::settings::GameLayout;
use crate::core::version::{AssetIndexRef, ClientJarRef, LibraryRef, NativeRef, ResolvedInstallation};

/// One unit of acquisition work. Every task targets its own destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionTask {
    Library {
        library: LibraryRef,
        dest: PathBuf,
    },
    /// Fetch the index document, then materialize every object it lists.
    Assets { index: AssetIndexRef },
    ClientJar {
        jar: ClientJarRef,
        dest: PathBuf,
    },
    /// Download the archive, then unpack it into `natives_dir`.
    Native {
        native: NativeRef,
        archive: PathBuf,
        natives_dir: PathBuf,
    },
}

impl AcquisitionTask {
    /// Name used in logs and failure reports.
    pub fn subject(&self) -> String {
        match self {
            AcquisitionTask::Library { library, .. } => library.identity(),
            AcquisitionTask::Assets { index } => format!("asset index {}", index.id),
            AcquisitionTask::ClientJar { jar, .. } => format!("client {}", jar.version_id),
            AcquisitionTask::Native { native, .. } => native.library.identity(),
        }
    }
}

/// Turn a resolved installation into an ordered task list:
/// libraries, assets, client jar, natives.
pub fn plan(resolved: &ResolvedInstallation, layout: &GameLayout) -> LauncherResult<Vec<AcquisitionTask>> {
    let mut tasks = Vec::with_capacity(resolved.libraries.len() + resolved.natives.len() + 2);

    for library in &resolved.libraries {
        tasks.push(AcquisitionTask::Library {
            dest: layout.library_path(&library.local_path()?),
            library: library.clone(),
        });
    }

    if let Some(index) = &resolved.asset_index {
        tasks.push(AcquisitionTask::Assets {
            index: index.clone(),
        });
    }

    tasks.push(AcquisitionTask::ClientJar {
        dest: layout.version_jar(&resolved.client_jar.version_id),
        jar: resolved.client_jar.clone(),
    });

    let natives_dir = layout.natives_dir(&resolved.id);
    for native in &resolved.natives {
        tasks.push(AcquisitionTask::Native {
            archive: layout.library_path(&native.library.local_path()?),
            native: native.clone(),
            natives_dir: natives_dir.clone(),
        });
    }

    Ok(tasks)
}
