use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

/// Unpack a native archive into `dest_dir`, overwriting files already there.
///
/// `META-INF/` and every entry starting with one of `exclude` is skipped.
/// Returns the number of files written.
pub async fn extract_native_archive(
    archive: &Path,
    dest_dir: &Path,
    exclude: &[String],
) -> LauncherResult<usize> {
    let archive = archive.to_path_buf();
    let dest_dir = dest_dir.to_path_buf();
    let exclude = exclude.to_vec();

    let joined = tokio::task::spawn_blocking({
        let archive = archive.clone();
        move || unpack(&archive, &dest_dir, &exclude)
    })
    .await;

    match joined {
        Ok(result) => result.map_err(|reason| LauncherError::Extraction { archive, reason }),
        Err(e) => Err(LauncherError::Extraction {
            archive,
            reason: format!("extraction task failed: {}", e),
        }),
    }
}

fn unpack(archive: &Path, dest_dir: &Path, exclude: &[String]) -> Result<usize, String> {
    let file = File::open(archive).map_err(|e| e.to_string())?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;
    std::fs::create_dir_all(dest_dir).map_err(|e| format!("{:?}: {}", dest_dir, e))?;

    let mut written = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| e.to_string())?;
        let name = entry.name().to_string();

        if name.starts_with("META-INF/") || exclude.iter().any(|prefix| name.starts_with(prefix)) {
            continue;
        }

        let relative: PathBuf = entry
            .enclosed_name()
            .ok_or_else(|| format!("entry {:?} escapes the target directory", name))?;
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| format!("{:?}: {}", out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| format!("{:?}: {}", parent, e))?;
        }

        let mut out = File::create(&out_path).map_err(|e| format!("{:?}: {}", out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| format!("{:?}: {}", out_path, e))?;
        debug!("Extracted native: {}", name);
        written += 1;
    }

    Ok(written)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    pub(crate) fn native_jar(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            for (name, body) in entries {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(body).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[tokio::test]
    async fn extracts_and_honors_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lwjgl-natives.jar");
        std::fs::write(
            &jar,
            native_jar(&[
                ("liblwjgl.so", b"elf"),
                ("META-INF/MANIFEST.MF", b"manifest"),
                ("skip/me.txt", b"x"),
                ("sub/libopenal.so", b"al"),
            ]),
        )
        .unwrap();
        let natives = dir.path().join("natives");
        std::fs::create_dir_all(&natives).unwrap();
        std::fs::write(natives.join("liblwjgl.so"), b"old").unwrap();

        let count = extract_native_archive(&jar, &natives, &["skip/".to_string()])
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(std::fs::read(natives.join("liblwjgl.so")).unwrap(), b"elf");
        assert!(natives.join("sub/libopenal.so").exists());
        assert!(!natives.join("META-INF").exists());
        assert!(!natives.join("skip").exists());
    }

    #[tokio::test]
    async fn corrupt_archive_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("broken.jar");
        std::fs::write(&jar, b"definitely not a zip").unwrap();

        let err = extract_native_archive(&jar, &dir.path().join("natives"), &[])
            .await
            .unwrap_err();
        match err {
            LauncherError::Extraction { archive, .. } => assert_eq!(archive, jar),
            other => panic!("unexpected error: {other}"),
        }
    }
}
