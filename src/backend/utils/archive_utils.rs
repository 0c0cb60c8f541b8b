//! Archive extraction utilities.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;
use zip::result::ZipError;

/// Entries under this prefix are signatures and manifests, never natives.
const META_INF: &str = "META-INF/";

/// Extracts a native archive into `extract_dir`, overwriting existing files.
///
/// Directories, `META-INF/` and entries starting with any of `excludes` are
/// skipped. Returns the number of files written.
pub async fn extract_natives(
    archive_path: &Path,
    extract_dir: &Path,
    excludes: &[String],
) -> Result<usize, ZipError> {
    let archive_path = archive_path.to_path_buf();
    let extract_dir = extract_dir.to_path_buf();
    let excludes = excludes.to_vec();

    tokio::task::spawn_blocking(move || extract_blocking(&archive_path, &extract_dir, &excludes))
        .await
        .map_err(io::Error::other)?
}

fn is_excluded(name: &str, excludes: &[String]) -> bool {
    name.starts_with(META_INF) || excludes.iter().any(|prefix| name.starts_with(prefix.as_str()))
}

fn extract_blocking(
    archive_path: &PathBuf,
    extract_dir: &PathBuf,
    excludes: &[String],
) -> Result<usize, ZipError> {
    info!("Extracting native archive: {archive_path:?} to {extract_dir:?}");

    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    std::fs::create_dir_all(extract_dir)?;
    let mut extracted_files = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        if is_excluded(entry.name(), excludes) {
            debug!("Skipping {}", entry.name());
            continue;
        }
        // Entries escaping the target directory are dropped.
        let Some(relative) = entry.enclosed_name() else {
            debug!("Skipping unsafe entry {}", entry.name());
            continue;
        };

        let target = extract_dir.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut output = File::create(&target)?;
        io::copy(&mut entry, &mut output)?;

        extracted_files += 1;
        debug!("Extracted: {target:?}");
    }

    info!("Extraction complete: {extracted_files} files from {archive_path:?}");
    Ok(extracted_files)
}
