//! Archive resolution
//!
//! A package points either at an archive file or at a directory of build
//! outputs; in the latter case the most recently modified `.zip` is used.

use crate::core::error::UploadError;
use crate::core::package::Package;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

const ARCHIVE_EXTENSION: &str = "zip";

/// Resolve the archive file to upload for a package
///
/// Files are returned as-is. Directories are scanned one level deep; ties on
/// modification time go to the first file name in sorted order.
pub fn resolve_archive(package: &Package) -> Result<PathBuf, UploadError> {
    let path = &package.archive;

    let not_found = || UploadError::ArchiveNotFound {
        package: package.name.clone(),
        path: path.clone(),
    };

    let metadata = std::fs::metadata(path).map_err(|_| not_found())?;

    if metadata.is_file() {
        return Ok(path.clone());
    }

    let archive = newest_archive(path).ok_or_else(not_found)?;

    tracing::debug!(
        package = %package.name,
        archive = %archive.display(),
        "resolved newest archive in directory"
    );

    Ok(archive)
}

fn newest_archive(dir: &Path) -> Option<PathBuf> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() || !is_archive(entry.path()) {
            continue;
        }

        let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
            continue;
        };

        if newest.as_ref().is_none_or(|(time, _)| modified > *time) {
            newest = Some((modified, entry.into_path()));
        }
    }

    newest.map(|(_, path)| path)
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}
