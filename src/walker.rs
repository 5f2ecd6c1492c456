use crate::error::AppError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists every file under `root` whose lowercased extension is in `allowed_extensions`.
///
/// Entries come back sorted by file name within each directory, so a rescan of an
/// unchanged tree yields the same order. A symlink to a file counts as that file;
/// symlinked directories are not descended into. Unreadable entries are logged
/// and skipped.
pub fn discover_images(
    root: &Path,
    allowed_extensions: &HashSet<String>,
) -> Result<Vec<PathBuf>, AppError> {
    if !root.exists() {
        return Err(AppError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(AppError::NotADirectory(root.to_path_buf()));
    }

    log::info!("Starting file discovery in {}", root.display());
    log::debug!("Configured allowed extensions: {:?}", allowed_extensions);

    let mut images = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            log::trace!("Skipping non-file entry: {:?}", entry.path());
            continue;
        }

        let path = entry.path();
        if has_allowed_extension(path, allowed_extensions) {
            log::trace!("Discovered image file: {:?}", path);
            images.push(path.to_path_buf());
        } else {
            log::trace!("Skipping file due to unsupported extension: {:?}", path);
        }
    }

    log::info!("Discovered {} image files", images.len());
    Ok(images)
}

fn has_allowed_extension(path: &Path, allowed_extensions: &HashSet<String>) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| allowed_extensions.contains(&ext.to_lowercase()))
        .unwrap_or(false)
}
