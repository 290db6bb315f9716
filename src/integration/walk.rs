//! Repository walker shared by every integration's detect step

use crate::error::IntegrationError;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Metadata key holding the manifest path relative to the repository root
pub const RELATIVE_PATH_KEY: &str = "relative_path";

/// Directories never descended into
pub const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "vendor", "target", ".venv", "dist"];

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Collect files below `root` whose file name satisfies `accept`
///
/// Returns `(absolute path, repo-relative path)` pairs sorted by path.
pub fn walk_manifests<F>(root: &Path, accept: F) -> Result<Vec<(PathBuf, PathBuf)>, IntegrationError>
where
    F: Fn(&str) -> bool,
{
    if !root.is_dir() {
        return Err(IntegrationError::read_error(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // Unreadable subdirectories are skipped, not fatal
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !accept(name) {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| entry.path().to_path_buf());
        found.push((root.join(&relative), relative));
    }

    found.sort();
    Ok(found)
}
