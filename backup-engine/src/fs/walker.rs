//! Directory traversal for backup sources.
//!
//! Collects every regular file under a root, in a stable order, with the
//! path relative to that root so it can be mirrored under a destination.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Information about a file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,

    /// File size in bytes
    pub size: u64,
}

impl FileInfo {
    /// Create FileInfo from a DirEntry.
    /// Symlinks are resolved; links to directories and broken links yield None.
    fn from_entry(entry: &DirEntry, root: &Path) -> std::io::Result<Option<Self>> {
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        let size = if entry.path_is_symlink() {
            match std::fs::metadata(&path) {
                Ok(resolved) if resolved.is_file() => resolved.len(),
                _ => return Ok(None),
            }
        } else {
            entry.metadata()?.len()
        };

        Ok(Some(Self {
            path,
            relative_path,
            size,
        }))
    }
}

/// Walk a directory tree and collect all files, sorted by name at each level.
///
/// Directory symlinks are not descended into.
pub fn walk_directory(root: &Path) -> crate::Result<Vec<FileInfo>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }

        if let Some(file_info) = FileInfo::from_entry(&entry, root)? {
            files.push(file_info);
        }
    }

    Ok(files)
}

/// Whether any file under `root` satisfies `predicate`. Stops at the first hit.
pub fn any_file<F>(root: &Path, mut predicate: F) -> bool
where
    F: FnMut(&Path) -> bool,
{
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .any(|e| predicate(e.path()))
}

/// Calculate total size of a set of files
pub fn total_size(files: &[FileInfo]) -> u64 {
    files.iter().map(|f| f.size).sum()
}
