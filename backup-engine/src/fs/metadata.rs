//! Size and modification-time stamps used by differential backups.

use filetime::FileTime;
use std::fs;
use std::path::Path;

/// The part of a file's metadata that decides whether it changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub size: u64,
    pub modified: FileTime,
}

impl FileStamp {
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            size: metadata.len(),
            modified: FileTime::from_last_modification_time(&metadata),
        })
    }
}

/// True when `target` exists and carries the same size and mtime as `source`.
pub fn is_unchanged(source: &Path, target: &Path) -> bool {
    match (FileStamp::from_path(source), FileStamp::from_path(target)) {
        (Ok(src), Ok(dst)) => src == dst,
        _ => false,
    }
}

/// Give `target` the modification time of `source`.
pub fn copy_mtime(source: &Path, target: &Path) -> std::io::Result<()> {
    let stamp = FileStamp::from_path(source)?;
    filetime::set_file_mtime(target, stamp.modified)
}
