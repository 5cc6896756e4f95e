//! System-wide mutual exclusion backed by an advisory file lock.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::{EngineError, Result};

const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// A named lock shared by every process that opens the same path
#[derive(Debug, Clone)]
pub struct NamedLock {
    path: PathBuf,
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct NamedLockGuard {
    file: File,
}

impl NamedLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Wait up to `timeout` for exclusive ownership.
    pub async fn acquire(&self, timeout: Duration) -> Result<NamedLockGuard> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(NamedLockGuard { file }),
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Err(EngineError::LockTimeout(timeout));
                    }
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for NamedLockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
