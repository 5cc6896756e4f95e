//! Encryption coordinator.
//!
//! Hands files to an external encryption executable under a system-wide lock.
//! Whenever the tool is unavailable or fails, the built-in fallback cipher
//! produces the target instead, so encryption never fails a job on its own.

pub mod cipher;
pub mod lock;

use crate::config::EncryptionConfig;
use crate::{EngineError, Result};
use lock::NamedLock;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Which path produced the encrypted target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMethod {
    ExternalTool,
    Fallback,
}

#[derive(Debug, Clone, Copy)]
pub struct EncryptionOutcome {
    pub method: EncryptionMethod,
    pub elapsed: Duration,
}

/// Clears the in-process busy flag on drop
struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    fn try_set(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for BusyFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct EncryptionCoordinator {
    tool: Option<PathBuf>,
    lock: NamedLock,
    lock_timeout: Duration,
    mask: u8,
    /// Shared by every clone: one external invocation per process at a time
    busy: Arc<AtomicBool>,
}

impl EncryptionCoordinator {
    pub fn new(config: &EncryptionConfig) -> Self {
        Self {
            tool: config.tool.clone(),
            lock: NamedLock::new(config.lock_path.clone()),
            lock_timeout: Duration::from_secs(config.lock_timeout_secs),
            mask: config.xor_mask,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// No usable external tool: every call goes straight to the fallback cipher.
    pub fn is_fallback_platform(&self) -> bool {
        !self.tool.as_deref().is_some_and(Path::is_file)
    }

    /// Encrypt `source` into `target`.
    ///
    /// Errors only when the fallback cipher itself cannot read or write.
    pub async fn encrypt(&self, source: &Path, target: &Path) -> Result<EncryptionOutcome> {
        let start = Instant::now();

        if !self.is_fallback_platform() {
            match self.run_external(source, target).await {
                Ok(()) => {
                    return Ok(EncryptionOutcome {
                        method: EncryptionMethod::ExternalTool,
                        elapsed: start.elapsed(),
                    })
                }
                Err(e) => {
                    warn!("External encryption failed for {}, using fallback cipher: {}", source.display(), e);
                }
            }
        }

        cipher::apply_fallback_cipher(source, target, self.mask).await?;
        Ok(EncryptionOutcome {
            method: EncryptionMethod::Fallback,
            elapsed: start.elapsed(),
        })
    }

    async fn run_external(&self, source: &Path, target: &Path) -> Result<()> {
        let Some(tool) = self.tool.as_deref() else {
            return Err(EngineError::Encryption("no external tool configured".to_string()));
        };

        // Both guards release on every exit path below
        let _lock = self.lock.acquire(self.lock_timeout).await?;
        let _busy = BusyFlag::try_set(&self.busy).ok_or_else(|| {
            EngineError::Encryption("encryption tool already running in this process".to_string())
        })?;

        debug!("Running {} {} {}", tool.display(), source.display(), target.display());
        let status = tokio::process::Command::new(tool)
            .arg(source)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(EngineError::Encryption(format!("encryption tool exited with {}", status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &Path, tool: Option<&str>) -> EncryptionConfig {
        EncryptionConfig {
            tool: tool.map(PathBuf::from),
            lock_path: dir.join("tool.lock"),
            lock_timeout_secs: 1,
            xor_mask: 0xFF,
        }
    }

    #[tokio::test]
    async fn test_without_tool_uses_fallback() -> Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("s.txt");
        let target = dir.path().join("t.txt");
        std::fs::write(&source, b"secret")?;

        let coordinator = EncryptionCoordinator::new(&config(dir.path(), None));
        assert!(coordinator.is_fallback_platform());

        let outcome = coordinator.encrypt(&source, &target).await?;
        assert_eq!(outcome.method, EncryptionMethod::Fallback);

        let mut sealed = std::fs::read(&target)?;
        assert_ne!(sealed, b"secret");
        cipher::xor_in_place(&mut sealed, coordinator.mask());
        assert_eq!(sealed, b"secret");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_tool_path_is_fallback_platform() -> Result<()> {
        let dir = TempDir::new()?;
        let coordinator = EncryptionCoordinator::new(&config(dir.path(), Some("/nonexistent/encryptor")));
        assert!(coordinator.is_fallback_platform());
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_external_tool_success() -> Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("s.txt");
        let target = dir.path().join("t.txt");
        std::fs::write(&source, b"payload")?;

        // `cp src dst` stands in for an encryptor with the same calling convention
        let coordinator = EncryptionCoordinator::new(&config(dir.path(), Some("/bin/cp")));
        let outcome = coordinator.encrypt(&source, &target).await?;
        assert_eq!(outcome.method, EncryptionMethod::ExternalTool);
        assert_eq!(std::fs::read(&target)?, b"payload");
        assert!(!coordinator.busy.load(Ordering::Acquire));
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool_falls_back() -> Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("s.txt");
        let target = dir.path().join("t.txt");
        std::fs::write(&source, b"payload")?;

        let coordinator = EncryptionCoordinator::new(&config(dir.path(), Some("/bin/false")));
        let outcome = coordinator.encrypt(&source, &target).await?;
        assert_eq!(outcome.method, EncryptionMethod::Fallback);

        let mut sealed = std::fs::read(&target)?;
        cipher::xor_in_place(&mut sealed, 0xFF);
        assert_eq!(sealed, b"payload");
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lock_timeout_falls_back() -> Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("s.txt");
        let target = dir.path().join("t.txt");
        std::fs::write(&source, b"payload")?;

        let cfg = config(dir.path(), Some("/bin/cp"));
        let _held = NamedLock::new(cfg.lock_path.clone()).acquire(Duration::from_secs(1)).await?;

        let coordinator = EncryptionCoordinator::new(&cfg);
        let outcome = coordinator.encrypt(&source, &target).await?;
        assert_eq!(outcome.method, EncryptionMethod::Fallback);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_busy_flag_forces_fallback() -> Result<()> {
        let dir = TempDir::new()?;
        let source = dir.path().join("s.txt");
        let target = dir.path().join("t.txt");
        std::fs::write(&source, b"payload")?;

        let coordinator = EncryptionCoordinator::new(&config(dir.path(), Some("/bin/cp")));
        let held = BusyFlag::try_set(&coordinator.busy).expect("flag free");
        let outcome = coordinator.encrypt(&source, &target).await?;
        assert_eq!(outcome.method, EncryptionMethod::Fallback);

        drop(held);
        let outcome = coordinator.encrypt(&source, &target).await?;
        assert_eq!(outcome.method, EncryptionMethod::ExternalTool);
        Ok(())
    }
}
