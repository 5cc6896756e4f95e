//! Graceful shutdown handling for SIGTERM and SIGINT.
//!
//! On a signal the shared token is cancelled (remote console and client
//! sessions wind down) and every in-flight backup is asked to stop at its
//! next file boundary.

use crate::executor::BackupOrchestrator;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Shutdown coordinator
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token cancelled once shutdown begins
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for SIGINT or SIGTERM, or for shutdown to be triggered elsewhere.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = self.token.cancelled() => {}
        }
    }

    /// Cancel the shared token and stop every running or queued backup.
    pub fn shutdown(&self, orchestrator: &BackupOrchestrator) {
        info!("Graceful shutdown initiated");
        self.token.cancel();
        let stopped = orchestrator.stop_all();
        info!("Graceful shutdown complete ({} execution batch(es) stopped)", stopped);
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EngineConfig};
    use crate::guard::BusinessGuard;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_shutdown_cancels_token() -> crate::Result<()> {
        let dir = TempDir::new()?;
        let config = Config {
            engine: EngineConfig {
                data_dir: dir.path().to_path_buf(),
            },
            ..Config::default()
        };
        let orchestrator = BackupOrchestrator::from_config(&config, Arc::new(BusinessGuard::new(vec![])))?;

        let coordinator = ShutdownCoordinator::new();
        let token = coordinator.token();
        let handle = tokio::spawn(async move {
            token.cancelled().await;
        });

        coordinator.shutdown(&orchestrator);
        handle.await.expect("waiter task");

        // An already-cancelled token returns immediately
        coordinator.wait_for_signal().await;
        assert!(dir.path().join("state/state.json").exists());
        assert!(dir.path().join("jobs").is_dir());
        assert!(dir.path().join("logs/daily").is_dir());
        Ok(())
    }
}
