//! Notifications raised by the orchestrator.

use crate::models::BackupStatus;
use std::fmt;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Progress and completion events, in emission order per job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupEvent {
    /// A file finished; `percent` is the job's new progress
    Progress { job: String, percent: u8 },

    /// Raised exactly once per job per `execute` call
    Completed {
        job: String,
        success: bool,
        error: Option<String>,
    },
}

/// Compact one-line form used on the remote console
impl fmt::Display for BackupEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress { job, percent } => write!(f, "Progress:{}:{}", job, percent),
            Self::Completed {
                job,
                success,
                error,
            } => write!(
                f,
                "Complete:{}:{}:{}",
                job,
                success,
                error.as_deref().unwrap_or("null")
            ),
        }
    }
}

/// Outcome of one job within an `execute` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub name: String,
    pub status: BackupStatus,
    pub progress: u8,
    pub error: Option<String>,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.status == BackupStatus::Completed
    }
}

/// Hand every event to `sink` until `done` fires, then flush what is still
/// queued. Events sent before `done` is cancelled all reach the sink unless
/// the receiver lagged.
pub async fn forward_events<F>(mut events: broadcast::Receiver<BackupEvent>, done: CancellationToken, mut sink: F)
where
    F: FnMut(BackupEvent),
{
    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Ok(event) => sink(event),
                Err(RecvError::Lagged(skipped)) => warn!("Event listener lagged, {} event(s) skipped", skipped),
                Err(RecvError::Closed) => return,
            },
            _ = done.cancelled() => break,
        }
    }

    loop {
        match events.try_recv() {
            Ok(event) => sink(event),
            Err(TryRecvError::Lagged(skipped)) => warn!("Event listener lagged, {} event(s) skipped", skipped),
            Err(TryRecvError::Empty | TryRecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forward_flushes_queued_events_after_done() {
        let (tx, rx) = broadcast::channel(16);
        for percent in [50, 100] {
            tx.send(BackupEvent::Progress {
                job: "J1".to_string(),
                percent,
            })
            .expect("send");
        }
        tx.send(BackupEvent::Completed {
            job: "J1".to_string(),
            success: true,
            error: None,
        })
        .expect("send");

        // The run is over before the listener gets scheduled
        let done = CancellationToken::new();
        done.cancel();

        let mut lines = Vec::new();
        forward_events(rx, done, |event| lines.push(event.to_string())).await;
        assert_eq!(lines, vec!["Progress:J1:50", "Progress:J1:100", "Complete:J1:true:null"]);
        drop(tx);
    }

    #[test]
    fn test_wire_lines() {
        let progress = BackupEvent::Progress {
            job: "J1".to_string(),
            percent: 33,
        };
        assert_eq!(progress.to_string(), "Progress:J1:33");

        let done = BackupEvent::Completed {
            job: "J1".to_string(),
            success: true,
            error: None,
        };
        assert_eq!(done.to_string(), "Complete:J1:true:null");

        let failed = BackupEvent::Completed {
            job: "J2".to_string(),
            success: false,
            error: Some("Source directory not found".to_string()),
        };
        assert_eq!(failed.to_string(), "Complete:J2:false:Source directory not found");
    }
}
