//! Per-job progress snapshot persisted by the state store.

use super::job::BackupStatus;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Latest known progress of one job. Overwritten on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    #[serde(rename = "name")]
    pub job_name: String,
    pub total_files: u64,
    pub total_size: u64,
    pub files_processed: u64,
    pub size_processed: u64,
    pub status: BackupStatus,
    pub progress: u8,
    pub message: String,
    pub last_update: DateTime<Local>,
}

impl JobState {
    pub fn new(job_name: impl Into<String>, status: BackupStatus, progress: u8, message: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            total_files: 0,
            total_size: 0,
            files_processed: 0,
            size_processed: 0,
            status,
            progress,
            message: message.into(),
            last_update: Local::now(),
        }
    }
}
