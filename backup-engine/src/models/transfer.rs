//! One record per file-copy attempt, appended to the transfer log.

use super::job::BackupType;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Success,
    Failed,
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::Failed => f.write_str("Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInfo {
    pub timestamp: DateTime<Local>,
    /// Job name
    pub name: String,
    pub source_file: String,
    pub target_file: String,
    pub file_size: u64,
    /// Milliseconds
    pub transfer_time: u64,
    /// Milliseconds, zero when the file was not encrypted
    pub crypt_time: u64,
    pub backup_type: BackupType,
    pub status: TransferStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub source_file_hash: Option<String>,
    #[serde(default)]
    pub target_file_hash: Option<String>,
}

impl TransferInfo {
    #[allow(clippy::too_many_arguments)]
    pub fn success(
        job: &str,
        backup_type: BackupType,
        source: &Path,
        target: &Path,
        file_size: u64,
        transfer_time: Duration,
        crypt_time: Duration,
        hashes: (String, String),
    ) -> Self {
        Self {
            timestamp: Local::now(),
            name: job.to_string(),
            source_file: source.display().to_string(),
            target_file: target.display().to_string(),
            file_size,
            transfer_time: transfer_time.as_millis() as u64,
            crypt_time: crypt_time.as_millis() as u64,
            backup_type,
            status: TransferStatus::Success,
            message: None,
            source_file_hash: Some(hashes.0),
            target_file_hash: Some(hashes.1),
        }
    }

    pub fn failure(
        job: &str,
        backup_type: BackupType,
        source: &Path,
        target: &Path,
        file_size: u64,
        message: impl Into<String>,
        source_file_hash: Option<String>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            name: job.to_string(),
            source_file: source.display().to_string(),
            target_file: target.display().to_string(),
            file_size,
            transfer_time: 0,
            crypt_time: 0,
            backup_type,
            status: TransferStatus::Failed,
            message: Some(message.into()),
            source_file_hash,
            target_file_hash: None,
        }
    }
}
