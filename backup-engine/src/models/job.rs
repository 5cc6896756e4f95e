//! Backup job definition and its lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How a job decides which files to transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackupType {
    /// Every file under the source is transferred
    #[default]
    Full,
    /// Files whose target already matches (size + mtime) are skipped
    Differential,
}

impl BackupType {
    /// Parse a type name, case-insensitively (`full`, `FULL`, `Differential`, ...)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "full" => Some(Self::Full),
            "differential" => Some(Self::Differential),
            _ => None,
        }
    }

    /// Enum ordinal used by legacy records. Unknown codes map to `Full`.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Differential,
            _ => Self::Full,
        }
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "Full"),
            Self::Differential => write!(f, "Differential"),
        }
    }
}

/// Job state machine: `Pending -> Running -> {Completed, Failed, Stopped, Cancelled}`.
///
/// `Paused` is declared for record compatibility only; no control flow reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackupStatus {
    #[default]
    Pending,
    Running,
    Paused,
    Completed,
    Stopped,
    Failed,
    Cancelled,
}

impl BackupStatus {
    /// Lenient name lookup used for legacy records. Unknown names map to `Pending`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "running" => Self::Running,
            "paused" => Self::Paused,
            "completed" => Self::Completed,
            "stopped" => Self::Stopped,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            // "ready" was the pre-Pending spelling
            _ => Self::Pending,
        }
    }

    /// Numeric codes written by the oldest records.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Stopped,
            4 => Self::Failed,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Paused => "Paused",
            Self::Completed => "Completed",
            Self::Stopped => "Stopped",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// A named source -> destination backup configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJob {
    /// Unique, case-sensitive identity
    pub name: String,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub backup_type: BackupType,
    pub status: BackupStatus,

    /// 0-100, monotonic within one execution
    pub progress: u8,

    /// Bytes under the source at the last execution (reporting only)
    pub total_file_size: u64,
}

impl BackupJob {
    pub fn new(
        name: impl Into<String>,
        source_path: impl Into<PathBuf>,
        destination_path: impl Into<PathBuf>,
        backup_type: BackupType,
    ) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
            destination_path: destination_path.into(),
            backup_type,
            status: BackupStatus::Pending,
            progress: 0,
            total_file_size: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = BackupJob::new("J1", "/src", "/dst", BackupType::Full);
        assert_eq!(job.status, BackupStatus::Pending);
        assert_eq!(job.progress, 0);
    }

    #[test]
    fn test_legacy_status_lookup() {
        assert_eq!(BackupStatus::from_name("READY"), BackupStatus::Pending);
        assert_eq!(BackupStatus::from_name("completed"), BackupStatus::Completed);
        assert_eq!(BackupStatus::from_name("whatever"), BackupStatus::Pending);
        assert_eq!(BackupStatus::from_code(4), BackupStatus::Failed);
        assert_eq!(BackupStatus::from_code(42), BackupStatus::Pending);
    }

    #[test]
    fn test_backup_type_parse() {
        assert_eq!(BackupType::parse("FULL"), Some(BackupType::Full));
        assert_eq!(BackupType::parse("differential"), Some(BackupType::Differential));
        assert_eq!(BackupType::parse("incremental"), None);
        assert_eq!(BackupType::from_code(1), BackupType::Differential);
        assert_eq!(BackupType::from_code(0), BackupType::Full);
    }
}
