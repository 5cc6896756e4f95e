//! Structured transfer log.
//!
//! One log unit per calendar day. The orchestrator only sees the
//! [`TransferLog`] contract; the concrete writer is picked from the
//! configured [`LogFormat`].

pub mod json;
pub mod jsonl;

#[cfg(test)]
pub mod memory;

use crate::config::LogFormat;
use crate::models::TransferInfo;
use crate::Result;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

pub use json::JsonDayLog;
pub use jsonl::JsonLinesDayLog;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Append-only, per-day record of file transfers
pub trait TransferLog: Send + Sync {
    /// Append `record` to the unit of its timestamp's day.
    fn record_transfer(&self, record: &TransferInfo) -> Result<()>;

    /// Days holding at least one readable record, newest first.
    fn list_available_dates(&self) -> Vec<NaiveDate>;

    /// Records of `date`; empty when the unit is absent or unreadable.
    fn read_records(&self, date: NaiveDate) -> Vec<TransferInfo>;

    /// Delete every log unit. Per-file failures are logged and skipped.
    fn clear_all(&self);
}

/// Open the writer selected by `format` under `dir`.
pub fn open_transfer_log(format: LogFormat, dir: impl Into<PathBuf>) -> Result<Arc<dyn TransferLog>> {
    let dir = dir.into();
    Ok(match format {
        LogFormat::Json => Arc::new(JsonDayLog::open(dir)?),
        LogFormat::Jsonl => Arc::new(JsonLinesDayLog::open(dir)?),
    })
}

fn unit_path(dir: &Path, date: NaiveDate, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", date.format(DATE_FORMAT), extension))
}

/// Dated units in `dir` with the given extension, newest first.
fn dated_units(dir: &Path, extension: &str) -> Vec<(NaiveDate, PathBuf)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list log directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut units: Vec<(NaiveDate, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == extension))
        .filter_map(|p| {
            let stem = p.file_stem()?.to_str()?;
            let date = NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()?;
            Some((date, p))
        })
        .collect();
    units.sort_by(|a, b| b.0.cmp(&a.0));
    units
}

fn remove_units(dir: &Path, extension: &str) {
    for (_, path) in dated_units(dir, extension) {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("Error deleting log file {}: {}", path.display(), e);
        }
    }
}
