//! Per-day JSON Lines file: `YYYY-MM-DD.jsonl`, one record per line.

use super::{dated_units, remove_units, unit_path, TransferLog};
use crate::models::TransferInfo;
use crate::Result;
use chrono::NaiveDate;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const EXTENSION: &str = "jsonl";

pub struct JsonLinesDayLog {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesDayLog {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }
}

/// Parse every readable line; corrupt lines are skipped.
fn read_lines(path: &Path) -> std::io::Result<Vec<TransferInfo>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Skipping corrupt line in {}: {}", path.display(), e);
                None
            }
        })
        .collect())
}

impl TransferLog for JsonLinesDayLog {
    fn record_transfer(&self, record: &TransferInfo) -> Result<()> {
        let path = unit_path(&self.dir, record.timestamp.date_naive(), EXTENSION);
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn list_available_dates(&self) -> Vec<NaiveDate> {
        dated_units(&self.dir, EXTENSION)
            .into_iter()
            .filter(|(_, path)| read_lines(path).is_ok_and(|records| !records.is_empty()))
            .map(|(date, _)| date)
            .collect()
    }

    fn read_records(&self, date: NaiveDate) -> Vec<TransferInfo> {
        let path = unit_path(&self.dir, date, EXTENSION);
        if !path.exists() {
            return Vec::new();
        }
        read_lines(&path).unwrap_or_else(|e| {
            warn!("Error reading log file {}: {}", path.display(), e);
            Vec::new()
        })
    }

    fn clear_all(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        remove_units(&self.dir, EXTENSION);
    }
}
