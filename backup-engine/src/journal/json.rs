//! Per-day JSON document: `YYYY-MM-DD.json` holding an array of records.

use super::{dated_units, remove_units, unit_path, TransferLog};
use crate::models::TransferInfo;
use crate::Result;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, warn};

const EXTENSION: &str = "json";

pub struct JsonDayLog {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonDayLog {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }
}

fn read_document(path: &Path) -> Result<Vec<TransferInfo>> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}

impl TransferLog for JsonDayLog {
    fn record_transfer(&self, record: &TransferInfo) -> Result<()> {
        let path = unit_path(&self.dir, record.timestamp.date_naive(), EXTENSION);
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());

        let mut records = if path.exists() {
            read_document(&path).inspect_err(|e| {
                error!("Error reading JSON log file {}: {}", path.display(), e);
            })?
        } else {
            Vec::new()
        };
        records.push(record.clone());

        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(&path, json).inspect_err(|e| {
            error!("Error writing JSON log file {}: {}", path.display(), e);
        })?;
        Ok(())
    }

    fn list_available_dates(&self) -> Vec<NaiveDate> {
        dated_units(&self.dir, EXTENSION)
            .into_iter()
            .filter(|(_, path)| read_document(path).is_ok_and(|records| !records.is_empty()))
            .map(|(date, _)| date)
            .collect()
    }

    fn read_records(&self, date: NaiveDate) -> Vec<TransferInfo> {
        let path = unit_path(&self.dir, date, EXTENSION);
        if !path.exists() {
            return Vec::new();
        }
        read_document(&path).unwrap_or_else(|e| {
            warn!("Error reading JSON log file {}: {}", path.display(), e);
            Vec::new()
        })
    }

    fn clear_all(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        remove_units(&self.dir, EXTENSION);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackupType;
    use chrono::{Local, TimeZone};
    use std::time::Duration;
    use tempfile::TempDir;

    fn record_on(day: u32, job: &str) -> TransferInfo {
        let mut record = TransferInfo::success(
            job,
            BackupType::Full,
            Path::new("/src/a.txt"),
            Path::new("/dst/a.txt"),
            10,
            Duration::from_millis(3),
            Duration::ZERO,
            ("abc".to_string(), "abc".to_string()),
        );
        record.timestamp = Local
            .with_ymd_and_hms(2024, 3, day, 12, 0, 0)
            .single()
            .expect("valid local time");
        record
    }

    #[test]
    fn test_append_and_read_back() -> Result<()> {
        let dir = TempDir::new()?;
        let log = JsonDayLog::open(dir.path())?;

        log.record_transfer(&record_on(5, "J1"))?;
        log.record_transfer(&record_on(5, "J2"))?;

        let date = NaiveDate::from_ymd_opt(2024, 3, 5).expect("date");
        let records = log.read_records(date);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "J1");
        assert_eq!(records[1].name, "J2");
        assert!(dir.path().join("2024-03-05.json").exists());
        Ok(())
    }

    #[test]
    fn test_dates_newest_first_skipping_corrupt_units() -> Result<()> {
        let dir = TempDir::new()?;
        let log = JsonDayLog::open(dir.path())?;
        log.record_transfer(&record_on(1, "J1"))?;
        log.record_transfer(&record_on(9, "J1"))?;
        std::fs::write(dir.path().join("2024-03-04.json"), "[oops")?;
        std::fs::write(dir.path().join("2024-03-06.json"), "[]")?;
        std::fs::write(dir.path().join("notes.json"), "[]")?;

        let dates = log.list_available_dates();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 9).expect("date"),
                NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"),
            ]
        );
        assert!(log.read_records(NaiveDate::from_ymd_opt(2024, 3, 4).expect("date")).is_empty());
        assert!(log.read_records(NaiveDate::from_ymd_opt(2020, 1, 1).expect("date")).is_empty());
        Ok(())
    }

    #[test]
    fn test_clear_all() -> Result<()> {
        let dir = TempDir::new()?;
        let log = JsonDayLog::open(dir.path())?;
        log.record_transfer(&record_on(1, "J1"))?;
        log.record_transfer(&record_on(2, "J1"))?;

        log.clear_all();
        assert!(log.list_available_dates().is_empty());
        Ok(())
    }
}
