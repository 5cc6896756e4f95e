//! In-memory transfer log for tests.

use super::TransferLog;
use crate::models::TransferInfo;
use crate::Result;
use chrono::NaiveDate;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryLog {
    records: Mutex<Vec<TransferInfo>>,
}

impl MemoryLog {
    pub fn records(&self) -> Vec<TransferInfo> {
        self.records.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl TransferLog for MemoryLog {
    fn record_transfer(&self, record: &TransferInfo) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(record.clone());
        Ok(())
    }

    fn list_available_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .records()
            .iter()
            .map(|r| r.timestamp.date_naive())
            .collect();
        dates.sort_by(|a, b| b.cmp(a));
        dates.dedup();
        dates
    }

    fn read_records(&self, date: NaiveDate) -> Vec<TransferInfo> {
        self.records()
            .into_iter()
            .filter(|r| r.timestamp.date_naive() == date)
            .collect()
    }

    fn clear_all(&self) {
        self.records.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}
