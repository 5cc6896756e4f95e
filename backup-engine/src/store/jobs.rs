//! Persisted job records, one file per job.
//!
//! Three on-disk schemas are accepted: the current JSON record, the legacy
//! PascalCase JSON record and the legacy XML record. Each decodes into a
//! [`JobRecord`] variant and is normalized to [`BackupJob`] right after
//! parsing; only the current schema is ever written.

use crate::models::{BackupJob, BackupStatus, BackupType};
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SCHEMA_VERSION: u32 = 2;

/// Record file extensions in load order
const RECORD_EXTENSIONS: [&str; 2] = ["json", "xml"];

/// Record as written by this version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentRecord {
    pub schema_version: u32,
    pub name: String,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    #[serde(default)]
    pub backup_type: BackupType,
    #[serde(default)]
    pub status: BackupStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub total_file_size: u64,
}

/// Status as found in legacy records: a name or a numeric code
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LegacyStatus {
    Code(i64),
    Name(String),
}

impl LegacyStatus {
    fn into_status(self) -> BackupStatus {
        match self {
            LegacyStatus::Code(code) => BackupStatus::from_code(code),
            LegacyStatus::Name(name) => BackupStatus::from_name(&name),
        }
    }
}

/// Type as found in legacy records: the enum ordinal (`0` full, `1`
/// differential) or its name
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LegacyType {
    Code(i64),
    Name(String),
}

impl LegacyType {
    fn into_type(self) -> BackupType {
        match self {
            LegacyType::Code(code) => BackupType::from_code(code),
            LegacyType::Name(name) => legacy_type_name(&name),
        }
    }
}

fn legacy_type_name(name: &str) -> BackupType {
    match name.trim().parse::<i64>() {
        Ok(code) => BackupType::from_code(code),
        Err(_) => BackupType::parse(name).unwrap_or_default(),
    }
}

/// JSON record written by earlier releases (PascalCase fields)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LegacyRecord {
    pub name: String,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub destination_path: String,
    #[serde(default)]
    pub r#type: Option<LegacyType>,
    #[serde(default)]
    pub status: Option<LegacyStatus>,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub total_file_size: Option<i64>,
}

/// XML record written by earlier releases: one child element per field
/// under an arbitrary root element
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct XmlRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source_path: String,
    #[serde(default)]
    pub destination_path: String,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub r#type: Option<String>,
}

/// JSON schemas, tried newest first
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonRecord {
    Current(CurrentRecord),
    Legacy(LegacyRecord),
}

#[derive(Debug, Clone)]
pub enum JobRecord {
    Current(CurrentRecord),
    Legacy(LegacyRecord),
    Xml(XmlRecord),
}

impl JobRecord {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(match serde_json::from_str(content)? {
            JsonRecord::Current(r) => JobRecord::Current(r),
            JsonRecord::Legacy(r) => JobRecord::Legacy(r),
        })
    }

    pub fn from_xml(content: &str) -> Result<Self> {
        Ok(JobRecord::Xml(quick_xml::de::from_str(content)?))
    }

    pub fn into_job(self) -> BackupJob {
        match self {
            JobRecord::Current(r) => BackupJob {
                name: r.name,
                source_path: r.source_path,
                destination_path: r.destination_path,
                backup_type: r.backup_type,
                status: r.status,
                progress: r.progress.min(100),
                total_file_size: r.total_file_size,
            },
            JobRecord::Legacy(r) => BackupJob {
                name: r.name,
                source_path: PathBuf::from(r.source_path),
                destination_path: PathBuf::from(r.destination_path),
                backup_type: r.r#type.map(LegacyType::into_type).unwrap_or_default(),
                status: r.status.map(LegacyStatus::into_status).unwrap_or_default(),
                progress: r.progress.unwrap_or(0).clamp(0, 100) as u8,
                total_file_size: r.total_file_size.or(r.file_size).unwrap_or(0).max(0) as u64,
            },
            JobRecord::Xml(r) => BackupJob {
                name: r.name,
                source_path: PathBuf::from(r.source_path),
                destination_path: PathBuf::from(r.destination_path),
                backup_type: r.r#type.as_deref().map(legacy_type_name).unwrap_or_default(),
                status: r.status.as_deref().map(BackupStatus::from_name).unwrap_or_default(),
                progress: 0,
                total_file_size: r.file_size.unwrap_or(0).max(0) as u64,
            },
        }
    }
}

impl From<&BackupJob> for CurrentRecord {
    fn from(job: &BackupJob) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: job.name.clone(),
            source_path: job.source_path.clone(),
            destination_path: job.destination_path.clone(),
            backup_type: job.backup_type,
            status: job.status,
            progress: job.progress,
            total_file_size: job.total_file_size,
        }
    }
}

/// Directory of job records keyed by job name
pub struct JobStore {
    dir: PathBuf,
}

impl JobStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn record_path(&self, name: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", file_stem_for(name), extension))
    }

    /// Write (or rewrite) the record of `job`.
    pub fn save(&self, job: &BackupJob) -> Result<()> {
        let json = serde_json::to_string_pretty(&CurrentRecord::from(job))?;
        std::fs::write(self.record_path(&job.name, "json"), json)?;
        Ok(())
    }

    /// Delete the records of `name`, including a legacy XML one named after
    /// the job. Missing records are not an error.
    pub fn delete(&self, name: &str) -> Result<()> {
        for extension in RECORD_EXTENSIONS {
            match std::fs::remove_file(self.record_path(name, extension)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Load every readable record: JSON files first, then XML files, each
    /// group sorted by file name. Duplicate names keep the first record;
    /// unreadable files are logged and skipped.
    pub fn load_all(&self) -> Result<Vec<BackupJob>> {
        let mut paths: Vec<(usize, PathBuf)> = std::fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter_map(|p| {
                let rank = RECORD_EXTENSIONS
                    .iter()
                    .position(|ext| p.extension().is_some_and(|e| e == *ext))?;
                Some((rank, p))
            })
            .collect();
        paths.sort();

        let mut jobs: Vec<BackupJob> = Vec::new();
        for (_, path) in paths {
            match read_record(&path) {
                Ok(job) => {
                    if jobs.iter().any(|j| j.name == job.name) {
                        warn!("Duplicate job record {} ignored", path.display());
                    } else {
                        jobs.push(job);
                    }
                }
                Err(e) => warn!("Error loading job record {}: {}", path.display(), e),
            }
        }

        info!("Loaded {} job record(s) from {}", jobs.len(), self.dir.display());
        Ok(jobs)
    }
}

fn read_record(path: &Path) -> Result<BackupJob> {
    let content = std::fs::read_to_string(path)?;
    let record = if path.extension().is_some_and(|ext| ext == "xml") {
        JobRecord::from_xml(&content)?
    } else {
        JobRecord::from_json(&content)?
    };

    let job = record.into_job();
    if job.name.trim().is_empty() {
        return Err(EngineError::Validation("job record has no name".to_string()));
    }
    Ok(job)
}

/// Map a job name to a file stem without path separators.
fn file_stem_for(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_delete() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JobStore::open(dir.path().join("jobs"))?;

        let job = BackupJob::new("Docs", "/src/docs", "/dst/docs", BackupType::Differential);
        store.save(&job)?;
        assert_eq!(store.load_all()?, vec![job]);

        store.delete("Docs")?;
        assert!(store.load_all()?.is_empty());
        store.delete("Docs")?;
        Ok(())
    }

    #[test]
    fn test_legacy_record_is_normalized() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JobStore::open(dir.path())?;
        std::fs::write(
            dir.path().join("old.json"),
            r#"{
                "Name": "Old",
                "SourcePath": "~/Documents",
                "DestinationPath": "/mnt/backup",
                "Type": "DIFFERENTIAL",
                "Status": "ready",
                "FileSize": 2048,
                "IsPriority": true,
                "Files": []
            }"#,
        )?;
        std::fs::write(
            dir.path().join("older.json"),
            r#"{ "Name": "Older", "SourcePath": "/a", "DestinationPath": "/b", "Type": 0, "Status": 4 }"#,
        )?;

        let jobs = store.load_all()?;
        let old = jobs.iter().find(|j| j.name == "Old").expect("legacy job");
        assert_eq!(old.backup_type, BackupType::Differential);
        assert_eq!(old.status, BackupStatus::Pending);
        assert_eq!(old.total_file_size, 2048);
        assert_eq!(old.source_path, PathBuf::from("~/Documents"));

        let older = jobs.iter().find(|j| j.name == "Older").expect("numeric legacy job");
        assert_eq!(older.backup_type, BackupType::Full);
        assert_eq!(older.status, BackupStatus::Failed);
        Ok(())
    }

    #[test]
    fn test_record_with_numeric_type_loads() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JobStore::open(dir.path())?;
        // Layout of the records earlier releases wrote for every job
        std::fs::write(
            dir.path().join("Docs.json"),
            r#"{
  "Name": "Docs",
  "SourcePath": "/home/me/Docs",
  "DestinationPath": "/mnt/backup/Docs",
  "Type": 1,
  "Files": [],
  "Status": "Pending",
  "Progress": 0,
  "SourceFile": "Docs",
  "TargetFile": "Docs",
  "IsPriority": false,
  "FileSize": 0,
  "PriorityFileSize": 0,
  "TotalFileSize": 0
}"#,
        )?;

        let jobs = store.load_all()?;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "Docs");
        assert_eq!(jobs[0].backup_type, BackupType::Differential);
        assert_eq!(jobs[0].destination_path, PathBuf::from("/mnt/backup/Docs"));
        Ok(())
    }

    #[test]
    fn test_xml_record_loads() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JobStore::open(dir.path())?;
        std::fs::write(
            dir.path().join("Old.xml"),
            r#"<?xml version="1.0" encoding="utf-8"?>
<BackupJob>
  <Name>Old</Name>
  <SourcePath>/srv/data</SourcePath>
  <DestinationPath>/mnt/old</DestinationPath>
  <FileSize>512</FileSize>
  <Status>Completed</Status>
  <IsPriority>true</IsPriority>
  <Type>DIFFERENTIAL</Type>
</BackupJob>"#,
        )?;
        std::fs::write(
            dir.path().join("Bare.xml"),
            "<BackupJob><Name>Bare</Name><SourcePath>/a</SourcePath><DestinationPath>/b</DestinationPath></BackupJob>",
        )?;
        std::fs::write(dir.path().join("Broken.xml"), "<BackupJob><Name>Broken")?;

        let jobs = store.load_all()?;
        assert_eq!(jobs.len(), 2);

        let old = jobs.iter().find(|j| j.name == "Old").expect("xml job");
        assert_eq!(old.source_path, PathBuf::from("/srv/data"));
        assert_eq!(old.backup_type, BackupType::Differential);
        assert_eq!(old.status, BackupStatus::Completed);
        assert_eq!(old.total_file_size, 512);

        let bare = jobs.iter().find(|j| j.name == "Bare").expect("minimal xml job");
        assert_eq!(bare.backup_type, BackupType::Full);
        assert_eq!(bare.status, BackupStatus::Pending);
        Ok(())
    }

    #[test]
    fn test_json_record_wins_over_xml_duplicate() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JobStore::open(dir.path())?;
        store.save(&BackupJob::new("Same", "/json", "/d", BackupType::Full))?;
        std::fs::write(
            dir.path().join("Same.xml"),
            "<BackupJob><Name>Same</Name><SourcePath>/xml</SourcePath><DestinationPath>/d</DestinationPath></BackupJob>",
        )?;

        let jobs = store.load_all()?;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].source_path, PathBuf::from("/json"));

        store.delete("Same")?;
        assert!(store.load_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_corrupt_and_duplicate_records_skipped() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JobStore::open(dir.path())?;
        std::fs::write(dir.path().join("a.json"), r#"{"Name":"Same","SourcePath":"/1","DestinationPath":"/2"}"#)?;
        std::fs::write(dir.path().join("b.json"), r#"{"Name":"Same","SourcePath":"/3","DestinationPath":"/4"}"#)?;
        std::fs::write(dir.path().join("c.json"), "garbage")?;
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        let jobs = store.load_all()?;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].source_path, PathBuf::from("/1"));
        Ok(())
    }

    #[test]
    fn test_names_with_separators() -> Result<()> {
        let dir = TempDir::new()?;
        let store = JobStore::open(dir.path())?;
        let job = BackupJob::new("a/b", "/s", "/d", BackupType::Full);
        store.save(&job)?;
        assert!(dir.path().join("a_b.json").exists());
        assert_eq!(store.load_all()?[0].name, "a/b");
        Ok(())
    }
}
