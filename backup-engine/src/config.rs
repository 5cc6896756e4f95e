//! Configuration management for the backup engine.
//!
//! Loads configuration from a TOML file. Every field has a default, so a
//! partial file (or no file at all) yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub remote: RemoteConfig,
    pub log: LogConfig,
    pub backup: BackupSettings,
    pub encryption: EncryptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory for job records, state and transfer logs
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Address the remote console listens on
    pub bind: String,

    /// Remote console TCP port
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// Transfer log serialization selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON document (array of records) per day
    #[default]
    Json,
    /// One JSON record per line, one file per day
    Jsonl,
}

/// Settings consumed by the backup core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    pub log_format: LogFormat,

    /// Process names (case-insensitive substrings) that block backups
    pub business_software: Vec<String>,

    /// Extensions that make a job run before the others
    pub priority_extensions: Vec<String>,

    /// Extensions whose files go through the encryption coordinator
    pub encrypt_extensions: Vec<String>,

    /// Not used by execution; jobs always run one at a time
    pub max_parallel_jobs: usize,

    /// Not used by execution
    pub large_file_threshold: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// External encryption executable, invoked as `tool <source> <target>`
    pub tool: Option<PathBuf>,

    /// Lock file shared by every process driving the external tool
    pub lock_path: PathBuf,

    /// Upper bound on waiting for the cross-process lock
    pub lock_timeout_secs: u64,

    /// Mask of the built-in fallback cipher
    pub xor_mask: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5001,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            business_software: Vec::new(),
            priority_extensions: Vec::new(),
            encrypt_extensions: Vec::new(),
            max_parallel_jobs: 5,
            large_file_threshold: 1024 * 1024, // 1MB
        }
    }
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            tool: None,
            lock_path: std::env::temp_dir().join("backup-engine-encryptor.lock"),
            lock_timeout_secs: 30,
            xor_mask: 0xFF,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("backup-engine"))
        .unwrap_or_else(|| PathBuf::from("./backup-engine-data"))
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Normalize an extension for comparison: no leading dot, lowercase.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Whether `path` has an extension contained in `extensions` (dot and case insensitive).
pub fn has_listed_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = normalize_extension(ext);
    !ext.is_empty() && extensions.iter().any(|e| normalize_extension(e) == ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [backup]
            encrypt_extensions = [".txt"]
            log_format = "jsonl"
            "#,
        )
        .unwrap();

        assert_eq!(config.remote.port, 5001);
        assert_eq!(config.encryption.lock_timeout_secs, 30);
        assert_eq!(config.backup.log_format, LogFormat::Jsonl);
        assert_eq!(config.backup.encrypt_extensions, vec![".txt".to_string()]);
        assert_eq!(config.backup.max_parallel_jobs, 5);
    }

    #[test]
    fn test_extension_matching() {
        let list = vec![".DOCX".to_string(), "pdf".to_string()];
        assert!(has_listed_extension(Path::new("/a/report.docx"), &list));
        assert!(has_listed_extension(Path::new("b.PDF"), &list));
        assert!(!has_listed_extension(Path::new("c.txt"), &list));
        assert!(!has_listed_extension(Path::new("Makefile"), &list));
    }
}
