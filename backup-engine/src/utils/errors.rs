//! Custom error types for the backup engine.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid job: {0}")]
    Validation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Timed out after {0:?} waiting for the encryption lock")]
    LockTimeout(Duration),

    #[error("Job not found: {0}")]
    JobNotFound(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
