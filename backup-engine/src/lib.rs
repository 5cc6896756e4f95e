//! Backup Engine Library
//!
//! Sequential backup jobs with integrity hashing, a business-software guard,
//! encryption hand-off to an external tool and a line-protocol remote console.

pub mod config;
pub mod crypto;
pub mod daemon;
pub mod executor;
pub mod fs;
pub mod guard;
pub mod journal;
pub mod models;
pub mod remote;
pub mod store;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::{BackupEvent, BackupOrchestrator};
pub use utils::errors::{EngineError, Result};
