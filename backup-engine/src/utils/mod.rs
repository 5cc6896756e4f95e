//! Utility modules for the backup engine.

pub mod errors;
pub mod logger;
pub mod selection;

pub use errors::{EngineError, Result};
