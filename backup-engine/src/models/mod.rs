//! Domain types shared by the engine, the stores and the remote console.

pub mod job;
pub mod state;
pub mod transfer;

pub use job::{BackupJob, BackupStatus, BackupType};
pub use state::JobState;
pub use transfer::{TransferInfo, TransferStatus};
