//! Durable stores: job records and the job state document.

pub mod jobs;
pub mod state;

pub use jobs::JobStore;
pub use state::JobStateStore;
