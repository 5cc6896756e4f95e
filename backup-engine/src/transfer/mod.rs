//! Transfer bookkeeping shared by the orchestrator and its front ends.

pub mod progress;
