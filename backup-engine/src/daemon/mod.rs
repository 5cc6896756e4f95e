//! Long-running service plumbing.

pub mod shutdown;
