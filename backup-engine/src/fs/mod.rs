//! Filesystem helpers: traversal, path handling, digests and change stamps.

pub mod digest;
pub mod metadata;
pub mod paths;
pub mod walker;
