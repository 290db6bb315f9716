//! Update post-processing
//!
//! This module provides:
//! - Allow/ignore rules and release cooldowns
//! - Dependency grouping
//! - Commit message formatting
//! - Versioning strategy decisions (what to write into the manifest)

mod commit;
mod filter;

pub use filter::{UpdateFilter, DEFAULT_LABELS, DEFAULT_OPEN_PULL_REQUESTS_LIMIT};
