//! Version resolution
//!
//! This module provides:
//! - Lenient semantic version parsing, comparison and impact classification
//! - Manifest constraint parsing (`~>`, `^`, `~`, `>=`, `>`, `=`)
//! - PlanContext, merging CLI flags and integration policy
//! - Target version selection honoring all of the above

mod constraint;
mod context;
mod select;
mod version;

pub use constraint::{parse_constraint, ConstraintKind, ParsedConstraint};
pub use context::{CliFlags, PlanContext};
pub use select::{select_version_with_context, SelectedVersion};
pub use version::{
    compare_versions, determine_impact, is_valid_semver, parse_lenient, strip_constraint_prefix,
};
