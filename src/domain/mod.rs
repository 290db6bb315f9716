//! Core domain models for depflow
//!
//! This module contains the fundamental types used throughout the application:
//! - Dependency information and dependency roles
//! - Discovered manifests
//! - Proposed updates, update plans and apply outcomes

mod dependency;
mod manifest;
mod update;

pub use dependency::{Dependency, DependencyType};
pub use manifest::Manifest;
pub use update::{ApplyResult, Impact, PlanStrategy, Update, UpdatePlan};
