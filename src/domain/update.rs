//! Proposed updates, plans and apply outcomes

use super::{Dependency, Manifest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Semantic-versioning severity of an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    /// No change
    None,
    /// Patch bump (also used for pre-release/build-only changes)
    Patch,
    /// Minor bump
    Minor,
    /// Major bump
    Major,
}

impl Impact {
    /// Returns the lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::None => "none",
            Impact::Patch => "patch",
            Impact::Minor => "minor",
            Impact::Major => "major",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A proposed version change for one dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// The dependency being updated
    pub dependency: Dependency,
    /// Version to move to
    pub target_version: String,
    /// Severity of the change
    pub impact: Impact,
    /// Link to release notes, when the datasource knows one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog_url: Option<String>,
    /// Whether the change is expected to break callers
    pub breaking: bool,
    /// Dependency group this update was bucketed into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Which configuration layer decided the update level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_source: Option<String>,
    /// Text written into the manifest; `None` leaves the manifest untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_value: Option<String>,
}

impl Update {
    /// Creates an update; major bumps are flagged as breaking
    pub fn new(dependency: Dependency, target_version: impl Into<String>, impact: Impact) -> Self {
        let target_version = target_version.into();
        Self {
            manifest_value: Some(target_version.clone()),
            dependency,
            target_version,
            impact,
            changelog_url: None,
            breaking: impact == Impact::Major,
            group: None,
            policy_source: None,
        }
    }

    /// Sets the changelog URL (builder pattern)
    pub fn with_changelog(mut self, url: impl Into<String>) -> Self {
        self.changelog_url = Some(url.into());
        self
    }

    /// Sets the policy source (builder pattern)
    pub fn with_policy_source(mut self, source: impl Into<String>) -> Self {
        self.policy_source = Some(source.into());
        self
    }

    /// Returns the dependency name
    pub fn name(&self) -> &str {
        &self.dependency.name
    }

    /// Key used for release timestamp lookups (`name@version`)
    pub fn release_key(&self) -> String {
        format!("{}@{}", self.dependency.name, self.target_version)
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} → {} ({})",
            self.dependency.name, self.dependency.current_version, self.target_version, self.impact
        )
    }
}

/// How an integration mutates the manifest when applying a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStrategy {
    /// Run the ecosystem's own tool
    NativeCommand,
    /// Text rewrite of the manifest
    CustomRewrite,
    /// Structural YAML edit
    YamlRewrite,
    /// Structural HCL edit
    HclRewrite,
}

/// A manifest with the updates proposed for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePlan {
    /// The manifest being updated
    pub manifest: Manifest,
    /// Proposed updates (may be empty)
    pub updates: Vec<Update>,
    /// How apply will mutate the file
    pub strategy: PlanStrategy,
    /// Dependencies dropped during planning, with the reason
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub skipped: BTreeMap<String, String>,
    /// Suggested commit message for the updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
}

impl UpdatePlan {
    /// Creates a plan without updates
    pub fn new(manifest: Manifest, strategy: PlanStrategy) -> Self {
        Self {
            manifest,
            updates: Vec::new(),
            strategy,
            skipped: BTreeMap::new(),
            commit_message: None,
        }
    }

    /// Returns true if the plan proposes any change
    pub fn has_updates(&self) -> bool {
        !self.updates.is_empty()
    }
}

/// Outcome of applying one plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Manifest that was updated
    pub manifest_path: PathBuf,
    /// Number of updates written
    pub applied: usize,
    /// Number of updates that could not be written
    pub failed: usize,
    /// Line diff of the manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_diff: Option<String>,
    /// Line diff of the lockfile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lockfile_diff: Option<String>,
    /// Per-update failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ApplyResult {
    /// Creates an empty result for a manifest
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            ..Self::default()
        }
    }

    /// Records a failed update
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(message.into());
    }

    /// Returns true if any errors occurred
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DependencyType;

    fn dep() -> Dependency {
        Dependency::new("express", "4.18.2", "^4.18.2", DependencyType::Production, "npm")
    }

    #[test]
    fn test_impact_ordering() {
        assert!(Impact::None < Impact::Patch);
        assert!(Impact::Patch < Impact::Minor);
        assert!(Impact::Minor < Impact::Major);
    }

    #[test]
    fn test_update_major_is_breaking() {
        let update = Update::new(dep(), "5.0.0", Impact::Major);
        assert!(update.breaking);
        assert_eq!(update.manifest_value.as_deref(), Some("5.0.0"));

        let update = Update::new(dep(), "4.19.0", Impact::Minor);
        assert!(!update.breaking);
    }

    #[test]
    fn test_release_key() {
        let update = Update::new(dep(), "4.19.0", Impact::Minor);
        assert_eq!(update.release_key(), "express@4.19.0");
    }

    #[test]
    fn test_update_display() {
        let update = Update::new(dep(), "4.19.0", Impact::Minor);
        assert_eq!(update.to_string(), "express: 4.18.2 → 4.19.0 (minor)");
    }

    #[test]
    fn test_apply_result_record_failure() {
        let mut result = ApplyResult::new("/repo/package.json");
        result.record_failure("express: not found");
        assert_eq!(result.failed, 1);
        assert!(result.has_errors());
    }

    #[test]
    fn test_serde_plan_strategy() {
        let json = serde_json::to_string(&PlanStrategy::NativeCommand).unwrap();
        assert_eq!(json, "\"native_command\"");
    }

    #[test]
    fn test_serde_impact() {
        let json = serde_json::to_string(&Impact::Minor).unwrap();
        assert_eq!(json, "\"minor\"");
        let parsed: Impact = serde_json::from_str("\"major\"").unwrap();
        assert_eq!(parsed, Impact::Major);
    }
}
