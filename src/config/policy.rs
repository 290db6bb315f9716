//! Per-integration update policy
//!
//! These types mirror the `integrations.<name>` blocks of the repository
//! configuration file and are read-only for the duration of a run.

use crate::domain::{DependencyType, Impact};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest update severity a policy allows
///
/// Unknown strings are kept in `Other` and permit every update, so a typo in
/// the configuration never blocks updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UpdateLevel {
    /// No updates at all
    None,
    /// Patch updates only
    Patch,
    /// Minor and patch updates
    Minor,
    /// Every update
    Major,
    /// Unrecognized level
    Other(String),
}

impl UpdateLevel {
    /// Returns true if an update of the given impact is allowed at this level
    pub fn permits(&self, impact: Impact) -> bool {
        match self {
            UpdateLevel::Major => true,
            UpdateLevel::Minor => matches!(impact, Impact::Minor | Impact::Patch),
            UpdateLevel::Patch => impact == Impact::Patch,
            UpdateLevel::None => false,
            UpdateLevel::Other(_) => true,
        }
    }

    /// Returns the configuration string for this level
    pub fn as_str(&self) -> &str {
        match self {
            UpdateLevel::None => "none",
            UpdateLevel::Patch => "patch",
            UpdateLevel::Minor => "minor",
            UpdateLevel::Major => "major",
            UpdateLevel::Other(value) => value,
        }
    }
}

impl From<&str> for UpdateLevel {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => UpdateLevel::None,
            "patch" => UpdateLevel::Patch,
            "minor" => UpdateLevel::Minor,
            "major" => UpdateLevel::Major,
            _ => UpdateLevel::Other(value.to_string()),
        }
    }
}

impl From<String> for UpdateLevel {
    fn from(value: String) -> Self {
        UpdateLevel::from(value.as_str())
    }
}

impl From<UpdateLevel> for String {
    fn from(value: UpdateLevel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for UpdateLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the manifest constraint is rewritten when an update is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersioningStrategy {
    /// Let the integration decide (same as `increase`)
    #[default]
    Auto,
    /// Always write the new version
    Increase,
    /// Write only when the current constraint excludes the new version
    IncreaseIfNecessary,
    /// Never touch the manifest; only lockfiles move
    LockfileOnly,
    /// Replace the constraint with an open-ended range
    Widen,
}

/// Allow-list entry; an update is allowed when either field matches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowRule {
    /// Glob matched against the dependency name
    pub dependency_name: Option<String>,
    /// Exact dependency type
    pub dependency_type: Option<DependencyType>,
}

/// Ignore-list entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreRule {
    /// Glob matched against the dependency name
    pub dependency_name: String,
    /// Globs matched against the current version
    pub versions: Vec<String>,
    /// Update severities to ignore
    pub update_types: Vec<Impact>,
}

/// Minimum age of a release before it is offered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Days applied when no impact-specific value is set
    pub default_days: u32,
    /// Days for major updates
    pub semver_major_days: Option<u32>,
    /// Days for minor updates
    pub semver_minor_days: Option<u32>,
    /// Days for patch updates
    pub semver_patch_days: Option<u32>,
    /// Dependency name globs exempt from the cooldown
    pub exclude: Vec<String>,
}

impl CooldownConfig {
    /// Required age in days for an update of the given impact
    pub fn required_days(&self, impact: Impact) -> u32 {
        let specific = match impact {
            Impact::Major => self.semver_major_days,
            Impact::Minor => self.semver_minor_days,
            Impact::Patch => self.semver_patch_days,
            Impact::None => None,
        };
        specific.unwrap_or(self.default_days)
    }
}

/// Named bucket of dependencies updated together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyGroup {
    /// Group name used in commit messages
    pub name: String,
    /// Name globs; any match admits the dependency
    pub patterns: Vec<String>,
    /// Name globs; any match vetoes membership
    pub exclude_patterns: Vec<String>,
    /// Restrict the group to one dependency type
    pub dependency_type: Option<DependencyType>,
    /// Restrict the group to these update severities
    pub update_types: Vec<Impact>,
}

/// Commit message settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitMessageConfig {
    /// Prefix for production updates (e.g. `build`)
    pub prefix: Option<String>,
    /// Prefix for development updates
    pub prefix_development: Option<String>,
    /// Append a `(deps)` / `(deps-dev)` scope to the prefix
    pub include_scope: bool,
}

/// Update policy for one integration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationPolicy {
    /// Whether the integration runs at all
    pub enabled: Option<bool>,
    /// Highest update level
    pub update: Option<UpdateLevel>,
    /// Whether pre-release versions are candidates
    pub allow_prerelease: bool,
    /// Freeze every dependency at its current version
    pub pin: bool,
    /// Informational cadence hint (e.g. `weekly`)
    pub cadence: Option<String>,
    /// Allow-list rules
    pub allow: Vec<AllowRule>,
    /// Ignore-list rules
    pub ignore: Vec<IgnoreRule>,
    /// Release age gate
    pub cooldown: Option<CooldownConfig>,
    /// Dependency groups, first match wins
    pub groups: Vec<DependencyGroup>,
    /// Commit message settings
    pub commit_message: Option<CommitMessageConfig>,
    /// Labels for pull requests
    pub labels: Vec<String>,
    /// Maximum number of open pull requests
    pub open_pull_requests_limit: Option<u32>,
    /// Manifest rewrite strategy
    pub versioning_strategy: Option<VersioningStrategy>,
}

impl IntegrationPolicy {
    /// Returns false only when the policy explicitly disables the integration
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_level_permits() {
        assert!(UpdateLevel::Major.permits(Impact::Major));
        assert!(UpdateLevel::Minor.permits(Impact::Patch));
        assert!(!UpdateLevel::Minor.permits(Impact::Major));
        assert!(UpdateLevel::Patch.permits(Impact::Patch));
        assert!(!UpdateLevel::Patch.permits(Impact::Minor));
        assert!(!UpdateLevel::None.permits(Impact::Patch));
    }

    #[test]
    fn test_unknown_update_level_permits_everything() {
        let level = UpdateLevel::from("sometimes");
        assert_eq!(level, UpdateLevel::Other("sometimes".to_string()));
        assert!(level.permits(Impact::Major));
    }

    #[test]
    fn test_cooldown_required_days_falls_back_to_default() {
        let cooldown = CooldownConfig {
            default_days: 3,
            semver_major_days: Some(14),
            ..Default::default()
        };
        assert_eq!(cooldown.required_days(Impact::Major), 14);
        assert_eq!(cooldown.required_days(Impact::Minor), 3);
        assert_eq!(cooldown.required_days(Impact::Patch), 3);
    }

    #[test]
    fn test_policy_from_yaml() {
        let yaml = r#"
update: minor
allow_prerelease: true
ignore:
  - dependency_name: "lodash"
    update_types: [major]
versioning_strategy: increase-if-necessary
"#;
        let policy: IntegrationPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.update, Some(UpdateLevel::Minor));
        assert!(policy.allow_prerelease);
        assert!(!policy.pin);
        assert_eq!(policy.ignore[0].update_types, vec![Impact::Major]);
        assert_eq!(
            policy.versioning_strategy,
            Some(VersioningStrategy::IncreaseIfNecessary)
        );
        assert!(policy.is_enabled());
    }

    #[test]
    fn test_policy_disabled() {
        let policy: IntegrationPolicy = serde_yaml::from_str("enabled: false").unwrap();
        assert!(!policy.is_enabled());
    }
}
