//! Precedence-resolved settings for one Plan call

use crate::config::{IntegrationPolicy, UpdateLevel};
use crate::update::UpdateFilter;
use serde::{Deserialize, Serialize};

/// Overrides supplied on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliFlags {
    /// Highest update level, overriding every policy
    pub update_level: Option<UpdateLevel>,
    /// Pre-release override
    pub allow_prerelease: Option<bool>,
}

impl CliFlags {
    /// Create empty flags
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the update level (builder pattern)
    pub fn with_update_level(mut self, level: UpdateLevel) -> Self {
        self.update_level = Some(level);
        self
    }

    /// Set the pre-release override (builder pattern)
    pub fn with_allow_prerelease(mut self, allow: bool) -> Self {
        self.allow_prerelease = Some(allow);
        self
    }

    /// Returns true if no override is set
    pub fn is_empty(&self) -> bool {
        self.update_level.is_none() && self.allow_prerelease.is_none()
    }
}

/// Policy and CLI overrides merged for one manifest
///
/// Precedence: CLI flags, then the integration policy, then the constraint
/// written in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanContext {
    /// Policy of the integration owning the manifest
    pub policy: Option<IntegrationPolicy>,
    /// Command line overrides
    pub cli_flags: Option<CliFlags>,
}

impl PlanContext {
    /// Create a context from optional policy and flags
    pub fn new(policy: Option<IntegrationPolicy>, cli_flags: Option<CliFlags>) -> Self {
        Self { policy, cli_flags }
    }

    /// Update level after applying precedence; `major` when nothing is set
    pub fn effective_update_level(&self) -> UpdateLevel {
        self.cli_level()
            .or_else(|| self.policy_level())
            .cloned()
            .unwrap_or(UpdateLevel::Major)
    }

    /// Whether pre-releases are candidates after applying precedence
    pub fn effective_allow_prerelease(&self) -> bool {
        self.cli_flags
            .as_ref()
            .and_then(|f| f.allow_prerelease)
            .or_else(|| self.policy.as_ref().map(|p| p.allow_prerelease))
            .unwrap_or(false)
    }

    /// Returns true if the policy freezes every dependency
    pub fn is_pinned(&self) -> bool {
        self.policy.as_ref().is_some_and(|p| p.pin)
    }

    /// Manifest constraints only apply when no explicit update level is set
    pub fn enforces_constraint(&self) -> bool {
        self.cli_level().is_none() && self.policy_level().is_none()
    }

    /// Which layer decided the update level: `cli`, `policy` or `constraint`
    pub fn policy_source(&self) -> &'static str {
        if self.cli_level().is_some() {
            "cli"
        } else if self.policy_level().is_some() {
            "policy"
        } else {
            "constraint"
        }
    }

    /// Update filter for the policy, or a permissive one without policy
    pub fn update_filter(&self) -> UpdateFilter {
        UpdateFilter::new(self.policy.clone().unwrap_or_default())
    }

    fn cli_level(&self) -> Option<&UpdateLevel> {
        self.cli_flags.as_ref().and_then(|f| f.update_level.as_ref())
    }

    fn policy_level(&self) -> Option<&UpdateLevel> {
        self.policy.as_ref().and_then(|p| p.update.as_ref())
    }
}
