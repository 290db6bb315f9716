//! Repository configuration
//!
//! The configuration file lives at the repository root as `.depflow.yml`,
//! `.depflow.yaml` or `.depflow.toml`. It carries:
//! - An optional update schedule
//! - The phase concurrency
//! - One block per integration: its update policy plus manifest match globs

mod matcher;
mod policy;

pub use matcher::{any_glob_match, glob_match, MatchConfig};
pub use policy::{
    AllowRule, CommitMessageConfig, CooldownConfig, DependencyGroup, IgnoreRule,
    IntegrationPolicy, UpdateLevel, VersioningStrategy,
};

use crate::error::ConfigError;
use crate::schedule::{Schedule, ScheduleChecker};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// File names probed by [`Config::discover`], in order
pub const CONFIG_FILE_NAMES: &[&str] = &[".depflow.yml", ".depflow.yaml", ".depflow.toml"];

/// Settings for one integration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Update policy
    #[serde(flatten)]
    pub policy: IntegrationPolicy,
    /// Manifest path globs to include
    pub files: Vec<String>,
    /// Manifest path globs to exclude
    pub exclude: Vec<String>,
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// When scheduled runs may fire
    pub schedule: Option<Schedule>,
    /// Maximum concurrent units per phase
    pub concurrency: Option<usize>,
    /// Per-integration settings keyed by integration name
    pub integrations: BTreeMap<String, IntegrationConfig>,
}

impl Config {
    /// Load a configuration file, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("yml" | "yaml") => Self::from_yaml(&content, path),
            Some("toml") => Self::from_toml(&content, path),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Find and load the configuration file in `repo_root`
    ///
    /// Returns the default configuration when no file exists.
    pub fn discover(repo_root: &Path) -> Result<Self, ConfigError> {
        match Self::find(repo_root) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Path of the first configuration file present in `repo_root`
    pub fn find(repo_root: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| repo_root.join(name))
            .find(|path| path.is_file())
    }

    /// Parse YAML configuration
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ConfigError::YamlParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Parse TOML configuration
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Check values that parse but cannot be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == Some(0) {
            return Err(ConfigError::invalid_value(
                "concurrency",
                "must be greater than zero",
            ));
        }

        if let Some(schedule) = &self.schedule {
            ScheduleChecker::new(schedule.clone())
                .map_err(|e| ConfigError::invalid_value("schedule.timezone", e.to_string()))?;
        }

        for (name, integration) in &self.integrations {
            if let Some(UpdateLevel::Other(level)) = &integration.policy.update {
                tracing::warn!(
                    integration = %name,
                    level = %level,
                    "unknown update level, all updates will be permitted"
                );
            }
        }

        Ok(())
    }

    /// Update policies keyed by integration name
    pub fn policies(&self) -> HashMap<String, IntegrationPolicy> {
        self.integrations
            .iter()
            .map(|(name, integration)| (name.clone(), integration.policy.clone()))
            .collect()
    }

    /// Match configs for integrations that declare any globs
    pub fn match_configs(&self) -> HashMap<String, MatchConfig> {
        self.integrations
            .iter()
            .map(|(name, integration)| {
                (
                    name.clone(),
                    MatchConfig::new(integration.files.clone(), integration.exclude.clone()),
                )
            })
            .filter(|(_, config)| !config.is_empty())
            .collect()
    }

    /// Names of integrations switched off with `enabled: false`
    pub fn disabled_integrations(&self) -> Vec<String> {
        self.integrations
            .iter()
            .filter(|(_, integration)| !integration.policy.is_enabled())
            .map(|(name, _)| name.clone())
            .collect()
    }
}
