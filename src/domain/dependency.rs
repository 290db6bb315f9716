//! Dependency information structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a dependency plays inside its manifest
///
/// The known roles cover the ecosystems depflow understands; anything else is
/// kept verbatim in `Other` so new integrations do not need a core change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DependencyType {
    /// Runtime dependency (`dependencies`, `install_requires`, ...)
    Production,
    /// Development-only dependency
    Development,
    /// Peer dependency
    Peer,
    /// Optional dependency
    Optional,
    /// Go/Terraform module
    Module,
    /// Terraform provider
    Provider,
    /// Helm chart
    Chart,
    /// Container image
    Image,
    /// Integration-specific role
    Other(String),
}

impl DependencyType {
    /// Returns the canonical string for this type
    pub fn as_str(&self) -> &str {
        match self {
            DependencyType::Production => "production",
            DependencyType::Development => "development",
            DependencyType::Peer => "peer",
            DependencyType::Optional => "optional",
            DependencyType::Module => "module",
            DependencyType::Provider => "provider",
            DependencyType::Chart => "chart",
            DependencyType::Image => "image",
            DependencyType::Other(value) => value,
        }
    }

    /// Returns true for development dependencies
    pub fn is_development(&self) -> bool {
        matches!(self, DependencyType::Development)
    }
}

impl From<&str> for DependencyType {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" | "direct" | "runtime" => DependencyType::Production,
            "development" | "dev" => DependencyType::Development,
            "peer" => DependencyType::Peer,
            "optional" => DependencyType::Optional,
            "module" => DependencyType::Module,
            "provider" => DependencyType::Provider,
            "chart" => DependencyType::Chart,
            "image" => DependencyType::Image,
            _ => DependencyType::Other(value.to_string()),
        }
    }
}

impl From<String> for DependencyType {
    fn from(value: String) -> Self {
        DependencyType::from(value.as_str())
    }
}

impl From<DependencyType> for String {
    fn from(value: DependencyType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Package name
    pub name: String,
    /// Current version with any operator stripped (e.g. `1.2.3`)
    pub current_version: String,
    /// Raw constraint as written in the manifest (e.g. `^1.2.3`)
    pub constraint: String,
    /// Role of this dependency in the manifest
    #[serde(rename = "type")]
    pub dep_type: DependencyType,
    /// Datasource used to look up versions
    pub registry: String,
}

impl Dependency {
    /// Creates a new dependency
    pub fn new(
        name: impl Into<String>,
        current_version: impl Into<String>,
        constraint: impl Into<String>,
        dep_type: DependencyType,
        registry: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            current_version: current_version.into(),
            constraint: constraint.into(),
            dep_type,
            registry: registry.into(),
        }
    }

    /// Returns true if this is a development dependency
    pub fn is_dev(&self) -> bool {
        self.dep_type.is_development()
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dev_marker = if self.is_dev() { " (dev)" } else { "" };
        write!(
            f,
            "{}@{}{} [{}]",
            self.name, self.constraint, dev_marker, self.registry
        )
    }
}
