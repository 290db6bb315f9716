//! Discovered manifest files

use super::Dependency;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A dependency-declaring file found in the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Path to the manifest file
    pub path: PathBuf,
    /// Name of the integration that produced this manifest
    #[serde(rename = "type")]
    pub manifest_type: String,
    /// Dependencies in file order
    pub dependencies: Vec<Dependency>,
    /// Raw file content
    #[serde(skip)]
    pub content: String,
    /// Integration-specific facts (file_type, chart_name, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Manifest {
    /// Creates a new manifest
    pub fn new(
        path: impl Into<PathBuf>,
        manifest_type: impl Into<String>,
        dependencies: Vec<Dependency>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            manifest_type: manifest_type.into(),
            dependencies,
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Adds a metadata entry (builder pattern)
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Path relative to `root`, or the full path when it lies outside
    pub fn relative_path(&self, root: &Path) -> PathBuf {
        self.path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| self.path.clone())
    }

    /// Looks up a dependency by name
    pub fn dependency(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DependencyType;

    fn sample() -> Manifest {
        Manifest::new(
            "/repo/web/package.json",
            "npm",
            vec![Dependency::new(
                "react",
                "18.2.0",
                "^18.2.0",
                DependencyType::Production,
                "npm",
            )],
            "{}",
        )
    }

    #[test]
    fn test_relative_path_inside_root() {
        let manifest = sample();
        assert_eq!(
            manifest.relative_path(Path::new("/repo")),
            PathBuf::from("web/package.json")
        );
    }

    #[test]
    fn test_relative_path_outside_root() {
        let manifest = sample();
        assert_eq!(
            manifest.relative_path(Path::new("/elsewhere")),
            PathBuf::from("/repo/web/package.json")
        );
    }

    #[test]
    fn test_dependency_lookup() {
        let manifest = sample();
        assert!(manifest.dependency("react").is_some());
        assert!(manifest.dependency("vue").is_none());
    }

    #[test]
    fn test_content_not_serialized() {
        let manifest = sample().with_metadata("file_type", "package.json");
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(!json.contains("content"));
        assert!(json.contains("\"file_type\":\"package.json\""));
        assert!(json.contains("\"type\":\"npm\""));
    }
}
