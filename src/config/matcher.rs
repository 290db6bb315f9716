//! Glob matching for dependency names and manifest paths

use globset::Glob;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Returns true if `text` matches the glob `pattern`
///
/// A pattern that does not compile as a glob is compared literally.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    match Glob::new(pattern) {
        Ok(glob) => glob.compile_matcher().is_match(text),
        Err(_) => pattern == text,
    }
}

/// Returns true if any of `patterns` matches `text`
pub fn any_glob_match<S: AsRef<str>>(patterns: &[S], text: &str) -> bool {
    patterns.iter().any(|p| glob_match(p.as_ref(), text))
}

/// Which manifests of one integration take part in a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Path globs; when empty every manifest is included
    pub files: Vec<String>,
    /// Path globs that exclude a manifest
    pub exclude: Vec<String>,
}

impl MatchConfig {
    /// Create a match config from include and exclude globs
    pub fn new(files: Vec<String>, exclude: Vec<String>) -> Self {
        Self { files, exclude }
    }

    /// Returns true if neither list carries any pattern
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.exclude.is_empty()
    }

    /// Decide whether a manifest is kept
    ///
    /// Each glob is tried against both the full path and the path relative to
    /// the repository root.
    pub fn matches(&self, full_path: &Path, relative_path: &Path) -> bool {
        let full = full_path.to_string_lossy();
        let relative = relative_path.to_string_lossy();
        let hit = |patterns: &[String]| {
            any_glob_match(patterns, &full) || any_glob_match(patterns, &relative)
        };

        let included = self.files.is_empty() || hit(&self.files);
        included && !hit(&self.exclude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match_wildcards() {
        assert!(glob_match("@types/*", "@types/node"));
        assert!(!glob_match("@types/*", "react"));
        assert!(glob_match("eslint*", "eslint-plugin-react"));
        assert!(glob_match("4.*", "4.17.21"));
    }

    #[test]
    fn test_invalid_glob_falls_back_to_equality() {
        assert!(glob_match("a[b", "a[b"));
        assert!(!glob_match("a[b", "ab"));
    }

    #[test]
    fn test_match_config_empty_includes_everything() {
        let config = MatchConfig::default();
        assert!(config.is_empty());
        assert!(config.matches(
            Path::new("/repo/package.json"),
            Path::new("package.json")
        ));
    }

    #[test]
    fn test_match_config_files_against_relative_path() {
        let config = MatchConfig::new(vec!["frontend/**/package.json".to_string()], vec![]);
        assert!(config.matches(
            Path::new("/repo/frontend/app/package.json"),
            Path::new("frontend/app/package.json")
        ));
        assert!(!config.matches(
            Path::new("/repo/backend/package.json"),
            Path::new("backend/package.json")
        ));
    }

    #[test]
    fn test_match_config_files_against_full_path() {
        let config = MatchConfig::new(vec!["/repo/*/package.json".to_string()], vec![]);
        assert!(config.matches(
            Path::new("/repo/web/package.json"),
            Path::new("web/package.json")
        ));
    }

    #[test]
    fn test_match_config_exclude_wins() {
        let config = MatchConfig::new(
            vec!["**/package.json".to_string()],
            vec!["**/fixtures/**".to_string()],
        );
        assert!(config.matches(
            Path::new("/repo/web/package.json"),
            Path::new("web/package.json")
        ));
        assert!(!config.matches(
            Path::new("/repo/test/fixtures/package.json"),
            Path::new("test/fixtures/package.json")
        ));
    }
}
