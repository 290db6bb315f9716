//! Commit messages and manifest rewrite decisions

use super::UpdateFilter;
use crate::config::VersioningStrategy;
use crate::domain::Update;
use crate::resolve::{parse_constraint, parse_lenient};
use std::path::Path;

/// Prefix used when no commit message settings exist
const LEGACY_PREFIX: &str = "chore(deps)";

/// Prefix used when settings exist but leave the prefix unset
const DEFAULT_PREFIX: &str = "chore";

impl UpdateFilter {
    /// Build the commit message for the updates of one manifest
    ///
    /// - one update: `<prefix>: update <name> from <current> to <target> in <manifest>`
    /// - one group: `<prefix>: update <N> dependencies in <group> group in <manifest>`
    /// - otherwise: `<prefix>: update <N> dependencies in <manifest>`
    ///
    /// Without commit message settings a single update uses the legacy
    /// `chore(deps): update <name> from <current> to <target>` form.
    pub fn format_commit_message(&self, updates: &[Update], manifest_path: &Path) -> String {
        let Some(first) = updates.first() else {
            return String::new();
        };
        let manifest = manifest_path.display();
        let prefix = self.commit_prefix(updates);

        if updates.len() == 1 && first.group.is_none() {
            let base = format!(
                "{prefix}: update {} from {} to {}",
                first.name(),
                first.dependency.current_version,
                first.target_version
            );
            return if self.policy.commit_message.is_none() {
                base
            } else {
                format!("{base} in {manifest}")
            };
        }

        if let Some(group) = first.group.as_deref() {
            if updates.iter().all(|u| u.group.as_deref() == Some(group)) {
                return format!(
                    "{prefix}: update {} dependencies in {group} group in {manifest}",
                    updates.len()
                );
            }
        }

        format!("{prefix}: update {} dependencies in {manifest}", updates.len())
    }

    fn commit_prefix(&self, updates: &[Update]) -> String {
        let Some(config) = &self.policy.commit_message else {
            return LEGACY_PREFIX.to_string();
        };

        let development = updates.iter().all(|u| u.dependency.dep_type.is_development());
        let prefix = if development {
            config.prefix_development.as_deref().or(config.prefix.as_deref())
        } else {
            config.prefix.as_deref()
        }
        .unwrap_or(DEFAULT_PREFIX);

        if config.include_scope && !prefix.contains('(') {
            let scope = if development { "deps-dev" } else { "deps" };
            format!("{prefix}({scope})")
        } else {
            prefix.to_string()
        }
    }

    /// Decide what to write into the manifest for `update`
    ///
    /// Returns the text to write and whether the manifest should be written
    /// at all. `constraint` is the constraint currently in the manifest.
    pub fn apply_versioning_strategy(&self, update: &Update, constraint: &str) -> (String, bool) {
        let target = update.target_version.clone();
        match self.policy.versioning_strategy.unwrap_or_default() {
            VersioningStrategy::LockfileOnly => (target, false),
            VersioningStrategy::Widen => (format!(">={}", update.dependency.current_version), true),
            VersioningStrategy::IncreaseIfNecessary => {
                let satisfied = parse_constraint(constraint)
                    .ok()
                    .zip(parse_lenient(&target))
                    .is_some_and(|(parsed, version)| parsed.allows(&version));
                (target, !satisfied)
            }
            VersioningStrategy::Auto | VersioningStrategy::Increase => (target, true),
        }
    }
}
