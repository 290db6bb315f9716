//! Allow, ignore, cooldown and grouping rules
//!
//! This module provides the UpdateFilter struct that applies an
//! integration policy to the candidate updates of one manifest.

use crate::config::{any_glob_match, glob_match, DependencyGroup, IgnoreRule, IntegrationPolicy};
use crate::domain::Update;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};

/// Labels used when the policy does not configure any
pub const DEFAULT_LABELS: &[&str] = &["dependencies", "automated"];

/// Open pull request limit used when the policy does not configure one
pub const DEFAULT_OPEN_PULL_REQUESTS_LIMIT: u32 = 5;

/// Post-processes candidate updates according to an integration policy
#[derive(Debug, Clone)]
pub struct UpdateFilter {
    /// Policy being applied
    pub(super) policy: IntegrationPolicy,
    /// Current time for cooldown calculations
    now: DateTime<Utc>,
}

impl UpdateFilter {
    /// Create a filter for `policy`
    pub fn new(policy: IntegrationPolicy) -> Self {
        Self {
            policy,
            now: Utc::now(),
        }
    }

    /// Create a filter with a custom current time (for testing)
    pub fn with_time(policy: IntegrationPolicy, now: DateTime<Utc>) -> Self {
        Self { policy, now }
    }

    /// The policy being applied
    pub fn policy(&self) -> &IntegrationPolicy {
        &self.policy
    }

    /// Apply allow rules, ignore rules and the cooldown, in that order
    ///
    /// `release_timestamps` is keyed by `name@version`. Every dropped update
    /// leaves a reason keyed by dependency name.
    pub fn filter_updates(
        &self,
        updates: Vec<Update>,
        release_timestamps: &HashMap<String, DateTime<Utc>>,
    ) -> (Vec<Update>, BTreeMap<String, String>) {
        let mut kept = Vec::with_capacity(updates.len());
        let mut reasons = BTreeMap::new();

        for update in updates {
            match self.rejection_reason(&update, release_timestamps) {
                Some(reason) => {
                    tracing::debug!(dependency = update.name(), reason = %reason, "update filtered");
                    reasons.insert(update.name().to_string(), reason);
                }
                None => kept.push(update),
            }
        }

        (kept, reasons)
    }

    fn rejection_reason(
        &self,
        update: &Update,
        release_timestamps: &HashMap<String, DateTime<Utc>>,
    ) -> Option<String> {
        if !self.is_allowed(update) {
            return Some("not matched by any allow rule".to_string());
        }

        if let Some(rule) = self.policy.ignore.iter().find(|r| ignore_matches(r, update)) {
            return Some(format!("ignored by rule for '{}'", rule.dependency_name));
        }

        self.cooldown_reason(update, release_timestamps)
    }

    fn is_allowed(&self, update: &Update) -> bool {
        if self.policy.allow.is_empty() {
            return true;
        }

        self.policy.allow.iter().any(|rule| {
            let name_match = rule
                .dependency_name
                .as_deref()
                .is_some_and(|pattern| glob_match(pattern, update.name()));
            let type_match = rule
                .dependency_type
                .as_ref()
                .is_some_and(|t| *t == update.dependency.dep_type);
            name_match || type_match
        })
    }

    fn cooldown_reason(
        &self,
        update: &Update,
        release_timestamps: &HashMap<String, DateTime<Utc>>,
    ) -> Option<String> {
        let cooldown = self.policy.cooldown.as_ref()?;
        if any_glob_match(&cooldown.exclude, update.name()) {
            return None;
        }

        let released_at = release_timestamps.get(&update.release_key())?;
        let required = cooldown.required_days(update.impact);
        let age = self.now - *released_at;
        if age >= Duration::days(i64::from(required)) {
            return None;
        }

        Some(format!(
            "cooldown: {} released {} days ago, {} days required",
            update.target_version,
            age.num_days(),
            required
        ))
    }

    /// Bucket updates into the configured groups
    ///
    /// The first matching group wins. Grouped updates have `group` set;
    /// updates matching no group are returned separately in input order.
    pub fn group_updates(
        &self,
        updates: Vec<Update>,
    ) -> (BTreeMap<String, Vec<Update>>, Vec<Update>) {
        let mut grouped: BTreeMap<String, Vec<Update>> = BTreeMap::new();
        let mut ungrouped = Vec::new();

        for mut update in updates {
            match self.policy.groups.iter().find(|g| group_matches(g, &update)) {
                Some(group) => {
                    update.group = Some(group.name.clone());
                    grouped.entry(group.name.clone()).or_default().push(update);
                }
                None => ungrouped.push(update),
            }
        }

        (grouped, ungrouped)
    }

    /// Labels for pull requests
    pub fn labels(&self) -> Vec<String> {
        if self.policy.labels.is_empty() {
            DEFAULT_LABELS.iter().map(|l| l.to_string()).collect()
        } else {
            self.policy.labels.clone()
        }
    }

    /// Maximum number of open pull requests
    pub fn open_pull_requests_limit(&self) -> u32 {
        self.policy
            .open_pull_requests_limit
            .unwrap_or(DEFAULT_OPEN_PULL_REQUESTS_LIMIT)
    }
}

/// The name must match; then either criterion list (or neither being set)
/// triggers the ignore.
fn ignore_matches(rule: &IgnoreRule, update: &Update) -> bool {
    if !glob_match(&rule.dependency_name, update.name()) {
        return false;
    }

    if rule.versions.is_empty() && rule.update_types.is_empty() {
        return true;
    }

    any_glob_match(&rule.versions, &update.dependency.current_version)
        || rule.update_types.contains(&update.impact)
}

fn group_matches(group: &DependencyGroup, update: &Update) -> bool {
    let name = update.name();

    let included = group.patterns.is_empty() || any_glob_match(&group.patterns, name);
    if !included || any_glob_match(&group.exclude_patterns, name) {
        return false;
    }

    if let Some(dep_type) = &group.dependency_type {
        if *dep_type != update.dependency.dep_type {
            return false;
        }
    }

    group.update_types.is_empty() || group.update_types.contains(&update.impact)
}
