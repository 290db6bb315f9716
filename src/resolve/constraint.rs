//! Manifest constraint parsing
//!
//! Supported forms, classified by prefix in this order:
//! - `~> X.Y` / `~> X.Y.Z` (pessimistic, Terraform and RubyGems style)
//! - `^X.Y.Z` (caret, npm style)
//! - `~X.Y.Z` (tilde, npm style)
//! - `>=X`, `>X` (minimum)
//! - `=X` or a bare version (exact)
//!
//! Comma-separated compound ranges (`>=1.0, <2.0`) are kept as a range.

use super::version::parse_lenient;
use crate::domain::Impact;
use crate::error::ResolveError;
use semver::{Version, VersionReq};

/// Constraint flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Pinned version
    Exact,
    /// `~>`
    Pessimistic,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `>=` or `>`
    Minimum,
    /// Compound range
    Range,
}

/// A constraint string turned into a semver range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConstraint {
    /// Constraint flavour
    pub kind: ConstraintKind,
    /// Constraint as written
    pub raw: String,
    /// Lower bound version (padded to three components)
    pub base_version: Version,
    /// Versions accepted by the constraint
    pub range: VersionReq,
    /// Largest update the constraint lets through
    pub max_allowed_impact: Impact,
}

impl ParsedConstraint {
    /// Returns true if `version` satisfies the constraint
    ///
    /// Pre-releases are accepted when their release equivalent is in range
    /// and they are not below the base version.
    pub fn allows(&self, version: &Version) -> bool {
        if self.range.matches(version) {
            return true;
        }
        if version.pre.is_empty() {
            return false;
        }
        let release = Version::new(version.major, version.minor, version.patch);
        self.range.matches(&release) && *version >= self.base_version
    }
}

/// Parse a constraint string
///
/// The result is never cached; every call re-parses.
pub fn parse_constraint(raw: &str) -> Result<ParsedConstraint, ResolveError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::invalid_constraint(raw, "empty constraint"));
    }

    if trimmed.contains(',') {
        return parse_range(raw, trimmed);
    }

    let (kind, base) = if let Some(rest) = trimmed.strip_prefix("~>") {
        (ConstraintKind::Pessimistic, rest)
    } else if let Some(rest) = trimmed.strip_prefix('^') {
        (ConstraintKind::Caret, rest)
    } else if let Some(rest) = trimmed.strip_prefix('~') {
        (ConstraintKind::Tilde, rest)
    } else if let Some(rest) = trimmed.strip_prefix(">=") {
        (ConstraintKind::Minimum, rest)
    } else if let Some(rest) = trimmed.strip_prefix('>') {
        (ConstraintKind::Minimum, rest)
    } else if let Some(rest) = trimmed.strip_prefix('=') {
        (ConstraintKind::Exact, rest)
    } else {
        (ConstraintKind::Exact, trimmed)
    };

    let base = base.trim();
    let base = base.strip_prefix('v').unwrap_or(base);
    let base_version = parse_lenient(base)
        .ok_or_else(|| ResolveError::invalid_constraint(raw, format!("invalid version '{base}'")))?;

    let (requirement, max_allowed_impact) = match kind {
        ConstraintKind::Pessimistic => pessimistic_requirement(base, &base_version),
        ConstraintKind::Caret => (format!("^{base}"), Impact::Minor),
        ConstraintKind::Tilde => (format!("~{base}"), Impact::Patch),
        ConstraintKind::Minimum if trimmed.starts_with(">=") => {
            (format!(">={base_version}"), Impact::Major)
        }
        ConstraintKind::Minimum => (format!(">{base_version}"), Impact::Major),
        ConstraintKind::Exact | ConstraintKind::Range => {
            (format!("={base_version}"), Impact::None)
        }
    };

    let range = VersionReq::parse(&requirement)
        .map_err(|e| ResolveError::invalid_constraint(raw, e.to_string()))?;

    Ok(ParsedConstraint {
        kind,
        raw: raw.to_string(),
        base_version,
        range,
        max_allowed_impact,
    })
}

/// Upper bound follows the number of components written:
/// `~> 5` allows anything from 5.0.0, `~> 5.0` stays below 6.0.0 and
/// `~> 5.0.3` stays below 5.1.0.
fn pessimistic_requirement(base: &str, version: &Version) -> (String, Impact) {
    let core = base.split(['-', '+']).next().unwrap_or(base);
    match core.split('.').count() {
        1 => (format!(">={version}"), Impact::Major),
        2 => (
            format!(">={version}, <{}.0.0", version.major + 1),
            Impact::Minor,
        ),
        _ => (
            format!(">={version}, <{}.{}.0", version.major, version.minor + 1),
            Impact::Patch,
        ),
    }
}

fn parse_range(raw: &str, trimmed: &str) -> Result<ParsedConstraint, ResolveError> {
    let range = VersionReq::parse(trimmed)
        .map_err(|e| ResolveError::invalid_constraint(raw, e.to_string()))?;

    let base_version = range
        .comparators
        .iter()
        .find(|c| matches!(c.op, semver::Op::GreaterEq | semver::Op::Greater))
        .map(|c| {
            let mut v = Version::new(c.major, c.minor.unwrap_or(0), c.patch.unwrap_or(0));
            v.pre = c.pre.clone();
            v
        })
        .unwrap_or_else(|| Version::new(0, 0, 0));

    Ok(ParsedConstraint {
        kind: ConstraintKind::Range,
        raw: raw.to_string(),
        base_version,
        range,
        max_allowed_impact: Impact::Major,
    })
}
