//! Target version selection

use super::constraint::parse_constraint;
use super::context::PlanContext;
use super::version::{determine_impact, parse_lenient, strip_constraint_prefix};
use crate::domain::Impact;
use crate::error::ResolveError;
use semver::Version;
use serde::{Deserialize, Serialize};

/// The version chosen for a dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedVersion {
    /// Version string exactly as the registry reported it
    pub version: String,
    /// Severity relative to the current version
    pub impact: Impact,
}

/// Pick the highest permitted upgrade for a dependency
///
/// Returns `Ok(None)` when nothing qualifies. Only an unparsable current
/// version, or an enforced constraint that cannot be parsed, is an error;
/// unparsable entries in `available` are skipped.
///
/// Order of checks:
/// 1. `pin` in the policy means no update
/// 2. the current version is parsed after stripping operators
/// 3. the manifest constraint applies only without an explicit update level
/// 4. candidates must parse, be newer, be stable (unless pre-releases are
///    allowed) and satisfy the enforced constraint
/// 5. the highest candidate whose impact the update level permits wins
pub fn select_version_with_context(
    current_version: &str,
    constraint: &str,
    available_versions: &[String],
    plan_ctx: &PlanContext,
) -> Result<Option<SelectedVersion>, ResolveError> {
    if plan_ctx.is_pinned() {
        tracing::trace!(current = current_version, "pinned by policy");
        return Ok(None);
    }

    let stripped = strip_constraint_prefix(current_version);
    let current = parse_lenient(stripped).ok_or_else(|| {
        ResolveError::invalid_version(current_version, "not a valid semantic version")
    })?;

    let enforced = if plan_ctx.enforces_constraint() && !constraint.trim().is_empty() {
        Some(parse_constraint(constraint)?)
    } else {
        None
    };

    let allow_prerelease = plan_ctx.effective_allow_prerelease();
    let mut candidates: Vec<(Version, &String)> = available_versions
        .iter()
        .filter_map(|raw| parse_lenient(raw).map(|v| (v, raw)))
        .filter(|(v, _)| allow_prerelease || v.pre.is_empty())
        .filter(|(v, _)| *v > current)
        .filter(|(v, _)| enforced.as_ref().map_or(true, |c| c.allows(v)))
        .collect();

    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    let level = plan_ctx.effective_update_level();
    for (version, raw) in candidates {
        let impact = determine_impact(&current, &version);
        if level.permits(impact) {
            tracing::trace!(
                current = current_version,
                target = raw.as_str(),
                impact = %impact,
                "selected version"
            );
            return Ok(Some(SelectedVersion {
                version: raw.clone(),
                impact,
            }));
        }
        tracing::trace!(target = raw.as_str(), impact = %impact, level = %level, "impact not permitted");
    }

    Ok(None)
}
