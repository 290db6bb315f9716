//! requirements.txt integration for Python projects
//!
//! Handles version formats:
//! - Pin: `requests==2.28.0` (treated as a lockfile pin, no constraint)
//! - Compatible release: `django~=4.2` (resolved as `~> 4.2`)
//! - Minimum: `urllib3>=1.26.0`
//!
//! Extras (`name[socks]`) and environment markers are kept as written.
//! Options (`-r`, `-e`, `--index-url`), URLs and compound specifiers are
//! left out.

use super::{detect_manifests, plan_manifest, Integration, IntegrationDeps};
use crate::domain::{ApplyResult, Dependency, DependencyType, Manifest, PlanStrategy, Update, UpdatePlan};
use crate::error::IntegrationError;
use crate::output::line_diff;
use crate::resolve::{is_valid_semver, PlanContext};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;

static REQUIREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)(\[[^\]]*\])?\s*(==|~=|>=)\s*([A-Za-z0-9.+!_-]+)\s*(;.*)?$")
        .unwrap()
});

/// Integration for requirements files
pub struct PipIntegration {
    deps: IntegrationDeps,
}

impl PipIntegration {
    pub fn new(deps: IntegrationDeps) -> Self {
        Self { deps }
    }
}

/// `requirements.txt`, `requirements-dev.txt`, `requirements_test.txt`, ...
fn is_requirements_file(name: &str) -> bool {
    name.starts_with("requirements") && name.ends_with(".txt")
}

fn dependency_type_for(path: &Path) -> DependencyType {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if name.contains("dev") || name.contains("test") {
        DependencyType::Development
    } else {
        DependencyType::Production
    }
}

/// Parse the registry requirements of a requirements file
pub fn parse_requirements(content: &str, path: &Path) -> Result<Vec<Dependency>, IntegrationError> {
    let dep_type = dependency_type_for(path);
    let mut dependencies = Vec::new();

    for line in content.lines() {
        let line = strip_comment(line).trim();
        if line.is_empty() || line.starts_with('-') || line.contains("://") {
            continue;
        }
        let Some(caps) = REQUIREMENT_RE.captures(line) else {
            tracing::trace!(line, "skipping requirement");
            continue;
        };

        let name = &caps[1];
        let version = &caps[4];
        if !is_valid_semver(version) {
            continue;
        }
        let constraint = match &caps[3] {
            "~=" => format!("~> {version}"),
            ">=" => format!(">={version}"),
            _ => String::new(),
        };

        dependencies.push(Dependency::new(
            name,
            version,
            constraint,
            dep_type.clone(),
            "pypi",
        ));
    }

    Ok(dependencies)
}

fn strip_comment(line: &str) -> &str {
    match line.find(" #").or_else(|| line.starts_with('#').then_some(0)) {
        Some(index) => &line[..index],
        None => line,
    }
}

/// Rewrite the requirement line of `update`, keeping extras and markers
///
/// A bare target keeps the operator; any other value (`>=1.0`) replaces
/// operator and version together.
fn rewrite_requirement(content: &str, update: &Update, value: &str) -> Option<String> {
    // PEP 503: `-`, `_` and `.` are interchangeable, names are case-insensitive
    let name = update
        .name()
        .split(['-', '_', '.'])
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[-_.]");
    let pattern = format!(
        r"(?im)^(?P<lead>\s*{}(?:\[[^\]]*\])?\s*)(?P<op>==|~=|>=)(?P<ws>\s*){}(?P<tail>[\s;#]|$)",
        name,
        regex::escape(&update.dependency.current_version)
    );
    let re = Regex::new(&pattern).ok()?;
    if !re.is_match(content) {
        return None;
    }

    let bare = value == update.target_version;
    let replaced = re.replace_all(content, |caps: &regex::Captures| {
        if bare {
            format!("{}{}{}{}{}", &caps["lead"], &caps["op"], &caps["ws"], value, &caps["tail"])
        } else {
            format!("{}{}{}", &caps["lead"], value, &caps["tail"])
        }
    });
    Some(replaced.into_owned())
}

#[async_trait]
impl Integration for PipIntegration {
    fn name(&self) -> &str {
        "pip"
    }

    async fn detect(
        &self,
        ctx: &CancellationToken,
        repo_root: &Path,
    ) -> Result<Vec<Manifest>, IntegrationError> {
        detect_manifests(ctx, repo_root, self.name(), is_requirements_file, parse_requirements).await
    }

    async fn plan(
        &self,
        ctx: &CancellationToken,
        manifest: &Manifest,
        plan_ctx: &PlanContext,
    ) -> Result<UpdatePlan, IntegrationError> {
        plan_manifest(
            ctx,
            &self.deps.datasources,
            manifest,
            plan_ctx,
            PlanStrategy::CustomRewrite,
        )
        .await
    }

    async fn apply(
        &self,
        _ctx: &CancellationToken,
        plan: &UpdatePlan,
    ) -> Result<ApplyResult, IntegrationError> {
        let path = &plan.manifest.path;
        let mut result = ApplyResult::new(path);

        let before = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| IntegrationError::read_error(path, e))?;
        let mut after = before.clone();

        for update in &plan.updates {
            let Some(value) = update.manifest_value.as_deref() else {
                continue;
            };
            match rewrite_requirement(&after, update, value) {
                Some(rewritten) => {
                    after = rewritten;
                    result.applied += 1;
                }
                None => result.record_failure(format!(
                    "{}: requirement for {} not found",
                    update.name(),
                    update.dependency.current_version
                )),
            }
        }

        if after != before {
            tokio::fs::write(path, &after)
                .await
                .map_err(|e| IntegrationError::write_error(path, e))?;
            result.manifest_diff = line_diff(path, &before, &after);
        }

        Ok(result)
    }
}
