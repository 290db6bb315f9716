//! Dockerfile integration for base images
//!
//! Handles `FROM [--platform=...] image:tag [AS stage]` lines. Only numeric
//! tags on Docker Hub (`nginx:1.25`, `bitnami/redis:7.2.4`) are tracked;
//! `latest`, variant tags (`1.25-alpine`), digests, build args and images
//! on other registries are left alone.

use super::{detect_manifests, plan_manifest_with, Integration, IntegrationDeps};
use crate::domain::{ApplyResult, Dependency, DependencyType, Manifest, PlanStrategy, Update, UpdatePlan};
use crate::error::IntegrationError;
use crate::output::line_diff;
use crate::resolve::PlanContext;
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;

static FROM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*FROM\s+(?:--platform=\S+\s+)?(\S+)(?:\s+AS\s+\S+)?\s*$").unwrap()
});

static NUMERIC_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?\d+(?:\.\d+){0,2}$").unwrap());

/// Integration for Dockerfiles
pub struct DockerfileIntegration {
    deps: IntegrationDeps,
}

impl DockerfileIntegration {
    pub fn new(deps: IntegrationDeps) -> Self {
        Self { deps }
    }
}

fn is_numeric_tag(tag: &str) -> bool {
    NUMERIC_TAG_RE.is_match(tag)
}

/// `Dockerfile`, `Dockerfile.prod`, `api.dockerfile`
fn is_dockerfile(name: &str) -> bool {
    name == "Dockerfile" || name.starts_with("Dockerfile.") || name.ends_with(".dockerfile")
}

/// Split `image:tag`; `None` for untagged, digest-pinned or templated images
fn split_reference(reference: &str) -> Option<(&str, &str)> {
    if reference.contains('$') || reference.contains('@') {
        return None;
    }
    let slash = reference.rfind('/').map_or(0, |i| i + 1);
    let colon = reference[slash..].find(':')? + slash;
    Some((&reference[..colon], &reference[colon + 1..]))
}

/// True when the first path component names a registry host
fn has_registry_host(image: &str) -> bool {
    match image.split_once('/') {
        Some((first, _)) => first.contains('.') || first.contains(':') || first == "localhost",
        None => false,
    }
}

/// Parse the trackable base images of a Dockerfile
pub fn parse_dockerfile(content: &str, _path: &Path) -> Result<Vec<Dependency>, IntegrationError> {
    let mut dependencies: Vec<Dependency> = Vec::new();

    for line in content.lines() {
        let Some(caps) = FROM_RE.captures(line) else {
            continue;
        };
        let reference = &caps[1];
        let Some((image, tag)) = split_reference(reference) else {
            tracing::trace!(reference, "untracked base image");
            continue;
        };
        if has_registry_host(image) || !is_numeric_tag(tag) {
            tracing::trace!(reference, "untracked base image");
            continue;
        }
        if dependencies
            .iter()
            .any(|d| d.name == image && d.current_version == tag)
        {
            continue;
        }

        dependencies.push(Dependency::new(
            image,
            tag,
            "",
            DependencyType::Image,
            "docker-hub",
        ));
    }

    Ok(dependencies)
}

fn rewrite_from(content: &str, update: &Update) -> Option<String> {
    let pattern = format!(
        r"(?im)^(?P<lead>\s*FROM\s+(?:--platform=\S+\s+)?){}:{}(?P<tail>\s|$)",
        regex::escape(update.name()),
        regex::escape(&update.dependency.current_version)
    );
    let re = Regex::new(&pattern).ok()?;
    if !re.is_match(content) {
        return None;
    }
    let replaced = re.replace_all(content, |caps: &regex::Captures| {
        format!(
            "{}{}:{}{}",
            &caps["lead"],
            update.name(),
            update.target_version,
            &caps["tail"]
        )
    });
    Some(replaced.into_owned())
}

#[async_trait]
impl Integration for DockerfileIntegration {
    fn name(&self) -> &str {
        "dockerfile"
    }

    async fn detect(
        &self,
        ctx: &CancellationToken,
        repo_root: &Path,
    ) -> Result<Vec<Manifest>, IntegrationError> {
        detect_manifests(ctx, repo_root, self.name(), is_dockerfile, parse_dockerfile).await
    }

    async fn plan(
        &self,
        ctx: &CancellationToken,
        manifest: &Manifest,
        plan_ctx: &PlanContext,
    ) -> Result<UpdatePlan, IntegrationError> {
        // Variant tags (`1.27-alpine`) would read as prereleases of another image
        plan_manifest_with(
            ctx,
            &self.deps.datasources,
            manifest,
            plan_ctx,
            PlanStrategy::CustomRewrite,
            is_numeric_tag,
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

        // Image tags are exact; any manifest write means the new tag
        for update in plan.updates.iter().filter(|u| u.manifest_value.is_some()) {
            match rewrite_from(&after, update) {
                Some(rewritten) => {
                    after = rewritten;
                    result.applied += 1;
                }
                None => result.record_failure(format!(
                    "{}: FROM {}:{} not found",
                    update.name(),
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
