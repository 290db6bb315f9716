//! package.json integration for Node.js projects
//!
//! Handles:
//! - dependencies
//! - devDependencies
//! - peerDependencies
//! - optionalDependencies
//!
//! Specs that do not point at the npm registry (`file:`, git URLs,
//! `workspace:`, tags such as `latest`, compound ranges) are left out.

use super::command::{detect_node_lockfile, run_native};
use super::{detect_manifests, manifest_text, plan_manifest, Integration, IntegrationDeps};
use crate::domain::{ApplyResult, Dependency, DependencyType, Manifest, PlanStrategy, UpdatePlan};
use crate::error::IntegrationError;
use crate::output::line_diff;
use crate::resolve::{is_valid_semver, strip_constraint_prefix, PlanContext};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::path::Path;
use tokio_util::sync::CancellationToken;

const MANIFEST_FILE: &str = "package.json";

/// Sections of package.json and the dependency type of their entries
const SECTIONS: &[(&str, DependencyType)] = &[
    ("dependencies", DependencyType::Production),
    ("devDependencies", DependencyType::Development),
    ("peerDependencies", DependencyType::Peer),
    ("optionalDependencies", DependencyType::Optional),
];

/// Prefixes of specs resolved outside the registry
const NON_REGISTRY_PREFIXES: &[&str] = &[
    "file:", "link:", "portal:", "workspace:", "npm:", "git", "github:", "http:", "https:",
];

/// Integration for package.json manifests
pub struct NpmIntegration {
    deps: IntegrationDeps,
}

impl NpmIntegration {
    pub fn new(deps: IntegrationDeps) -> Self {
        Self { deps }
    }

    fn strategy_for(&self, manifest: &Manifest) -> PlanStrategy {
        let has_lockfile = manifest
            .path
            .parent()
            .and_then(detect_node_lockfile)
            .is_some();
        if self.deps.refresh_lockfiles && has_lockfile {
            PlanStrategy::NativeCommand
        } else {
            PlanStrategy::CustomRewrite
        }
    }
}

/// Parse the registry dependencies of a package.json
pub fn parse_package_json(content: &str, path: &Path) -> Result<Vec<Dependency>, IntegrationError> {
    let json: Value = serde_json::from_str(content)
        .map_err(|e| IntegrationError::parse_error(path, e.to_string()))?;

    let mut dependencies = Vec::new();
    for (section, dep_type) in SECTIONS {
        if let Some(entries) = json.get(*section).and_then(Value::as_object) {
            collect_section(entries, dep_type, &mut dependencies);
        }
    }
    Ok(dependencies)
}

fn collect_section(entries: &Map<String, Value>, dep_type: &DependencyType, output: &mut Vec<Dependency>) {
    for (name, value) in entries {
        let Some(spec) = value.as_str().map(str::trim) else {
            continue;
        };
        if !is_registry_spec(spec) {
            tracing::trace!(dependency = %name, spec, "skipping non-registry spec");
            continue;
        }
        let current = strip_constraint_prefix(spec);
        output.push(Dependency::new(
            name.clone(),
            current,
            spec,
            dep_type.clone(),
            "npm",
        ));
    }
}

fn is_registry_spec(spec: &str) -> bool {
    if spec.is_empty() || spec.contains("||") || spec.contains(char::is_whitespace) {
        return false;
    }
    if NON_REGISTRY_PREFIXES.iter().any(|p| spec.starts_with(p)) || spec.contains('/') {
        return false;
    }
    is_valid_semver(strip_constraint_prefix(spec))
}

/// Replace the spec of `name` wherever it equals `old_spec`
fn rewrite_spec(content: &str, name: &str, old_spec: &str, new_spec: &str) -> Option<String> {
    let pattern = format!(
        r#"("{}"\s*:\s*)"{}""#,
        regex::escape(name),
        regex::escape(old_spec)
    );
    let re = Regex::new(&pattern).ok()?;
    if !re.is_match(content) {
        return None;
    }
    let replaced = re.replace_all(content, |caps: &regex::Captures| {
        format!(r#"{}"{}""#, &caps[1], new_spec)
    });
    Some(replaced.into_owned())
}

#[async_trait]
impl Integration for NpmIntegration {
    fn name(&self) -> &str {
        "npm"
    }

    async fn detect(
        &self,
        ctx: &CancellationToken,
        repo_root: &Path,
    ) -> Result<Vec<Manifest>, IntegrationError> {
        detect_manifests(
            ctx,
            repo_root,
            self.name(),
            |file| file == MANIFEST_FILE,
            parse_package_json,
        )
        .await
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
            self.strategy_for(manifest),
        )
        .await
    }

    async fn apply(
        &self,
        ctx: &CancellationToken,
        plan: &UpdatePlan,
    ) -> Result<ApplyResult, IntegrationError> {
        let path = &plan.manifest.path;
        let mut result = ApplyResult::new(path);

        let before = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| IntegrationError::read_error(path, e))?;
        let mut after = before.clone();

        for update in &plan.updates {
            let Some(new_spec) = manifest_text(update) else {
                tracing::debug!(dependency = update.name(), "lockfile-only update, manifest untouched");
                continue;
            };
            match rewrite_spec(&after, update.name(), &update.dependency.constraint, &new_spec) {
                Some(rewritten) => {
                    after = rewritten;
                    result.applied += 1;
                }
                None => result.record_failure(format!(
                    "{}: spec '{}' not found in {}",
                    update.name(),
                    update.dependency.constraint,
                    MANIFEST_FILE
                )),
            }
        }

        if after != before {
            tokio::fs::write(path, &after)
                .await
                .map_err(|e| IntegrationError::write_error(path, e))?;
            result.manifest_diff = line_diff(path, &before, &after);
        }

        if plan.strategy == PlanStrategy::NativeCommand && result.applied > 0 {
            if let Some(refresh) = path.parent().and_then(detect_node_lockfile) {
                let lock_before = tokio::fs::read_to_string(&refresh.lockfile)
                    .await
                    .unwrap_or_default();
                let dir = path.parent().unwrap_or(Path::new("."));
                match run_native(ctx, refresh.program, refresh.args, dir).await {
                    Ok(_) => {
                        let lock_after = tokio::fs::read_to_string(&refresh.lockfile)
                            .await
                            .unwrap_or_default();
                        result.lockfile_diff = line_diff(&refresh.lockfile, &lock_before, &lock_after);
                    }
                    Err(IntegrationError::Cancelled) => return Err(IntegrationError::Cancelled),
                    Err(e) => result.errors.push(format!("lockfile refresh: {e}")),
                }
            }
        }

        tracing::debug!(path = %path.display(), applied = result.applied, failed = result.failed, "applied package.json plan");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IntegrationPolicy, VersioningStrategy};
    use crate::datasource::{DatasourceRegistry, MockDatasource, PackageInfo, ReleaseInfo};
    use crate::integration::test_support::registry_with;
    use crate::integration::RELATIVE_PATH_KEY;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    const PACKAGE_JSON: &str = r#"{
  "name": "web",
  "dependencies": {
    "lodash": "^4.17.20",
    "express": "~4.18.2",
    "local": "file:../local",
    "react": "latest"
  },
  "devDependencies": {
    "typescript": "5.0.0",
    "range": ">=1.0.0 <2.0.0"
  },
  "peerDependencies": {
    "react-dom": ">=18.0.0"
  }
}
"#;

    fn integration(registry: DatasourceRegistry) -> NpmIntegration {
        NpmIntegration::new(IntegrationDeps::new(Arc::new(registry)))
    }

    fn versions(list: &[&str]) -> PackageInfo {
        PackageInfo {
            releases: list.iter().map(|v| ReleaseInfo::new(*v, None)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_sections() {
        let deps = parse_package_json(PACKAGE_JSON, Path::new("package.json")).unwrap();
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names.len(), 4);
        assert!(!names.contains(&"local"));
        assert!(!names.contains(&"react"));
        assert!(!names.contains(&"range"));

        let lodash = deps.iter().find(|d| d.name == "lodash").unwrap();
        assert_eq!(lodash.current_version, "4.17.20");
        assert_eq!(lodash.constraint, "^4.17.20");
        assert_eq!(lodash.dep_type, DependencyType::Production);
        assert_eq!(lodash.registry, "npm");

        let ts = deps.iter().find(|d| d.name == "typescript").unwrap();
        assert_eq!(ts.dep_type, DependencyType::Development);

        let peer = deps.iter().find(|d| d.name == "react-dom").unwrap();
        assert_eq!(peer.dep_type, DependencyType::Peer);
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = parse_package_json("{ not json", Path::new("package.json"));
        assert!(matches!(result, Err(IntegrationError::ParseError { .. })));
    }

    #[test]
    fn test_rewrite_spec_preserves_formatting() {
        let rewritten = rewrite_spec(PACKAGE_JSON, "lodash", "^4.17.20", "^4.17.21").unwrap();
        assert!(rewritten.contains(r#""lodash": "^4.17.21""#));
        assert!(rewritten.contains(r#""express": "~4.18.2""#));
        assert!(rewrite_spec(PACKAGE_JSON, "lodash", "^9.9.9", "^10.0.0").is_none());
    }

    #[tokio::test]
    async fn test_detect_sets_relative_path() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("apps/web")).unwrap();
        fs::write(temp.path().join("apps/web/package.json"), PACKAGE_JSON).unwrap();
        fs::write(temp.path().join("broken.json"), "{").unwrap();

        let npm = integration(DatasourceRegistry::new());
        let manifests = npm.detect(&CancellationToken::new(), temp.path()).await.unwrap();

        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].manifest_type, "npm");
        assert_eq!(manifests[0].path, temp.path().join("apps/web/package.json"));
        assert_eq!(manifests[0].metadata[RELATIVE_PATH_KEY], "apps/web/package.json");
    }

    #[tokio::test]
    async fn test_plan_and_apply() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("package.json");
        fs::write(&path, PACKAGE_JSON).unwrap();

        let mut ds = MockDatasource::new();
        ds.expect_get_package_info().returning(|pkg| {
            Ok(match pkg {
                "lodash" => versions(&["4.17.20", "4.17.21", "5.0.0"]),
                "express" => versions(&["4.18.2", "4.18.3", "4.19.0"]),
                _ => versions(&[]),
            })
        });
        let npm = integration(registry_with("npm", ds));
        let ctx = CancellationToken::new();

        let manifests = npm.detect(&ctx, temp.path()).await.unwrap();
        let plan = npm.plan(&ctx, &manifests[0], &PlanContext::default()).await.unwrap();
        assert_eq!(plan.strategy, PlanStrategy::CustomRewrite);

        let mut targets: Vec<_> = plan
            .updates
            .iter()
            .map(|u| (u.name().to_string(), u.target_version.clone()))
            .collect();
        targets.sort();
        assert_eq!(
            targets,
            vec![
                ("express".to_string(), "4.18.3".to_string()),
                ("lodash".to_string(), "4.17.21".to_string())
            ]
        );

        let result = npm.apply(&ctx, &plan).await.unwrap();
        assert_eq!(result.applied, 2);
        assert_eq!(result.failed, 0);
        assert!(result.manifest_diff.is_some());

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains(r#""lodash": "^4.17.21""#));
        assert!(written.contains(r#""express": "~4.18.3""#));
        assert!(written.contains(r#""local": "file:../local""#));
    }

    #[tokio::test]
    async fn test_apply_lockfile_only_leaves_manifest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("package.json");
        fs::write(&path, PACKAGE_JSON).unwrap();

        let mut ds = MockDatasource::new();
        ds.expect_get_package_info()
            .returning(|_| Ok(versions(&["4.17.21"])));
        let npm = integration(registry_with("npm", ds));
        let ctx = CancellationToken::new();

        let manifest = Manifest::new(
            &path,
            "npm",
            vec![Dependency::new("lodash", "4.17.20", "^4.17.20", DependencyType::Production, "npm")],
            PACKAGE_JSON,
        );
        let policy = IntegrationPolicy {
            versioning_strategy: Some(VersioningStrategy::LockfileOnly),
            ..Default::default()
        };
        let plan = npm
            .plan(&ctx, &manifest, &PlanContext::new(Some(policy), None))
            .await
            .unwrap();
        assert_eq!(plan.updates.len(), 1);

        let result = npm.apply(&ctx, &plan).await.unwrap();
        assert_eq!(result.applied, 0);
        assert!(result.manifest_diff.is_none());
        assert_eq!(fs::read_to_string(&path).unwrap(), PACKAGE_JSON);
    }

    #[tokio::test]
    async fn test_apply_records_missing_spec() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("package.json");
        fs::write(&path, PACKAGE_JSON).unwrap();

        let dep = Dependency::new("vue", "3.0.0", "^3.0.0", DependencyType::Production, "npm");
        let mut plan = UpdatePlan::new(
            Manifest::new(PathBuf::from(&path), "npm", vec![dep.clone()], ""),
            PlanStrategy::CustomRewrite,
        );
        plan.updates.push(crate::domain::Update::new(dep, "3.4.0", crate::domain::Impact::Minor));

        let npm = integration(DatasourceRegistry::new());
        let result = npm.apply(&CancellationToken::new(), &plan).await.unwrap();
        assert_eq!(result.failed, 1);
        assert!(result.errors[0].starts_with("vue:"));
    }

    #[test]
    fn test_strategy_uses_lockfile_when_refresh_enabled() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("package-lock.json"), "{}").unwrap();
        let manifest = Manifest::new(temp.path().join("package.json"), "npm", vec![], "");

        let plain = integration(DatasourceRegistry::new());
        assert_eq!(plain.strategy_for(&manifest), PlanStrategy::CustomRewrite);

        let refreshing = NpmIntegration::new(
            IntegrationDeps::new(Arc::new(DatasourceRegistry::new())).with_refresh_lockfiles(true),
        );
        assert_eq!(refreshing.strategy_for(&manifest), PlanStrategy::NativeCommand);
    }
}
