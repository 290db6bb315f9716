//! Ecosystem integrations
//!
//! This module provides:
//! - The `Integration` contract driven by the engine (detect, plan, apply)
//! - `IntegrationRegistry`, named factories instantiated at startup
//! - Shared planning: version selection, filtering, grouping, commit message
//! - npm, pip and Dockerfile integrations

pub mod command;
mod dockerfile;
mod npm;
mod pip;
mod walk;

pub use dockerfile::DockerfileIntegration;
pub use npm::NpmIntegration;
pub use pip::PipIntegration;
pub use walk::{walk_manifests, RELATIVE_PATH_KEY, SKIPPED_DIRS};

use crate::datasource::DatasourceRegistry;
use crate::domain::{ApplyResult, Dependency, Manifest, PlanStrategy, Update, UpdatePlan};
use crate::error::IntegrationError;
use crate::resolve::{select_version_with_context, PlanContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;

/// One manifest format the engine can detect, plan and apply
#[async_trait]
pub trait Integration: Send + Sync {
    /// Name used for registration, policies and `--only`/`--exclude`
    fn name(&self) -> &str;

    /// Find every manifest of this format below `repo_root`
    async fn detect(
        &self,
        ctx: &CancellationToken,
        repo_root: &Path,
    ) -> Result<Vec<Manifest>, IntegrationError>;

    /// Compute the updates for one manifest
    async fn plan(
        &self,
        ctx: &CancellationToken,
        manifest: &Manifest,
        plan_ctx: &PlanContext,
    ) -> Result<UpdatePlan, IntegrationError>;

    /// Write a plan to disk
    async fn apply(
        &self,
        ctx: &CancellationToken,
        plan: &UpdatePlan,
    ) -> Result<ApplyResult, IntegrationError>;

    /// Semantic check of a manifest; not called by the engine
    async fn validate(
        &self,
        _ctx: &CancellationToken,
        _manifest: &Manifest,
    ) -> Result<(), IntegrationError> {
        Ok(())
    }
}

/// Shared services handed to integration factories
#[derive(Clone)]
pub struct IntegrationDeps {
    /// Datasources looked up by `Dependency::registry`
    pub datasources: Arc<DatasourceRegistry>,
    /// Run the ecosystem's lockfile refresh after rewriting a manifest
    pub refresh_lockfiles: bool,
}

impl IntegrationDeps {
    pub fn new(datasources: Arc<DatasourceRegistry>) -> Self {
        Self {
            datasources,
            refresh_lockfiles: false,
        }
    }

    pub fn with_refresh_lockfiles(mut self, refresh: bool) -> Self {
        self.refresh_lockfiles = refresh;
        self
    }
}

/// Constructor registered under an integration name
pub type IntegrationFactory = Arc<dyn Fn(&IntegrationDeps) -> Arc<dyn Integration> + Send + Sync>;

/// Name-keyed integration factories
///
/// Registering a name twice replaces the earlier factory.
#[derive(Default)]
pub struct IntegrationRegistry {
    factories: RwLock<HashMap<String, IntegrationFactory>>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the integrations shipped with depflow
    pub fn builtin() -> Self {
        let registry = Self::new();
        registry.register("npm", |deps: &IntegrationDeps| -> Arc<dyn Integration> {
            Arc::new(NpmIntegration::new(deps.clone()))
        });
        registry.register("pip", |deps: &IntegrationDeps| -> Arc<dyn Integration> {
            Arc::new(PipIntegration::new(deps.clone()))
        });
        registry.register("dockerfile", |deps: &IntegrationDeps| -> Arc<dyn Integration> {
            Arc::new(DockerfileIntegration::new(deps.clone()))
        });
        registry
    }

    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&IntegrationDeps) -> Arc<dyn Integration> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        if factories.insert(name.clone(), Arc::new(factory)).is_some() {
            tracing::debug!(integration = %name, "replaced integration factory");
        }
    }

    pub fn get(&self, name: &str) -> Option<IntegrationFactory> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn instantiate(&self, name: &str, deps: &IntegrationDeps) -> Option<Arc<dyn Integration>> {
        self.get(name).map(|factory| factory(deps))
    }

    /// One instance of every registered integration
    pub fn instantiate_all(&self, deps: &IntegrationDeps) -> Vec<Arc<dyn Integration>> {
        self.list()
            .iter()
            .filter_map(|name| self.instantiate(name, deps))
            .collect()
    }
}

/// Path shown to users: repo-relative when the walker recorded it
pub fn display_path(manifest: &Manifest) -> PathBuf {
    manifest
        .metadata
        .get(RELATIVE_PATH_KEY)
        .map(PathBuf::from)
        .unwrap_or_else(|| manifest.path.clone())
}

/// Walk `repo_root`, read every accepted file and parse its dependencies
///
/// A file that fails to parse is logged and left out; the others are still
/// returned.
pub(crate) async fn detect_manifests<A, P>(
    ctx: &CancellationToken,
    repo_root: &Path,
    manifest_type: &str,
    accept: A,
    parse: P,
) -> Result<Vec<Manifest>, IntegrationError>
where
    A: Fn(&str) -> bool,
    P: Fn(&str, &Path) -> Result<Vec<Dependency>, IntegrationError>,
{
    let mut manifests = Vec::new();
    for (path, relative) in walk_manifests(repo_root, accept)? {
        if ctx.is_cancelled() {
            return Err(IntegrationError::Cancelled);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| IntegrationError::read_error(&path, e))?;
        let dependencies = match parse(&content, &path) {
            Ok(deps) => deps,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unparsable manifest");
                continue;
            }
        };

        manifests.push(
            Manifest::new(path, manifest_type, dependencies, content)
                .with_metadata(RELATIVE_PATH_KEY, relative.to_string_lossy()),
        );
    }

    tracing::debug!(
        integration = manifest_type,
        manifests = manifests.len(),
        "detected manifests"
    );
    Ok(manifests)
}

/// Operator in front of the version in a constraint (`^`, `>=`, ...)
pub(crate) fn operator_prefix(constraint: &str) -> &str {
    let trimmed = constraint.trim();
    let end = trimmed
        .find(|c: char| c.is_ascii_digit() || c == 'v')
        .unwrap_or(trimmed.len());
    trimmed[..end].trim_end()
}

/// Text to write for an update, keeping the manifest's operator
///
/// `None` when the versioning strategy leaves the manifest alone. A value
/// other than the bare target (`widen`) is written verbatim.
pub(crate) fn manifest_text(update: &Update) -> Option<String> {
    let value = update.manifest_value.as_ref()?;
    if *value == update.target_version {
        Some(format!("{}{}", operator_prefix(&update.dependency.constraint), value))
    } else {
        Some(value.clone())
    }
}

/// Plan every dependency of `manifest` against its datasource
///
/// Lookup and resolver failures of a single dependency land in
/// `plan.skipped`; only cancellation aborts the manifest. Surviving updates
/// go through the policy's filter, grouping, commit message and versioning
/// strategy. A `manifest_value` of `None` means the manifest text is left
/// alone.
pub(crate) async fn plan_manifest(
    ctx: &CancellationToken,
    datasources: &DatasourceRegistry,
    manifest: &Manifest,
    plan_ctx: &PlanContext,
    strategy: PlanStrategy,
) -> Result<UpdatePlan, IntegrationError> {
    plan_manifest_with(ctx, datasources, manifest, plan_ctx, strategy, |_| true).await
}

/// [`plan_manifest`] considering only releases for which `keep_release` holds
pub(crate) async fn plan_manifest_with(
    ctx: &CancellationToken,
    datasources: &DatasourceRegistry,
    manifest: &Manifest,
    plan_ctx: &PlanContext,
    strategy: PlanStrategy,
    keep_release: fn(&str) -> bool,
) -> Result<UpdatePlan, IntegrationError> {
    let mut plan = UpdatePlan::new(manifest.clone(), strategy);
    let mut candidates = Vec::new();
    let mut release_timestamps: HashMap<String, DateTime<Utc>> = HashMap::new();

    for dependency in &manifest.dependencies {
        if ctx.is_cancelled() {
            return Err(IntegrationError::Cancelled);
        }

        let datasource = match datasources.require(&dependency.registry) {
            Ok(datasource) => datasource,
            Err(e) => {
                plan.skipped.insert(dependency.name.clone(), e.to_string());
                continue;
            }
        };

        let info = tokio::select! {
            _ = ctx.cancelled() => return Err(IntegrationError::Cancelled),
            info = datasource.get_package_info(&dependency.name) => info,
        };
        let mut info = match info {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(dependency = %dependency.name, error = %e, "version lookup failed");
                plan.skipped
                    .insert(dependency.name.clone(), format!("lookup failed: {e}"));
                continue;
            }
        };
        info.releases.retain(|release| keep_release(&release.version));

        let selected = match select_version_with_context(
            &dependency.current_version,
            &dependency.constraint,
            &info.versions(),
            plan_ctx,
        ) {
            Ok(Some(selected)) => selected,
            Ok(None) => continue,
            Err(e) => {
                plan.skipped.insert(dependency.name.clone(), e.to_string());
                continue;
            }
        };

        let mut update = Update::new(dependency.clone(), selected.version, selected.impact)
            .with_policy_source(plan_ctx.policy_source());
        if let Some(url) = info.repository.as_ref().or(info.homepage.as_ref()) {
            update = update.with_changelog(url.clone());
        }
        if let Some(published) = info.published_at(&update.target_version) {
            release_timestamps.insert(update.release_key(), published);
        }
        candidates.push(update);
    }

    let filter = plan_ctx.update_filter();
    let (kept, reasons) = filter.filter_updates(candidates, &release_timestamps);
    plan.skipped.extend(reasons);

    let (grouped, ungrouped) = filter.group_updates(kept);
    let mut updates: Vec<Update> = grouped.into_values().flatten().collect();
    updates.extend(ungrouped);

    if !updates.is_empty() {
        plan.commit_message = Some(filter.format_commit_message(&updates, &display_path(manifest)));
    }

    for update in &mut updates {
        let (value, write) = filter.apply_versioning_strategy(update, &update.dependency.constraint);
        update.manifest_value = write.then_some(value);
    }

    tracing::debug!(
        manifest = %manifest.path.display(),
        updates = updates.len(),
        skipped = plan.skipped.len(),
        "planned manifest"
    );
    plan.updates = updates;
    Ok(plan)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::datasource::{Datasource, DatasourceRegistry, MockDatasource, PackageInfo};
    use crate::error::RegistryError;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// `MockDatasource` registered under a fixed name
    pub struct NamedMock(pub &'static str, pub MockDatasource);

    #[async_trait]
    impl Datasource for NamedMock {
        fn name(&self) -> &str {
            self.0
        }

        async fn get_package_info(&self, package: &str) -> Result<PackageInfo, RegistryError> {
            self.1.get_package_info(package).await
        }
    }

    pub fn registry_with(name: &'static str, ds: MockDatasource) -> DatasourceRegistry {
        let registry = DatasourceRegistry::new();
        registry.register(Arc::new(NamedMock(name, ds)));
        registry
    }
}
