//! Engine coordinating the Scan, Plan and Update phases
//!
//! This module provides:
//! - Integration selection via `only`/`exclude` and per-integration match configs
//! - Bounded fan-out: one task per unit, `concurrency` units in flight
//! - Per-unit failures collected as strings; a phase never aborts as a whole
//! - Cooperative cancellation through a `CancellationToken`

use crate::config::{IntegrationPolicy, MatchConfig};
use crate::domain::{ApplyResult, Manifest, UpdatePlan};
use crate::error::IntegrationError;
use crate::integration::Integration;
use crate::resolve::{CliFlags, PlanContext};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Units of one phase running at the same time
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Result of the Scan phase
#[derive(Debug, Default, Serialize)]
pub struct ScanResult {
    /// Detected manifests, sorted by path
    pub manifests: Vec<Manifest>,
    /// One entry per failed or cancelled integration
    pub errors: Vec<String>,
}

/// Result of the Plan phase; zero-update plans are kept
#[derive(Debug, Default, Serialize)]
pub struct PlanResult {
    /// One plan per successfully planned manifest, sorted by path
    pub plans: Vec<UpdatePlan>,
    /// One entry per manifest that could not be planned
    pub errors: Vec<String>,
}

impl PlanResult {
    /// Total number of updates across all plans
    pub fn update_count(&self) -> usize {
        self.plans.iter().map(|p| p.updates.len()).sum()
    }
}

/// Result of the Update phase
///
/// `results` is `None` for a dry run, where no integration is asked to
/// apply anything.
#[derive(Debug, Default, Serialize)]
pub struct UpdateResult {
    /// Outcome of each applied plan, sorted by path
    pub results: Option<Vec<ApplyResult>>,
    /// One entry per plan whose apply call failed
    pub errors: Vec<String>,
    /// Whether this was a dry run
    pub dry_run: bool,
}

/// How a unit of work ended
enum Unit<T> {
    Finished(Result<T, IntegrationError>),
    Cancelled,
}

/// Wait for a permit, then race `work` against cancellation
///
/// Cancellation is checked first, so a cancelled token never starts work.
async fn run_unit<T, F>(ctx: &CancellationToken, semaphore: &Semaphore, work: F) -> Unit<T>
where
    F: Future<Output = Result<T, IntegrationError>>,
{
    let _permit = tokio::select! {
        biased;
        _ = ctx.cancelled() => return Unit::Cancelled,
        permit = semaphore.acquire() => match permit {
            Ok(permit) => permit,
            Err(_) => return Unit::Cancelled,
        },
    };

    tokio::select! {
        biased;
        _ = ctx.cancelled() => Unit::Cancelled,
        result = work => match result {
            Err(IntegrationError::Cancelled) => Unit::Cancelled,
            other => Unit::Finished(other),
        },
    }
}

/// Drives registered integrations through Scan, Plan and Update
///
/// Configuration setters take `&mut self` and phases take `&self`, so
/// configuration cannot change while a phase is running.
pub struct Engine {
    /// Registered integrations by name
    integrations: HashMap<String, Arc<dyn Integration>>,
    /// Update policy per integration name
    policies: HashMap<String, IntegrationPolicy>,
    /// File include/exclude patterns per integration name
    match_configs: HashMap<String, MatchConfig>,
    /// Command-line overrides applied on top of every policy
    cli_flags: Option<CliFlags>,
    /// Maximum units of one phase in flight
    concurrency: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with no integrations and the default concurrency
    pub fn new() -> Self {
        Self {
            integrations: HashMap::new(),
            policies: HashMap::new(),
            match_configs: HashMap::new(),
            cli_flags: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set the number of units per phase running at once (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Register an integration under its name; a later registration wins
    pub fn register(&mut self, integration: Arc<dyn Integration>) {
        let name = integration.name().to_string();
        tracing::debug!(integration = %name, "registered integration");
        self.integrations.insert(name, integration);
    }

    /// Registered integration names, sorted
    pub fn integration_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.integrations.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn set_policies(&mut self, policies: HashMap<String, IntegrationPolicy>) {
        self.policies = policies;
    }

    pub fn set_match_configs(&mut self, match_configs: HashMap<String, MatchConfig>) {
        self.match_configs = match_configs;
    }

    pub fn set_cli_flags(&mut self, cli_flags: Option<CliFlags>) {
        self.cli_flags = cli_flags;
    }

    /// Integrations selected by `only` and `exclude`
    ///
    /// A non-empty `only` selects exactly the named integrations that are
    /// registered (unknown names are dropped). Otherwise every integration
    /// not named in `exclude` is selected. Sorted by name.
    pub fn filter_integrations(&self, only: &[String], exclude: &[String]) -> Vec<Arc<dyn Integration>> {
        let mut selected: Vec<(&String, &Arc<dyn Integration>)> = if only.is_empty() {
            self.integrations
                .iter()
                .filter(|(name, _)| !exclude.contains(name))
                .collect()
        } else {
            self.integrations
                .iter()
                .filter(|(name, _)| only.contains(name))
                .collect()
        };
        selected.sort_by(|a, b| a.0.cmp(b.0));
        selected.into_iter().map(|(_, i)| Arc::clone(i)).collect()
    }

    fn plan_context(&self, integration: &str) -> PlanContext {
        PlanContext::new(self.policies.get(integration).cloned(), self.cli_flags.clone())
    }

    fn keep_manifest(&self, integration: &str, repo_root: &Path, manifest: &Manifest) -> bool {
        let Some(config) = self.match_configs.get(integration) else {
            return true;
        };
        let relative = manifest.relative_path(repo_root);
        config.matches(&repo_root.join(&relative), &relative)
    }

    /// Detect manifests with every selected integration
    pub async fn scan(
        &self,
        ctx: &CancellationToken,
        repo_root: &Path,
        only: &[String],
        exclude: &[String],
    ) -> ScanResult {
        let selected = self.filter_integrations(only, exclude);
        tracing::info!(
            root = %repo_root.display(),
            integrations = selected.len(),
            "scan started"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for integration in selected {
            let ctx = ctx.clone();
            let semaphore = Arc::clone(&semaphore);
            let root = repo_root.to_path_buf();
            tasks.spawn(async move {
                let name = integration.name().to_string();
                let outcome = run_unit(&ctx, &semaphore, integration.detect(&ctx, &root)).await;
                (name, outcome)
            });
        }

        let mut result = ScanResult::default();
        while let Some(joined) = tasks.join_next().await {
            let (name, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    result.errors.push(format!("scan task failed: {e}"));
                    continue;
                }
            };
            match outcome {
                Unit::Finished(Ok(manifests)) => {
                    let found = manifests.len();
                    let kept: Vec<Manifest> = manifests
                        .into_iter()
                        .filter(|m| self.keep_manifest(&name, repo_root, m))
                        .collect();
                    tracing::debug!(integration = %name, found, kept = kept.len(), "detect finished");
                    result.manifests.extend(kept);
                }
                Unit::Finished(Err(e)) => {
                    tracing::warn!(integration = %name, error = %e, "detect failed");
                    result.errors.push(format!("{name}: detect failed: {e}"));
                }
                Unit::Cancelled => result.errors.push(format!("{name}: cancelled")),
            }
        }

        // tasks finish in any order
        result.manifests.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::info!(
            manifests = result.manifests.len(),
            errors = result.errors.len(),
            "scan finished"
        );
        result
    }

    /// Plan every manifest with the integration owning its type
    pub async fn plan(&self, ctx: &CancellationToken, manifests: &[Manifest]) -> PlanResult {
        tracing::info!(manifests = manifests.len(), "plan started");

        let mut result = PlanResult::default();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for manifest in manifests {
            let Some(integration) = self.integrations.get(&manifest.manifest_type) else {
                result.errors.push(format!(
                    "{}: no integration registered for type {}",
                    manifest.path.display(),
                    manifest.manifest_type
                ));
                continue;
            };

            let integration = Arc::clone(integration);
            let plan_ctx = self.plan_context(&manifest.manifest_type);
            let manifest = manifest.clone();
            let ctx = ctx.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let outcome =
                    run_unit(&ctx, &semaphore, integration.plan(&ctx, &manifest, &plan_ctx)).await;
                (manifest.path.display().to_string(), outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (path, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    result.errors.push(format!("plan task failed: {e}"));
                    continue;
                }
            };
            match outcome {
                Unit::Finished(Ok(plan)) => {
                    tracing::debug!(path = %path, updates = plan.updates.len(), "plan finished");
                    result.plans.push(plan);
                }
                Unit::Finished(Err(e)) => {
                    tracing::warn!(path = %path, error = %e, "plan failed");
                    result.errors.push(format!("{path}: plan failed: {e}"));
                }
                Unit::Cancelled => result.errors.push(format!("{path}: cancelled")),
            }
        }

        result.plans.sort_by(|a, b| a.manifest.path.cmp(&b.manifest.path));
        tracing::info!(
            plans = result.plans.len(),
            updates = result.update_count(),
            errors = result.errors.len(),
            "plan finished"
        );
        result
    }

    /// Apply plans; a dry run returns at once without calling any integration
    pub async fn update(
        &self,
        ctx: &CancellationToken,
        plans: &[UpdatePlan],
        dry_run: bool,
    ) -> UpdateResult {
        if dry_run {
            tracing::info!(plans = plans.len(), "dry run, nothing applied");
            return UpdateResult {
                results: None,
                errors: Vec::new(),
                dry_run: true,
            };
        }

        tracing::info!(plans = plans.len(), "update started");
        let mut errors = Vec::new();
        let mut results = Vec::new();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for plan in plans {
            let manifest = &plan.manifest;
            let Some(integration) = self.integrations.get(&manifest.manifest_type) else {
                errors.push(format!(
                    "{}: no integration registered for type {}",
                    manifest.path.display(),
                    manifest.manifest_type
                ));
                continue;
            };

            let integration = Arc::clone(integration);
            let plan = plan.clone();
            let ctx = ctx.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let outcome = run_unit(&ctx, &semaphore, integration.apply(&ctx, &plan)).await;
                (plan.manifest.path.display().to_string(), outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (path, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    errors.push(format!("update task failed: {e}"));
                    continue;
                }
            };
            match outcome {
                Unit::Finished(Ok(applied)) => {
                    tracing::debug!(path = %path, applied = applied.applied, failed = applied.failed, "apply finished");
                    results.push(applied);
                }
                Unit::Finished(Err(e)) => {
                    tracing::warn!(path = %path, error = %e, "apply failed");
                    errors.push(format!("{path}: apply failed: {e}"));
                }
                Unit::Cancelled => errors.push(format!("{path}: cancelled")),
            }
        }

        results.sort_by(|a, b| a.manifest_path.cmp(&b.manifest_path));
        tracing::info!(
            results = results.len(),
            errors = errors.len(),
            "update finished"
        );
        UpdateResult {
            results: Some(results),
            errors,
            dry_run: false,
        }
    }
}
