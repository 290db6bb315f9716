//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use depflow::datasource::{Datasource, DatasourceRegistry, PackageInfo, ReleaseInfo};
use depflow::domain::{ApplyResult, Dependency, DependencyType, Manifest, PlanStrategy, UpdatePlan};
use depflow::error::{IntegrationError, RegistryError};
use depflow::integration::Integration;
use depflow::resolve::PlanContext;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Datasource answering from a fixed version table
pub struct StubDatasource {
    name: &'static str,
    packages: HashMap<String, Vec<String>>,
    pub lookups: AtomicUsize,
}

impl StubDatasource {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            packages: HashMap::new(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn with_package(mut self, package: &str, versions: &[&str]) -> Self {
        self.packages.insert(
            package.to_string(),
            versions.iter().map(|v| v.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl Datasource for StubDatasource {
    fn name(&self) -> &str {
        self.name
    }

    async fn get_package_info(&self, package: &str) -> Result<PackageInfo, RegistryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let versions = self
            .packages
            .get(package)
            .ok_or_else(|| RegistryError::package_not_found(package, self.name))?;

        Ok(PackageInfo {
            name: package.to_string(),
            releases: versions.iter().map(|v| ReleaseInfo::new(v.as_str(), None)).collect(),
            ..Default::default()
        })
    }
}

/// Registry holding the given datasources
pub fn registry(datasources: Vec<StubDatasource>) -> Arc<DatasourceRegistry> {
    let registry = DatasourceRegistry::new();
    for datasource in datasources {
        registry.register(Arc::new(datasource));
    }
    Arc::new(registry)
}

/// Call counts of a [`CountingIntegration`]
#[derive(Default)]
pub struct Calls {
    pub detect: AtomicUsize,
    pub plan: AtomicUsize,
    pub apply: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Calls {
    pub fn detect(&self) -> usize {
        self.detect.load(Ordering::SeqCst)
    }

    pub fn plan(&self) -> usize {
        self.plan.load(Ordering::SeqCst)
    }

    pub fn apply(&self) -> usize {
        self.apply.load(Ordering::SeqCst)
    }

    /// Most calls that were running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Integration reporting one manifest per configured path and counting calls
pub struct CountingIntegration {
    name: &'static str,
    paths: Vec<&'static str>,
    fail_plan: bool,
    delay: Option<Duration>,
    pub calls: Arc<Calls>,
}

impl CountingIntegration {
    pub fn new(name: &'static str, paths: &[&'static str]) -> Self {
        Self {
            name,
            paths: paths.to_vec(),
            fail_plan: false,
            delay: None,
            calls: Arc::new(Calls::default()),
        }
    }

    pub fn failing_plan(mut self) -> Self {
        self.fail_plan = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn pause(&self) {
        let running = self.calls.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Integration for CountingIntegration {
    fn name(&self) -> &str {
        self.name
    }

    async fn detect(
        &self,
        _ctx: &CancellationToken,
        repo_root: &Path,
    ) -> Result<Vec<Manifest>, IntegrationError> {
        self.calls.detect.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self
            .paths
            .iter()
            .map(|path| {
                let dependency =
                    Dependency::new("dep", "1.0.0", "^1.0.0", DependencyType::Production, "stub");
                Manifest::new(repo_root.join(path), self.name, vec![dependency], "")
            })
            .collect())
    }

    async fn plan(
        &self,
        _ctx: &CancellationToken,
        manifest: &Manifest,
        _plan_ctx: &PlanContext,
    ) -> Result<UpdatePlan, IntegrationError> {
        self.calls.plan.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_plan {
            return Err(IntegrationError::parse_error(&manifest.path, "broken manifest"));
        }
        Ok(UpdatePlan::new(manifest.clone(), PlanStrategy::CustomRewrite))
    }

    async fn apply(
        &self,
        _ctx: &CancellationToken,
        plan: &UpdatePlan,
    ) -> Result<ApplyResult, IntegrationError> {
        self.calls.apply.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(ApplyResult::new(&plan.manifest.path))
    }
}
