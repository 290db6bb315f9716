//! Datasources: registry backends that report published versions
//!
//! This module provides:
//! - The `Datasource` contract consumed by integrations
//! - `DatasourceRegistry`, the name-keyed set of datasources built at startup
//! - HTTP client shared foundation with retry logic
//! - npm, PyPI, Go module proxy and Docker Hub backends

mod client;
mod docker_hub;
mod go_proxy;
mod npm;
mod pypi;

pub use client::HttpClient;
pub use docker_hub::DockerHubDatasource;
pub use go_proxy::GoProxyDatasource;
pub use npm::NpmDatasource;
pub use pypi::PyPIDatasource;

use crate::error::RegistryError;
use crate::resolve::{compare_versions, parse_lenient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(test)]
use mockall::automock;

/// One published version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Version string as published
    pub version: String,
    /// Publication time, when the registry reports one
    pub published_at: Option<DateTime<Utc>>,
}

impl ReleaseInfo {
    /// Create a release entry
    pub fn new(version: impl Into<String>, published_at: Option<DateTime<Utc>>) -> Self {
        Self {
            version: version.into(),
            published_at,
        }
    }
}

/// Everything a datasource knows about a package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package identifier as passed to the datasource
    pub name: String,
    /// Version the registry marks as latest
    pub latest: Option<String>,
    /// All published versions
    pub releases: Vec<ReleaseInfo>,
    /// Project homepage
    pub homepage: Option<String>,
    /// Source repository
    pub repository: Option<String>,
}

impl PackageInfo {
    /// Version strings of all releases
    pub fn versions(&self) -> Vec<String> {
        self.releases.iter().map(|r| r.version.clone()).collect()
    }

    /// Publication time of `version`
    pub fn published_at(&self, version: &str) -> Option<DateTime<Utc>> {
        self.releases
            .iter()
            .find(|r| r.version == version)
            .and_then(|r| r.published_at)
    }

    /// Highest stable release, falling back to the highest of any kind
    pub fn highest_version(&self) -> Option<String> {
        let stable = self
            .releases
            .iter()
            .filter(|r| parse_lenient(&r.version).is_some_and(|v| v.pre.is_empty()))
            .max_by(|a, b| compare_versions(&a.version, &b.version));

        stable
            .or_else(|| {
                self.releases
                    .iter()
                    .max_by(|a, b| compare_versions(&a.version, &b.version))
            })
            .map(|r| r.version.clone())
    }
}

/// A registry that can list the versions of a package
///
/// Package identifiers are datasource-specific (`lodash`, `library/nginx`,
/// `github.com/gin-gonic/gin`).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Datasource: Send + Sync {
    /// Name the datasource is registered under
    fn name(&self) -> &str;

    /// Latest version of a package
    async fn get_latest_version(&self, package: &str) -> Result<String, RegistryError> {
        let info = self.get_package_info(package).await?;
        info.latest
            .clone()
            .or_else(|| info.highest_version())
            .ok_or_else(|| RegistryError::invalid_response(package, self.name(), "no versions published"))
    }

    /// All published versions of a package
    async fn get_versions(&self, package: &str) -> Result<Vec<String>, RegistryError> {
        Ok(self.get_package_info(package).await?.versions())
    }

    /// Full package metadata
    async fn get_package_info(&self, package: &str) -> Result<PackageInfo, RegistryError>;
}

/// Name-keyed set of datasources
///
/// Registration happens once at startup; a duplicate name is a programming
/// error and panics.
#[derive(Default)]
pub struct DatasourceRegistry {
    datasources: RwLock<HashMap<String, Arc<dyn Datasource>>>,
}

impl DatasourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in datasources
    pub fn with_defaults(client: HttpClient) -> Self {
        let registry = Self::new();
        registry.register(Arc::new(NpmDatasource::new(client.clone())));
        registry.register(Arc::new(PyPIDatasource::new(client.clone())));
        registry.register(Arc::new(GoProxyDatasource::new(client.clone())));
        registry.register(Arc::new(DockerHubDatasource::new(client)));
        registry
    }

    /// Register a datasource under its own name
    ///
    /// # Panics
    ///
    /// Panics if a datasource with the same name is already registered.
    pub fn register(&self, datasource: Arc<dyn Datasource>) {
        let name = datasource.name().to_string();
        let mut datasources = self.datasources.write().unwrap_or_else(PoisonError::into_inner);
        if datasources.contains_key(&name) {
            panic!("datasource '{name}' is already registered");
        }
        tracing::debug!(datasource = %name, "registered datasource");
        datasources.insert(name, datasource);
    }

    /// Look up a datasource by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Datasource>> {
        self.datasources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Look up a datasource, failing if it is unknown
    pub fn require(&self, name: &str) -> Result<Arc<dyn Datasource>, RegistryError> {
        self.get(name).ok_or_else(|| RegistryError::UnknownDatasource {
            name: name.to_string(),
        })
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .datasources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
