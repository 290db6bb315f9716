//! Go module proxy datasource
//!
//! API endpoints:
//! - List versions: https://proxy.golang.org/{module}/@v/list
//! - Version info: https://proxy.golang.org/{module}/@v/{version}.info
//! - Latest: https://proxy.golang.org/{module}/@latest

use super::{Datasource, HttpClient, PackageInfo, ReleaseInfo};
use crate::error::RegistryError;
use crate::resolve::compare_versions;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Go module proxy base URL
const GO_PROXY_URL: &str = "https://proxy.golang.org";

/// Go module proxy datasource
pub struct GoProxyDatasource {
    client: HttpClient,
    base_url: String,
}

/// Version info response
#[derive(Debug, Deserialize)]
struct VersionInfoResponse {
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Time")]
    time: Option<String>,
}

impl GoProxyDatasource {
    /// Create a datasource for proxy.golang.org
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, GO_PROXY_URL)
    }

    /// Create a datasource for another proxy (GOPROXY mirrors, tests)
    pub fn with_base_url(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn build_list_url(&self, module: &str) -> String {
        format!("{}/@v/list", self.module_url(module))
    }

    fn build_info_url(&self, module: &str, version: &str) -> String {
        format!("{}/@v/{}.info", self.module_url(module), version)
    }

    fn build_latest_url(&self, module: &str) -> String {
        format!("{}/@latest", self.module_url(module))
    }

    fn module_url(&self, module: &str) -> String {
        format!("{}/{}", self.base_url, encode_module_path(module))
    }

    async fn list(&self, module: &str) -> Result<Vec<String>, RegistryError> {
        let body = self
            .client
            .get_text(&self.build_list_url(module), module, self.name())
            .await?;

        let mut versions: Vec<String> = body
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        versions.sort_by(|a, b| compare_versions(a, b));
        Ok(versions)
    }
}

/// Uppercase letters become `!` + lowercase, as the proxy protocol requires
fn encode_module_path(module: &str) -> String {
    let mut encoded = String::with_capacity(module.len() + 4);
    for ch in module.chars() {
        if ch.is_uppercase() {
            encoded.push('!');
            encoded.extend(ch.to_lowercase());
        } else {
            encoded.push(ch);
        }
    }
    encoded
}

#[async_trait]
impl Datasource for GoProxyDatasource {
    fn name(&self) -> &str {
        "go"
    }

    async fn get_latest_version(&self, module: &str) -> Result<String, RegistryError> {
        let info: VersionInfoResponse = self
            .client
            .get_json(&self.build_latest_url(module), module, self.name())
            .await?;
        Ok(info.version)
    }

    async fn get_versions(&self, module: &str) -> Result<Vec<String>, RegistryError> {
        self.list(module).await
    }

    async fn get_package_info(&self, module: &str) -> Result<PackageInfo, RegistryError> {
        let versions = self.list(module).await?;

        let mut releases = Vec::with_capacity(versions.len());
        for version in versions {
            let url = self.build_info_url(module, &version);
            // A missing .info only costs the timestamp
            let published_at = match self
                .client
                .get_json::<VersionInfoResponse>(&url, module, self.name())
                .await
            {
                Ok(info) => info.time.and_then(|t| t.parse::<DateTime<Utc>>().ok()),
                Err(e) => {
                    tracing::debug!(module, version = %version, error = %e, "version info unavailable");
                    None
                }
            };
            releases.push(ReleaseInfo::new(version, published_at));
        }

        let repository = module
            .starts_with("github.com/")
            .then(|| format!("https://{module}"));

        Ok(PackageInfo {
            name: module.to_string(),
            latest: None,
            releases,
            homepage: Some(format!("https://pkg.go.dev/{module}")),
            repository,
        })
    }
}
