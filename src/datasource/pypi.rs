//! PyPI JSON API datasource
//!
//! API endpoint: https://pypi.org/pypi/{package}/json

use super::{Datasource, HttpClient, PackageInfo, ReleaseInfo};
use crate::error::RegistryError;
use crate::resolve::compare_versions;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// PyPI API base URL
const PYPI_API_URL: &str = "https://pypi.org/pypi";

/// PyPI datasource
pub struct PyPIDatasource {
    client: HttpClient,
    base_url: String,
}

/// PyPI package metadata response
#[derive(Debug, Deserialize)]
struct PyPIResponse {
    info: PyPIInfo,
    /// Release files keyed by version
    #[serde(default)]
    releases: HashMap<String, Vec<ReleaseFile>>,
}

#[derive(Debug, Deserialize)]
struct PyPIInfo {
    version: Option<String>,
    home_page: Option<String>,
    #[serde(default)]
    project_urls: Option<HashMap<String, String>>,
}

/// Release file information
#[derive(Debug, Deserialize)]
struct ReleaseFile {
    /// Upload time for the release file
    upload_time_iso_8601: Option<String>,
    #[serde(default)]
    yanked: bool,
}

impl PyPIDatasource {
    /// Create a datasource for pypi.org
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, PYPI_API_URL)
    }

    /// Create a datasource for another index (mirrors, tests)
    pub fn with_base_url(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the URL for a package
    fn build_url(&self, package: &str) -> String {
        format!("{}/{}/json", self.base_url, package)
    }
}

#[async_trait]
impl Datasource for PyPIDatasource {
    fn name(&self) -> &str {
        "pypi"
    }

    async fn get_package_info(&self, package: &str) -> Result<PackageInfo, RegistryError> {
        let url = self.build_url(package);
        let response: PyPIResponse = self.client.get_json(&url, package, self.name()).await?;

        let mut releases = Vec::new();
        for (version, files) in response.releases {
            // A release whose every file was yanked is gone
            if !files.is_empty() && files.iter().all(|f| f.yanked) {
                continue;
            }

            // Earliest upload time across the release files
            let published_at = files
                .iter()
                .filter_map(|f| f.upload_time_iso_8601.as_deref())
                .filter_map(|t| t.parse::<DateTime<Utc>>().ok())
                .min();

            releases.push(ReleaseInfo::new(version, published_at));
        }
        releases.sort_by(|a, b| compare_versions(&a.version, &b.version));

        let project_urls = response.info.project_urls.unwrap_or_default();
        let homepage = response
            .info
            .home_page
            .filter(|h| !h.is_empty())
            .or_else(|| project_urls.get("Homepage").cloned());
        let repository = ["Source", "Repository", "Source Code"]
            .iter()
            .find_map(|key| project_urls.get(*key).cloned());

        Ok(PackageInfo {
            name: package.to_string(),
            latest: response.info.version,
            releases,
            homepage,
            repository,
        })
    }
}
