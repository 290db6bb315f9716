//! npm registry datasource
//!
//! API endpoint: https://registry.npmjs.org/{package}

use super::{Datasource, HttpClient, PackageInfo, ReleaseInfo};
use crate::error::RegistryError;
use crate::resolve::compare_versions;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// npm registry base URL
const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// npm registry datasource
pub struct NpmDatasource {
    client: HttpClient,
    base_url: String,
}

/// npm package metadata response
#[derive(Debug, Deserialize)]
struct NpmPackageResponse {
    /// Publish time keyed by version (plus `created`/`modified`)
    #[serde(default)]
    time: HashMap<String, String>,
    /// Available versions
    #[serde(default)]
    versions: HashMap<String, serde_json::Value>,
    /// Tags such as `latest`
    #[serde(default, rename = "dist-tags")]
    dist_tags: HashMap<String, String>,
    homepage: Option<String>,
    /// Either a URL string or `{ "type": "git", "url": ... }`
    repository: Option<serde_json::Value>,
}

impl NpmDatasource {
    /// Create a datasource for the public npm registry
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, NPM_REGISTRY_URL)
    }

    /// Create a datasource for another registry (mirrors, tests)
    pub fn with_base_url(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the URL for a package; the scope separator is escaped
    fn build_url(&self, package: &str) -> String {
        format!("{}/{}", self.base_url, package.replace('/', "%2F"))
    }
}

#[async_trait]
impl Datasource for NpmDatasource {
    fn name(&self) -> &str {
        "npm"
    }

    async fn get_package_info(&self, package: &str) -> Result<PackageInfo, RegistryError> {
        let url = self.build_url(package);
        let response: NpmPackageResponse =
            self.client.get_json(&url, package, self.name()).await?;

        let mut releases: Vec<ReleaseInfo> = response
            .versions
            .keys()
            .map(|version| {
                let published_at = response
                    .time
                    .get(version)
                    .and_then(|t| t.parse::<DateTime<Utc>>().ok());
                ReleaseInfo::new(version.clone(), published_at)
            })
            .collect();
        releases.sort_by(|a, b| compare_versions(&a.version, &b.version));

        let repository = response.repository.and_then(|r| match r {
            serde_json::Value::String(url) => Some(url),
            other => other.get("url").and_then(|u| u.as_str()).map(String::from),
        });

        Ok(PackageInfo {
            name: package.to_string(),
            latest: response.dist_tags.get("latest").cloned(),
            releases,
            homepage: response.homepage,
            repository,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn datasource(url: &str) -> NpmDatasource {
        NpmDatasource::with_base_url(HttpClient::new().unwrap().with_max_retries(0), url)
    }

    #[test]
    fn test_build_url() {
        let ds = NpmDatasource::new(HttpClient::new().unwrap());
        assert_eq!(ds.build_url("lodash"), "https://registry.npmjs.org/lodash");
        assert_eq!(
            ds.build_url("@types/node"),
            "https://registry.npmjs.org/@types%2Fnode"
        );
    }

    #[tokio::test]
    async fn test_get_package_info() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/lodash")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "name": "lodash",
                    "dist-tags": { "latest": "4.17.21" },
                    "versions": { "4.17.20": {}, "4.17.21": {}, "4.17.19": {} },
                    "time": {
                        "created": "2012-04-23T16:37:11.912Z",
                        "4.17.19": "2020-07-08T17:14:40.866Z",
                        "4.17.20": "2020-08-13T16:53:54.152Z",
                        "4.17.21": "2021-02-20T15:42:16.891Z"
                    },
                    "homepage": "https://lodash.com/",
                    "repository": { "type": "git", "url": "git+https://github.com/lodash/lodash.git" }
                }"#,
            )
            .create_async()
            .await;

        let info = datasource(&server.url()).get_package_info("lodash").await.unwrap();
        mock.assert_async().await;

        assert_eq!(info.latest.as_deref(), Some("4.17.21"));
        assert_eq!(info.versions(), vec!["4.17.19", "4.17.20", "4.17.21"]);
        assert!(info.published_at("4.17.21").is_some());
        assert_eq!(info.homepage.as_deref(), Some("https://lodash.com/"));
        assert_eq!(
            info.repository.as_deref(),
            Some("git+https://github.com/lodash/lodash.git")
        );
    }

    #[tokio::test]
    async fn test_latest_version_from_dist_tags() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/react")
            .with_status(200)
            .with_body(r#"{"dist-tags":{"latest":"18.3.1"},"versions":{"18.3.1":{},"19.0.0-rc.0":{}}}"#)
            .create_async()
            .await;

        let latest = datasource(&server.url()).get_latest_version("react").await.unwrap();
        assert_eq!(latest, "18.3.1");
    }

    #[tokio::test]
    async fn test_missing_package() {
        let mut server = Server::new_async().await;
        server.mock("GET", "/nope").with_status(404).create_async().await;

        let result = datasource(&server.url()).get_versions("nope").await;
        assert!(matches!(result, Err(RegistryError::PackageNotFound { .. })));
    }
}
