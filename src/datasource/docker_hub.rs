//! Docker Hub datasource
//!
//! API endpoint: https://hub.docker.com/v2/repositories/{namespace}/{repository}/tags
//!
//! Official images live in the `library` namespace, so `nginx` is looked up
//! as `library/nginx`.

use super::{Datasource, HttpClient, PackageInfo, ReleaseInfo};
use crate::error::RegistryError;
use crate::resolve::compare_versions;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Docker Hub API base URL
const DOCKER_HUB_URL: &str = "https://hub.docker.com";

/// Tags fetched per page
const PAGE_SIZE: usize = 100;

/// Pages followed before the tag list is considered complete
const MAX_PAGES: usize = 5;

/// Docker Hub datasource
pub struct DockerHubDatasource {
    client: HttpClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TagsPage {
    next: Option<String>,
    #[serde(default)]
    results: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
    last_updated: Option<String>,
}

impl DockerHubDatasource {
    /// Create a datasource for hub.docker.com
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, DOCKER_HUB_URL)
    }

    /// Create a datasource for another endpoint (tests)
    pub fn with_base_url(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn build_url(&self, image: &str) -> String {
        format!(
            "{}/v2/repositories/{}/tags?page_size={}",
            self.base_url,
            repository_path(image),
            PAGE_SIZE
        )
    }
}

/// `nginx` -> `library/nginx`; namespaced images are kept as-is
fn repository_path(image: &str) -> String {
    if image.contains('/') {
        image.to_string()
    } else {
        format!("library/{image}")
    }
}

#[async_trait]
impl Datasource for DockerHubDatasource {
    fn name(&self) -> &str {
        "docker-hub"
    }

    async fn get_package_info(&self, image: &str) -> Result<PackageInfo, RegistryError> {
        let mut url = Some(self.build_url(image));
        let mut releases = Vec::new();
        let mut pages = 0;

        while let Some(current) = url.take() {
            let page: TagsPage = self.client.get_json(&current, image, self.name()).await?;
            releases.extend(page.results.into_iter().map(|tag| {
                let published_at = tag
                    .last_updated
                    .and_then(|t| t.parse::<DateTime<Utc>>().ok());
                ReleaseInfo::new(tag.name, published_at)
            }));

            pages += 1;
            if pages >= MAX_PAGES {
                tracing::debug!(image, pages, "tag listing truncated");
                break;
            }
            url = page.next;
        }

        releases.sort_by(|a, b| compare_versions(&a.version, &b.version));

        Ok(PackageInfo {
            name: image.to_string(),
            latest: None,
            releases,
            homepage: Some(format!("https://hub.docker.com/r/{}", repository_path(image))),
            repository: None,
        })
    }
}
