use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ResolveError;

/// The two registry operations the resolver needs. Kept behind a trait so
/// tests can substitute an in-memory registry for nuget.org.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Latest published version for a package id.
    async fn latest_version(&self, id: &str) -> Result<String, ResolveError>;

    /// Full archive bytes for a pinned package.
    async fn download_package(&self, id: &str, version: &str) -> Result<Vec<u8>, ResolveError>;
}

const SEARCH_URL: &str = "https://azuresearch-usnc.nuget.org/query";
const FLAT_CONTAINER_URL: &str = "https://api.nuget.org/v3-flatcontainer";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    version: String,
}

#[derive(Debug, Deserialize)]
struct FlatContainerIndex {
    versions: Vec<String>,
}

/// Client for the nuget.org v3 endpoints.
pub struct NugetRegistry {
    client: reqwest::Client,
}

impl NugetRegistry {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }

    async fn latest_from_search(&self, id: &str) -> Option<String> {
        let url = format!("{SEARCH_URL}?q=packageid:{id}&take=1");
        let response: SearchResponse = self
            .client
            .get(&url)
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?
            .json()
            .await
            .ok()?;
        response.data.into_iter().next().map(|hit| hit.version)
    }

    async fn latest_from_index(&self, id: &str) -> Option<String> {
        let url = format!("{FLAT_CONTAINER_URL}/{id}/index.json");
        let index: FlatContainerIndex = self
            .client
            .get(&url)
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?
            .json()
            .await
            .ok()?;
        index.versions.into_iter().next_back()
    }
}

impl Default for NugetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Registry for NugetRegistry {
    async fn latest_version(&self, id: &str) -> Result<String, ResolveError> {
        let id = id.to_lowercase();
        // The search service is fastest but occasionally lags behind; the
        // flat-container index is authoritative and serves as fallback.
        if let Some(version) = self.latest_from_search(&id).await {
            return Ok(version);
        }
        if let Some(version) = self.latest_from_index(&id).await {
            return Ok(version);
        }
        Err(ResolveError::VersionResolutionFailed { id })
    }

    async fn download_package(&self, id: &str, version: &str) -> Result<Vec<u8>, ResolveError> {
        let id = id.to_lowercase();
        let version = version.to_lowercase();
        let url = format!("{FLAT_CONTAINER_URL}/{id}/{version}/{id}.{version}.nupkg");
        let bytes = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}
