// src/source/feed.rs
//! HTTP feed package source
//!
//! Endpoints, relative to the feed base URL:
//! - `GET {base}/{id}/index.json` → `{ "versions": ["1.0.0", ...] }`
//! - `GET {base}/{id}/{version}/metadata.json` → package manifest
//!
//! A 404 on the version index means the feed does not carry the package.

use super::{
    AssetGroup, DependencyGroup, PackageManifest, PackageSource, SourceError, SourceResult,
    parse_manifest_version,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use semver::Version;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct VersionIndex {
    versions: Vec<String>,
}

pub struct HttpFeedSource {
    name: String,
    client: reqwest::Client,
    base_url: String,
}

impl HttpFeedSource {
    /// Create a feed source; `base_url` must be an absolute http(s) URL
    pub fn new(name: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let name = name.into();
        let parsed = Url::parse(base_url).map_err(|e| {
            Error::ConfigurationError(format!("Invalid URL for source '{}': {}", name, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::ConfigurationError(format!(
                "Source '{}' must use http or https, got '{}'",
                name,
                parsed.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn index_url(&self, id: &str) -> String {
        format!("{}/{}/index.json", self.base_url, id.to_lowercase())
    }

    fn metadata_url(&self, id: &str, version: &Version) -> String {
        format!(
            "{}/{}/{}/metadata.json",
            self.base_url,
            id.to_lowercase(),
            version
        )
    }

    async fn get(&self, url: &str) -> SourceResult<reqwest::Response> {
        debug!("GET {}", url);
        self.client.get(url).send().await.map_err(|e| classify(url, e))
    }

    async fn read_manifest(&self, id: &str, version: &Version) -> SourceResult<PackageManifest> {
        let url = self.metadata_url(id, version);
        let response = self.get(&url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                url,
            });
        }

        response
            .json::<PackageManifest>()
            .await
            .map_err(|e| decode_error(&url, e))
    }
}

fn classify(url: &str, err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout(url.to_string())
    } else if let Some(status) = err.status() {
        SourceError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        }
    } else if err.is_connect() || err.is_request() {
        SourceError::Connection(format!("{}: {}", url, err))
    } else {
        SourceError::InvalidMetadata(format!("{}: {}", url, err))
    }
}

fn decode_error(url: &str, err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout(url.to_string())
    } else {
        SourceError::InvalidMetadata(format!("{}: {}", url, err))
    }
}

#[async_trait]
impl PackageSource for HttpFeedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_versions(&self, id: &str) -> SourceResult<Vec<Version>> {
        let url = self.index_url(id);
        let response = self.get(&url).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                url,
            });
        }

        let index: VersionIndex = response.json().await.map_err(|e| decode_error(&url, e))?;
        let mut versions = index
            .versions
            .iter()
            .map(|raw| parse_manifest_version(id, raw))
            .collect::<SourceResult<Vec<_>>>()?;
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    async fn get_dependencies(&self, id: &str, version: &Version) -> SourceResult<Vec<DependencyGroup>> {
        Ok(self.read_manifest(id, version).await?.dependency_groups)
    }

    async fn get_asset_groups(&self, id: &str, version: &Version) -> SourceResult<Vec<AssetGroup>> {
        Ok(self.read_manifest(id, version).await?.asset_groups)
    }
}
