// src/source/mod.rs
//! Package metadata sources
//!
//! A source answers three questions about a package: which versions exist,
//! what each version depends on (grouped per framework), and which asset
//! groups it ships. Source kinds:
//! - Local folder laid out as `<root>/<id>/<version>/package.json`
//! - HTTP feed serving JSON documents
//! - In-memory catalogue (tests and embedding hosts)
//!
//! The kind is chosen once, from [`SourceConfig`], when the run is set up.
//! Every call made during resolution goes through the resilient fetcher.

mod feed;
mod local;
mod memory;

pub use feed::HttpFeedSource;
pub use local::LocalFolderSource;
pub use memory::InMemorySource;

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::version::VersionRange;
use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// A dependency declared by a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependency {
    pub id: String,
    #[serde(default = "VersionRange::any")]
    pub range: VersionRange,
}

impl PackageDependency {
    pub fn new(id: impl Into<String>, range: VersionRange) -> Self {
        Self {
            id: id.into(),
            range,
        }
    }
}

/// Dependencies that apply when consuming the package from one framework
///
/// A group without a framework applies to every consumer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DependencyGroup {
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<PackageDependency>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Compile,
    Runtime,
}

/// Assets a package ships for one framework (and optionally one runtime)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetGroup {
    pub framework: String,
    #[serde(default)]
    pub runtime: Option<String>,
    pub kind: AssetKind,
}

impl AssetGroup {
    pub fn compile(framework: impl Into<String>) -> Self {
        Self {
            framework: framework.into(),
            runtime: None,
            kind: AssetKind::Compile,
        }
    }

    pub fn runtime(framework: impl Into<String>, runtime: Option<&str>) -> Self {
        Self {
            framework: framework.into(),
            runtime: runtime.map(str::to_string),
            kind: AssetKind::Runtime,
        }
    }
}

/// Metadata document describing one package version
///
/// This is the `package.json` of a local folder source and the
/// `metadata.json` of a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub dependency_groups: Vec<DependencyGroup>,
    #[serde(default)]
    pub asset_groups: Vec<AssetGroup>,
}

/// Failure of a single source request
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Invalid package metadata: {0}")]
    InvalidMetadata(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl SourceError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Http { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            SourceError::Timeout(_) | SourceError::Connection(_) => true,
            SourceError::InvalidMetadata(_) | SourceError::Io(_) => false,
        }
    }
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Capability every package source provides
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Name used in resource keys and diagnostics
    fn name(&self) -> &str;

    /// All versions of `id` this source knows about; unknown ids yield none
    async fn list_versions(&self, id: &str) -> SourceResult<Vec<Version>>;

    /// Per-framework dependency groups of one package version
    async fn get_dependencies(&self, id: &str, version: &Version) -> SourceResult<Vec<DependencyGroup>>;

    /// Asset groups shipped by one package version
    async fn get_asset_groups(&self, id: &str, version: &Version) -> SourceResult<Vec<AssetGroup>>;
}

/// Source selection in the resolver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Local { name: String, path: PathBuf },
    Feed { name: String, url: String },
}

impl SourceConfig {
    pub fn name(&self) -> &str {
        match self {
            SourceConfig::Local { name, .. } | SourceConfig::Feed { name, .. } => name,
        }
    }

    /// Construct the source this entry describes
    pub fn open(&self, retry: &RetryConfig) -> Result<Arc<dyn PackageSource>> {
        match self {
            SourceConfig::Local { name, path } => {
                Ok(Arc::new(LocalFolderSource::new(name.clone(), path.clone())))
            }
            SourceConfig::Feed { name, url } => Ok(Arc::new(HttpFeedSource::new(
                name.clone(),
                url,
                retry.request_timeout(),
            )?)),
        }
    }
}

/// Parse the version directory/document name of a package, mapping failures
/// to metadata errors
pub(crate) fn parse_manifest_version(id: &str, raw: &str) -> SourceResult<Version> {
    crate::version::parse_version(raw).map_err(|e| match e {
        Error::ConfigurationError(msg) => {
            SourceError::InvalidMetadata(format!("package {}: {}", id, msg))
        }
        other => SourceError::InvalidMetadata(format!("package {}: {}", id, other)),
    })
}
