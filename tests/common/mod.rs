// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use restore_core::source::{
    AssetGroup, DependencyGroup, InMemorySource, PackageDependency, PackageSource, SourceError,
    SourceResult,
};
use restore_core::{
    PackageReference, PlatformTarget, ProjectModel, ProjectReference, Resolver, ResolverConfig,
    RetryConfig, VersionRange,
};
use semver::Version;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

pub fn v(s: &str) -> Version {
    restore_core::version::parse_version(s).unwrap()
}

pub fn dep(id: &str, range: &str) -> PackageDependency {
    PackageDependency::new(id, VersionRange::parse(range).unwrap())
}

/// Project building for the given frameworks, with no references
pub fn project(id: &str, frameworks: &[&str]) -> ProjectModel {
    ProjectModel {
        id: id.to_string(),
        file_path: Some(format!("{}/{}.proj", id, id)),
        platforms: frameworks.iter().map(|f| PlatformTarget::new(*f)).collect(),
        package_references: Vec::new(),
        project_references: Vec::new(),
        warning_properties: Default::default(),
    }
}

pub fn requires(mut model: ProjectModel, id: &str, range: &str) -> ProjectModel {
    model.package_references.push(PackageReference {
        id: id.to_string(),
        version: range.to_string(),
        no_warn: Vec::new(),
        frameworks: None,
    });
    model
}

pub fn requires_no_warn(mut model: ProjectModel, id: &str, range: &str, no_warn: &[&str]) -> ProjectModel {
    model.package_references.push(PackageReference {
        id: id.to_string(),
        version: range.to_string(),
        no_warn: no_warn.iter().map(|c| c.to_string()).collect(),
        frameworks: None,
    });
    model
}

pub fn references(mut model: ProjectModel, id: &str) -> ProjectModel {
    model.project_references.push(ProjectReference {
        id: id.to_string(),
        no_warn: Vec::new(),
    });
    model
}

/// Retry settings fast enough for tests
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        delay_ms: 20,
        request_timeout_secs: 5,
    }
}

pub fn resolver(sources: Vec<Arc<dyn PackageSource>>) -> Resolver {
    let config = ResolverConfig {
        retry: fast_retry(),
        max_parallelism: 4,
        ..Default::default()
    };
    Resolver::new(config, sources)
}

pub fn resolver_with_fallbacks(sources: Vec<Arc<dyn PackageSource>>, fallbacks: &[(&str, &[&str])]) -> Resolver {
    let config = ResolverConfig {
        retry: fast_retry(),
        max_parallelism: 4,
        platform_fallbacks: fallbacks
            .iter()
            .map(|(fw, list)| (fw.to_string(), list.iter().map(|f| f.to_string()).collect()))
            .collect(),
        ..Default::default()
    };
    Resolver::new(config, sources)
}

/// Catalogue of the downgrade scenario:
/// z 1.5.0, z 2.0.0, x 1.0.0 -> z >= 2.0.0
pub fn downgrade_catalogue() -> InMemorySource {
    InMemorySource::new("local")
        .with_package("z", v("1.5.0"), Vec::new())
        .with_package("z", v("2.0.0"), Vec::new())
        .with_package("x", v("1.0.0"), vec![dep("z", "2.0.0")])
}

/// Source that fails the first `failures` calls of every request with a
/// transient status, then answers from `inner`
pub struct FlakySource {
    inner: InMemorySource,
    failures: u32,
    status: u16,
    calls: Mutex<HashMap<String, u32>>,
}

impl FlakySource {
    pub fn new(inner: InMemorySource, failures: u32) -> Self {
        Self::with_status(inner, failures, 503)
    }

    pub fn with_status(inner: InMemorySource, failures: u32, status: u16) -> Self {
        Self {
            inner,
            failures,
            status,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Calls made for `request` (e.g. `list:z` or `deps:z 1.0.0`)
    pub fn calls(&self, request: &str) -> u32 {
        self.calls.lock().unwrap().get(request).copied().unwrap_or(0)
    }

    fn record(&self, request: String) -> SourceResult<()> {
        let mut calls = self.calls.lock().unwrap();
        let count = calls.entry(request.clone()).or_insert(0);
        *count += 1;
        if *count <= self.failures {
            return Err(SourceError::Http {
                status: self.status,
                url: format!("https://feed.test/{}", request),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PackageSource for FlakySource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_versions(&self, id: &str) -> SourceResult<Vec<Version>> {
        self.record(format!("list:{}", id))?;
        self.inner.list_versions(id).await
    }

    async fn get_dependencies(&self, id: &str, version: &Version) -> SourceResult<Vec<DependencyGroup>> {
        self.record(format!("deps:{} {}", id, version))?;
        self.inner.get_dependencies(id, version).await
    }

    async fn get_asset_groups(&self, id: &str, version: &Version) -> SourceResult<Vec<AssetGroup>> {
        self.record(format!("assets:{} {}", id, version))?;
        self.inner.get_asset_groups(id, version).await
    }
}

/// Source whose `list_versions` sleeps before answering
pub struct SlowSource {
    inner: InMemorySource,
    delay: Duration,
    calls: Mutex<u32>,
}

impl SlowSource {
    pub fn new(inner: InMemorySource, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            calls: Mutex::new(0),
        }
    }

    pub fn list_calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PackageSource for SlowSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_versions(&self, id: &str) -> SourceResult<Vec<Version>> {
        *self.calls.lock().unwrap() += 1;
        tokio::time::sleep(self.delay).await;
        self.inner.list_versions(id).await
    }

    async fn get_dependencies(&self, id: &str, version: &Version) -> SourceResult<Vec<DependencyGroup>> {
        self.inner.get_dependencies(id, version).await
    }

    async fn get_asset_groups(&self, id: &str, version: &Version) -> SourceResult<Vec<AssetGroup>> {
        self.inner.get_asset_groups(id, version).await
    }
}
