// src/source/memory.rs
//! In-memory package catalogue

use super::{AssetGroup, DependencyGroup, PackageDependency, PackageSource, SourceError, SourceResult};
use crate::model::library_key;
use async_trait::async_trait;
use semver::Version;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct Entry {
    dependency_groups: Vec<DependencyGroup>,
    asset_groups: Vec<AssetGroup>,
}

/// Package source backed by a map, built up front; ids match in any casing
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    name: String,
    packages: BTreeMap<String, BTreeMap<Version, Entry>>,
}

impl InMemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: BTreeMap::new(),
        }
    }

    /// Add a package version whose dependencies apply to every framework
    pub fn with_package(self, id: &str, version: Version, dependencies: Vec<PackageDependency>) -> Self {
        let groups = if dependencies.is_empty() {
            Vec::new()
        } else {
            vec![DependencyGroup {
                framework: None,
                dependencies,
            }]
        };
        self.with_dependency_groups(id, version, groups)
    }

    /// Add a package version with explicit per-framework dependency groups
    pub fn with_dependency_groups(mut self, id: &str, version: Version, groups: Vec<DependencyGroup>) -> Self {
        self.packages
            .entry(library_key(id))
            .or_default()
            .entry(version)
            .or_default()
            .dependency_groups = groups;
        self
    }

    /// Set the asset groups of a package version, adding the version if needed
    pub fn with_assets(mut self, id: &str, version: Version, assets: Vec<AssetGroup>) -> Self {
        self.packages
            .entry(library_key(id))
            .or_default()
            .entry(version)
            .or_default()
            .asset_groups = assets;
        self
    }

    fn entry(&self, id: &str, version: &Version) -> SourceResult<&Entry> {
        self.packages
            .get(&library_key(id))
            .and_then(|versions| versions.get(version))
            .ok_or_else(|| {
                SourceError::InvalidMetadata(format!(
                    "{} {} is not in source '{}'",
                    id, version, self.name
                ))
            })
    }
}

#[async_trait]
impl PackageSource for InMemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_versions(&self, id: &str) -> SourceResult<Vec<Version>> {
        Ok(self
            .packages
            .get(&library_key(id))
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_dependencies(&self, id: &str, version: &Version) -> SourceResult<Vec<DependencyGroup>> {
        Ok(self.entry(id, version)?.dependency_groups.clone())
    }

    async fn get_asset_groups(&self, id: &str, version: &Version) -> SourceResult<Vec<AssetGroup>> {
        Ok(self.entry(id, version)?.asset_groups.clone())
    }
}
