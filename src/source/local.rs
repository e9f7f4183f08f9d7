// src/source/local.rs
//! Local folder package source
//!
//! Layout: `<root>/<id>/<version>/package.json`, where `package.json` is a
//! [`PackageManifest`]. Package directories match the id in any casing, and
//! a version directory may use any spelling that parses to the version
//! (`1.0` for `1.0.0`).

use super::{
    AssetGroup, DependencyGroup, PackageManifest, PackageSource, SourceError, SourceResult,
    parse_manifest_version,
};
use crate::model::library_key;
use async_trait::async_trait;
use dashmap::DashMap;
use semver::Version;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const MANIFEST_FILE: &str = "package.json";

pub struct LocalFolderSource {
    name: String,
    root: PathBuf,
    /// Directory each listed version was found in
    version_dirs: DashMap<(String, Version), PathBuf>,
}

impl LocalFolderSource {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            version_dirs: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the versions of `id`, if the package exists
    async fn package_dir(&self, id: &str) -> SourceResult<Option<PathBuf>> {
        let exact = self.root.join(id);
        if is_dir(&exact).await {
            return Ok(Some(exact));
        }

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(list_error(&self.root, e)),
        };

        let key = library_key(id);
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| list_error(&self.root, e))?
        {
            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| library_key(name) == key);
            if matches && is_dir(&entry.path()).await {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    /// Complete versions of `id`, remembering the directory of each
    async fn scan(&self, id: &str) -> SourceResult<Vec<Version>> {
        let Some(dir) = self.package_dir(id).await? else {
            return Ok(Vec::new());
        };
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(list_error(&dir, e)),
        };

        let key = library_key(id);
        let mut versions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| list_error(&dir, e))?
        {
            let file_name = entry.file_name();
            let Some(raw) = file_name.to_str() else {
                continue;
            };

            match parse_manifest_version(id, raw) {
                Ok(version) => {
                    if !is_file(&entry.path().join(MANIFEST_FILE)).await {
                        continue;
                    }
                    let slot = (key.clone(), version.clone());
                    // The normalized spelling wins when several directories
                    // parse to one version
                    if raw == version.to_string() {
                        self.version_dirs.insert(slot, entry.path());
                    } else {
                        self.version_dirs.entry(slot).or_insert_with(|| entry.path());
                    }
                    versions.push(version);
                }
                Err(e) => debug!("Skipping {}: {}", entry.path().display(), e),
            }
        }

        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    async fn manifest_path(&self, id: &str, version: &Version) -> SourceResult<PathBuf> {
        let slot = (library_key(id), version.clone());
        if self.version_dirs.get(&slot).is_none() {
            self.scan(id).await?;
        }
        let dir = match self.version_dirs.get(&slot) {
            Some(dir) => dir.value().clone(),
            None => self.root.join(id).join(version.to_string()),
        };
        Ok(dir.join(MANIFEST_FILE))
    }

    async fn read_manifest(&self, id: &str, version: &Version) -> SourceResult<PackageManifest> {
        let path = self.manifest_path(id, version).await?;
        let data = tokio::fs::read(&path).await.map_err(|e| {
            SourceError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let manifest: PackageManifest = serde_json::from_slice(&data).map_err(|e| {
            SourceError::InvalidMetadata(format!("{}: {}", path.display(), e))
        })?;

        if library_key(&manifest.id) != library_key(id) {
            return Err(SourceError::InvalidMetadata(format!(
                "{} describes package '{}', expected '{}'",
                path.display(),
                manifest.id,
                id
            )));
        }

        Ok(manifest)
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

fn list_error(dir: &Path, e: std::io::Error) -> SourceError {
    SourceError::Io(format!("Failed to list {}: {}", dir.display(), e))
}

#[async_trait]
impl PackageSource for LocalFolderSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_versions(&self, id: &str) -> SourceResult<Vec<Version>> {
        self.scan(id).await
    }

    async fn get_dependencies(&self, id: &str, version: &Version) -> SourceResult<Vec<DependencyGroup>> {
        Ok(self.read_manifest(id, version).await?.dependency_groups)
    }

    async fn get_asset_groups(&self, id: &str, version: &Version) -> SourceResult<Vec<AssetGroup>> {
        Ok(self.read_manifest(id, version).await?.asset_groups)
    }
}
