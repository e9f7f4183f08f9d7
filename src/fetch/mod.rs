// src/fetch/mod.rs
//! Resilient access to package sources
//!
//! Every source request made during a run goes through [`ResilientFetcher`]:
//! - responses are cached for the run, keyed by [`ResourceKey`]
//! - concurrent requests for one key share a single in-flight request
//! - transient failures are retried after a fixed delay, at most three
//!   attempts per key; the outcome of an exhausted key is remembered so it
//!   is never attempted again within the run
//! - cancellation is observed while waiting for a response and while
//!   sleeping between attempts

mod cache;
mod coalesce;

pub use cache::{Cache, RunCache};
pub use coalesce::RequestCoalescer;

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::model::library_key;
use crate::source::{AssetGroup, DependencyGroup, PackageSource, SourceResult};
use dashmap::DashMap;
use semver::Version;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Kind of request made against a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListVersions,
    GetDependencies,
    GetAssetGroups,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::ListVersions => write!(f, "list_versions"),
            Operation::GetDependencies => write!(f, "get_dependencies"),
            Operation::GetAssetGroups => write!(f, "get_asset_groups"),
        }
    }
}

/// Identity of one source request; the package id is held by its
/// [`library_key`] so every casing shares one cache entry and retry budget
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceKey {
    pub source: String,
    pub id: String,
    pub version: Option<Version>,
    pub operation: Operation,
}

impl ResourceKey {
    pub fn new(
        source: impl Into<String>,
        id: impl Into<String>,
        version: Option<Version>,
        operation: Operation,
    ) -> Self {
        Self {
            source: source.into(),
            id: library_key(&id.into()),
            version,
            operation,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}:{} {} ({})", self.source, self.id, v, self.operation),
            None => write!(f, "{}:{} ({})", self.source, self.id, self.operation),
        }
    }
}

/// Response of a source request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPayload {
    Versions(Vec<Version>),
    Dependencies(Vec<DependencyGroup>),
    Assets(Vec<AssetGroup>),
}

/// Terminal failure of a resource key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to fetch {key} after {attempts} attempt(s): {message}")]
pub struct TransportError {
    pub key: ResourceKey,
    pub attempts: u32,
    pub message: String,
    /// The last failure was transient (the retry budget ran out)
    pub transient: bool,
}

/// Counters exposed for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FetchStats {
    pub attempts: u64,
    pub coalesced: u64,
    pub cached_responses: usize,
}

pub struct ResilientFetcher {
    sources: Vec<Arc<dyn PackageSource>>,
    cache: Arc<dyn Cache>,
    retry: RetryConfig,
    coalescer: RequestCoalescer<ResourceKey, FetchPayload>,
    attempts: DashMap<ResourceKey, u32>,
    failures: DashMap<ResourceKey, TransportError>,
}

impl ResilientFetcher {
    pub fn new(sources: Vec<Arc<dyn PackageSource>>, cache: Arc<dyn Cache>, retry: RetryConfig) -> Self {
        Self {
            sources,
            cache,
            retry,
            coalescer: RequestCoalescer::new(),
            attempts: DashMap::new(),
            failures: DashMap::new(),
        }
    }

    pub fn sources(&self) -> &[Arc<dyn PackageSource>] {
        &self.sources
    }

    /// Name of the source at `index`
    pub fn source_name(&self, index: usize) -> Option<&str> {
        self.sources.get(index).map(|s| s.name())
    }

    fn source(&self, index: usize) -> Result<&Arc<dyn PackageSource>> {
        self.sources
            .get(index)
            .ok_or_else(|| Error::Internal(format!("No package source at index {}", index)))
    }

    pub async fn list_versions(
        &self,
        source: usize,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Version>> {
        let source = self.source(source)?;
        let key = ResourceKey::new(source.name(), id, None, Operation::ListVersions);

        match self
            .fetch(&key, cancel, move || async move {
                source.list_versions(id).await.map(FetchPayload::Versions)
            })
            .await?
        {
            FetchPayload::Versions(versions) => Ok(versions),
            other => Err(unexpected(&key, &other)),
        }
    }

    pub async fn get_dependencies(
        &self,
        source: usize,
        id: &str,
        version: &Version,
        cancel: &CancellationToken,
    ) -> Result<Vec<DependencyGroup>> {
        let source = self.source(source)?;
        let key = ResourceKey::new(
            source.name(),
            id,
            Some(version.clone()),
            Operation::GetDependencies,
        );

        match self
            .fetch(&key, cancel, move || async move {
                source
                    .get_dependencies(id, version)
                    .await
                    .map(FetchPayload::Dependencies)
            })
            .await?
        {
            FetchPayload::Dependencies(groups) => Ok(groups),
            other => Err(unexpected(&key, &other)),
        }
    }

    pub async fn get_asset_groups(
        &self,
        source: usize,
        id: &str,
        version: &Version,
        cancel: &CancellationToken,
    ) -> Result<Vec<AssetGroup>> {
        let source = self.source(source)?;
        let key = ResourceKey::new(
            source.name(),
            id,
            Some(version.clone()),
            Operation::GetAssetGroups,
        );

        match self
            .fetch(&key, cancel, move || async move {
                source
                    .get_asset_groups(id, version)
                    .await
                    .map(FetchPayload::Assets)
            })
            .await?
        {
            FetchPayload::Assets(assets) => Ok(assets),
            other => Err(unexpected(&key, &other)),
        }
    }

    /// Attempts made so far for `key`
    pub fn attempts_for(&self, key: &ResourceKey) -> u32 {
        self.attempts.get(key).map(|n| *n).unwrap_or(0)
    }

    /// Requests that waited on another caller's in-flight request
    pub fn coalesced_count(&self) -> u64 {
        self.coalescer.coalesced_count()
    }

    pub fn stats(&self) -> FetchStats {
        FetchStats {
            attempts: self.attempts.iter().map(|n| u64::from(*n.value())).sum(),
            coalesced: self.coalesced_count(),
            cached_responses: self.cache.len(),
        }
    }

    async fn fetch<F, Fut>(&self, key: &ResourceKey, cancel: &CancellationToken, request: F) -> Result<FetchPayload>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SourceResult<FetchPayload>>,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(hit) = self.lookup(key) {
            return hit;
        }

        let request = &request;
        let shared = self.coalescer.coalesce(key, move || async move {
            // A caller that just missed the previous leader finds its result here
            if let Some(hit) = self.lookup(key) {
                return hit;
            }

            match self.with_retry(key, cancel, request).await {
                Ok(payload) => {
                    self.cache.put(key.clone(), payload.clone());
                    Ok(payload)
                }
                Err(Error::Transport(failure)) => {
                    self.failures.insert(key.clone(), failure.clone());
                    Err(Error::Transport(failure))
                }
                Err(e) => Err(e),
            }
        });

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            outcome = shared => outcome,
        }
    }

    fn lookup(&self, key: &ResourceKey) -> Option<Result<FetchPayload>> {
        if let Some(payload) = self.cache.get(key) {
            return Some(Ok(payload));
        }
        self.failures
            .get(key)
            .map(|failure| Err(Error::Transport(failure.value().clone())))
    }

    async fn with_retry<F, Fut>(&self, key: &ResourceKey, cancel: &CancellationToken, request: &F) -> Result<FetchPayload>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SourceResult<FetchPayload>>,
    {
        let max_attempts = self.retry.attempts();
        let mut last_error = None;

        loop {
            // The budget is per key for the whole run, so attempts made by an
            // abandoned caller count against it
            let Some(attempt) = self.reserve_attempt(key, max_attempts) else {
                let attempts = self.attempts_for(key);
                warn!("Retry budget for {} exhausted after {} attempt(s)", key, attempts);
                return Err(Error::Transport(TransportError {
                    key: key.clone(),
                    attempts,
                    message: last_error.unwrap_or_else(|| "retry budget exhausted".to_string()),
                    transient: true,
                }));
            };

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                outcome = request() => outcome,
            };

            let err = match outcome {
                Ok(payload) => {
                    if attempt > 1 {
                        debug!("Fetched {} on attempt {}", key, attempt);
                    }
                    return Ok(payload);
                }
                Err(err) => err,
            };

            let transient = err.is_transient();
            last_error = Some(err.to_string());
            if !transient || attempt >= max_attempts {
                warn!("Giving up on {} after {} attempt(s): {}", key, attempt, err);
                return Err(Error::Transport(TransportError {
                    key: key.clone(),
                    attempts: attempt,
                    message: err.to_string(),
                    transient,
                }));
            }

            warn!(
                "Attempt {}/{} for {} failed: {}. Retrying in {}ms",
                attempt, max_attempts, key, err, self.retry.delay_ms
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.retry.delay()) => {}
            }
        }
    }

    /// Count one more attempt for `key`, returning the running total, or
    /// `None` once the run's budget for the key is spent
    fn reserve_attempt(&self, key: &ResourceKey, max_attempts: u32) -> Option<u32> {
        let mut used = self.attempts.entry(key.clone()).or_insert(0);
        if *used >= max_attempts {
            return None;
        }
        *used += 1;
        Some(*used)
    }
}

fn unexpected(key: &ResourceKey, payload: &FetchPayload) -> Error {
    Error::Internal(format!("Unexpected response for {}: {:?}", key, payload))
}
