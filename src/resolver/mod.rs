// src/resolver/mod.rs

//! Dependency graph construction and version resolution
//!
//! A run resolves every (project, platform) pair of the supplied projects
//! independently, on a bounded pool of tokio tasks. Each pair produces an
//! arena graph plus the problems recorded during its walk; once all pairs
//! are done, the problems of each project are classified into diagnostics
//! and passed through that project's suppression policy.

mod compat;
mod conflict;
mod graph;
mod plan;
mod selector;
mod walk;

pub use compat::{AssetCheck, check_assets, dependencies_for};
pub use conflict::ResolutionEvent;
pub use graph::{DependencyArena, EdgeId, GraphEdge, GraphNode, NodeId, NodeKind};
pub use plan::{ProjectResult, ResolutionReport, ResolvedGraph, ResolvedLibrary};
pub use selector::{Selection, SelectionRationale, select_version};
pub use walk::{GraphBuilder, WalkOutcome};

use crate::config::ResolverConfig;
use crate::diagnostics::{DiagnosticClassifier, SuppressionEngine};
use crate::error::{Error, Result};
use crate::fetch::{ResilientFetcher, RunCache};
use crate::model::{ProjectModel, validate_models};
use crate::platform::{PlatformCompatibility, PlatformTarget};
use crate::source::PackageSource;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Entry point of the restore core
pub struct Resolver {
    config: ResolverConfig,
    sources: Vec<Arc<dyn PackageSource>>,
    compat: Arc<PlatformCompatibility>,
}

impl Resolver {
    pub fn new(config: ResolverConfig, sources: Vec<Arc<dyn PackageSource>>) -> Self {
        let compat = Arc::new(config.compatibility());
        Self {
            config,
            sources,
            compat,
        }
    }

    /// Build a resolver whose sources come from the configuration
    pub fn from_config(config: ResolverConfig) -> Result<Self> {
        let sources = config.open_sources()?;
        Ok(Self::new(config, sources))
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Fetcher with a fresh run-scoped cache over this resolver's sources
    pub fn new_fetcher(&self) -> ResilientFetcher {
        ResilientFetcher::new(
            self.sources.clone(),
            Arc::new(RunCache::new()),
            self.config.retry.clone(),
        )
    }

    /// Resolve `models` with a fresh fetcher
    pub async fn resolve(&self, models: &[ProjectModel], cancel: &CancellationToken) -> Result<ResolutionReport> {
        self.resolve_with(models, Arc::new(self.new_fetcher()), cancel)
            .await
    }

    /// Resolve `models` through an explicitly supplied fetcher
    pub async fn resolve_with(
        &self,
        models: &[ProjectModel],
        fetcher: Arc<ResilientFetcher>,
        cancel: &CancellationToken,
    ) -> Result<ResolutionReport> {
        let projects = Arc::new(validate_models(models)?);

        let pairs: Vec<(String, PlatformTarget)> = projects
            .iter()
            .flat_map(|p| p.platforms.iter().map(|platform| (p.id.clone(), platform.clone())))
            .collect();

        let workers = self.config.workers();
        info!(
            "Resolving {} project(s), {} platform graph(s) on {} worker(s)",
            projects.len(),
            pairs.len(),
            workers
        );

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let outcomes: Vec<Result<WalkOutcome>> = futures::stream::iter(pairs)
            .map(|(project_id, platform)| {
                let projects = Arc::clone(&projects);
                let fetcher = Arc::clone(&fetcher);
                let compat = Arc::clone(&self.compat);
                let cancel = cancel.clone();

                tokio::spawn(async move {
                    let Some(project) = projects.get(&project_id) else {
                        return Err(Error::Internal(format!("Unknown project '{}'", project_id)));
                    };
                    GraphBuilder::new(&projects, &fetcher, &compat, &cancel)
                        .build(project, &platform)
                        .await
                })
            })
            .buffered(workers)
            .map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(e) => Err(Error::Internal(format!("Resolution task failed: {}", e))),
            })
            .collect()
            .await;

        // Nothing is published from a cancelled run
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut by_project: BTreeMap<String, Vec<WalkOutcome>> = BTreeMap::new();
        for outcome in outcomes {
            let outcome = outcome?;
            by_project
                .entry(outcome.project_id.clone())
                .or_default()
                .push(outcome);
        }

        let classifier = DiagnosticClassifier::new(self.config.max_paths_per_diagnostic);
        let suppression = SuppressionEngine::new(&projects);

        let mut results = Vec::with_capacity(projects.len());
        let mut all_records = Vec::new();

        for project in projects.iter() {
            let walks = by_project.remove(&project.id).unwrap_or_default();

            let diagnostics = classifier.classify(project, &walks);
            let records = suppression.apply(&diagnostics);
            let success = SuppressionEngine::succeeded(&records)
                && walks.iter().all(|w| w.completed);

            let graphs_by_platform: BTreeMap<PlatformTarget, ResolvedGraph> = walks
                .into_iter()
                .filter(|w| w.completed)
                .map(|w| {
                    (
                        w.platform.clone(),
                        ResolvedGraph {
                            platform: w.platform,
                            libraries: w.libraries,
                            arena: w.arena,
                        },
                    )
                })
                .collect();

            debug!(
                "Project {}: {} graph(s), {} diagnostic record(s), success={}",
                project.id,
                graphs_by_platform.len(),
                records.len(),
                success
            );

            all_records.extend(records.iter().cloned());
            results.push(ProjectResult {
                project_id: project.id.clone(),
                success,
                graphs_by_platform,
                diagnostics: records,
            });
        }

        let success = results.iter().all(|r| r.success);
        let fetch = fetcher.stats();
        info!(
            "Resolution finished: success={}, {} diagnostic record(s), {} source request(s)",
            success,
            all_records.len(),
            fetch.attempts
        );

        Ok(ResolutionReport {
            success,
            projects: results,
            diagnostics: all_records,
            fetch,
        })
    }
}
