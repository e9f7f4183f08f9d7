// src/resolver/walk.rs

//! Graph walk and version resolution for one (project, platform) pair
//!
//! The walk proceeds level by level from the root project. At each level
//! the pending requirement edges are grouped by library id, in the order
//! they were declared:
//! - an edge whose library is already on its own ancestry closes a cycle
//! - a library resolved at a shallower level takes the edge as a
//!   transitive requirement (nearest wins)
//! - otherwise the edges are the library's nearest requirements; their
//!   ranges must intersect, and the version is selected from the
//!   intersection
//!
//! Transitive requirements are checked against the chosen versions once
//! the walk is done, followed by the asset compatibility pass.

use super::compat::{AssetCheck, check_assets, dependencies_for};
use super::conflict::ResolutionEvent;
use super::graph::{DependencyArena, EdgeId, NodeId, NodeKind};
use super::plan::ResolvedLibrary;
use super::selector::{SelectionRationale, select_version};
use crate::error::{Error, Result};
use crate::fetch::ResilientFetcher;
use crate::model::{ProjectNode, ProjectSet, library_key};
use crate::platform::{PlatformCompatibility, PlatformTarget};
use crate::version::VersionRange;
use futures::future::join_all;
use semver::Version;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Everything one walk produced
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub project_id: String,
    pub platform: PlatformTarget,
    pub arena: DependencyArena,
    pub libraries: BTreeMap<String, ResolvedLibrary>,
    pub events: Vec<ResolutionEvent>,
    /// False when a source failure stopped the walk; nothing is published
    pub completed: bool,
}

/// Lookups are by [`library_key`]; `libraries` keeps the display id
struct WalkState {
    arena: DependencyArena,
    resolved: HashMap<String, NodeId>,
    failed: HashSet<String>,
    libraries: BTreeMap<String, ResolvedLibrary>,
    events: Vec<ResolutionEvent>,
    /// Nearest requirement edges per resolved package
    nearest: HashMap<String, Vec<EdgeId>>,
    transitive: Vec<EdgeId>,
    sources: HashMap<String, usize>,
}

impl WalkState {
    fn new(root: &str) -> Self {
        Self {
            arena: DependencyArena::new(root),
            resolved: HashMap::new(),
            failed: HashSet::new(),
            libraries: BTreeMap::new(),
            events: Vec::new(),
            nearest: HashMap::new(),
            transitive: Vec::new(),
            sources: HashMap::new(),
        }
    }

    fn attach(&mut self, edges: &[EdgeId], node: NodeId) {
        for edge in edges {
            self.arena.attach(*edge, node);
        }
    }
}

pub struct GraphBuilder<'a> {
    projects: &'a ProjectSet,
    fetcher: &'a ResilientFetcher,
    compat: &'a PlatformCompatibility,
    cancel: &'a CancellationToken,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        projects: &'a ProjectSet,
        fetcher: &'a ResilientFetcher,
        compat: &'a PlatformCompatibility,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            projects,
            fetcher,
            compat,
            cancel,
        }
    }

    /// Walk `root` for `platform`
    ///
    /// Only cancellation (and internal faults) produce an error; a source
    /// that stays unreachable yields an incomplete outcome carrying a single
    /// source event.
    pub async fn build(&self, root: &ProjectNode, platform: &PlatformTarget) -> Result<WalkOutcome> {
        debug!("Resolving {} for {}", root.id, platform);

        let mut state = WalkState::new(&root.id);
        let first_level = expand_project(&mut state.arena, DependencyArena::ROOT, root, &platform.framework);

        let walked = match self.walk(&mut state, first_level, platform).await {
            Ok(()) => self.check_compatibility(&mut state, platform).await,
            Err(e) => Err(e),
        };

        match walked {
            Ok(()) => {
                check_transitive(&mut state);
                debug!(
                    "Resolved {} for {}: {} libraries, {} event(s)",
                    root.id,
                    platform,
                    state.libraries.len(),
                    state.events.len()
                );
                Ok(WalkOutcome {
                    project_id: root.id.clone(),
                    platform: platform.clone(),
                    arena: state.arena,
                    libraries: state.libraries,
                    events: state.events,
                    completed: true,
                })
            }
            Err(Error::Transport(error)) => {
                warn!("Resolution of {} for {} stopped: {}", root.id, platform, error);
                Ok(WalkOutcome {
                    project_id: root.id.clone(),
                    platform: platform.clone(),
                    arena: state.arena,
                    libraries: BTreeMap::new(),
                    events: vec![ResolutionEvent::SourceUnavailable {
                        source: error.key.source.clone(),
                        error,
                    }],
                    completed: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn walk(&self, state: &mut WalkState, mut level: Vec<EdgeId>, platform: &PlatformTarget) -> Result<()> {
        while !level.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let mut next = Vec::new();
            for (library_id, edges) in group_by_library(&state.arena, &level) {
                let key = library_key(&library_id);
                let edges = drop_cycles(state, &library_id, edges);
                if edges.is_empty() || state.failed.contains(&key) {
                    continue;
                }

                if let Some(&node) = state.resolved.get(&key) {
                    state.attach(&edges, node);
                    let display = state.arena.node(node).library_id.clone();
                    if let Some(library) = state.libraries.get_mut(&display) {
                        library.edges.extend(edges.iter().copied());
                    }
                    state.transitive.extend(edges);
                    continue;
                }

                let is_project = self.projects.contains(&library_id)
                    && edges
                        .iter()
                        .any(|e| state.arena.edge(*e).to_kind == NodeKind::Project);

                if is_project {
                    next.extend(self.resolve_project(state, &library_id, edges, platform));
                } else {
                    next.extend(self.resolve_package(state, &library_id, edges, platform).await?);
                }
            }
            level = next;
        }
        Ok(())
    }

    fn resolve_project(
        &self,
        state: &mut WalkState,
        library_id: &str,
        edges: Vec<EdgeId>,
        platform: &PlatformTarget,
    ) -> Vec<EdgeId> {
        let Some(project) = self.projects.get(library_id) else {
            return Vec::new();
        };
        let key = library_key(library_id);

        let frameworks = project.frameworks();
        let Some(framework) = self
            .compat
            .nearest(&platform.framework, frameworks.iter().copied())
            .map(str::to_string)
        else {
            state.events.push(ResolutionEvent::FrameworkIncompatible {
                library_id: library_id.to_string(),
                kind: NodeKind::Project,
                version: None,
                framework: platform.framework.clone(),
                supported: frameworks.iter().map(|f| f.to_string()).collect(),
                edges,
            });
            state.failed.insert(key);
            return Vec::new();
        };

        let depth = state.arena.edge(edges[0]).depth;
        let node = state.arena.add_node(&project.id, NodeKind::Project, None, depth);
        state.attach(&edges, node);
        state.resolved.insert(key, node);
        state.libraries.insert(
            project.id.clone(),
            ResolvedLibrary {
                kind: NodeKind::Project,
                version: None,
                edges,
                depth,
                rationale: SelectionRationale::ProjectReference {
                    framework: framework.clone(),
                },
                source: None,
            },
        );

        expand_project(&mut state.arena, node, project, &framework)
    }

    async fn resolve_package(
        &self,
        state: &mut WalkState,
        library_id: &str,
        edges: Vec<EdgeId>,
        platform: &PlatformTarget,
    ) -> Result<Vec<EdgeId>> {
        let key = library_key(library_id);
        let ranges: Vec<VersionRange> = edges
            .iter()
            .map(|e| state.arena.edge(*e).range.clone())
            .collect();

        let Some(range) = intersect_all(&ranges) else {
            let requirements = edges
                .iter()
                .map(|e| {
                    let edge = state.arena.edge(*e);
                    (state.arena.node(edge.from).label(), edge.range.clone())
                })
                .collect();
            state.events.push(ResolutionEvent::Conflict {
                library_id: library_id.to_string(),
                requirements,
                edges,
            });
            state.failed.insert(key);
            return Ok(Vec::new());
        };

        let available = self.available_versions(library_id).await?;
        let versions: Vec<Version> = available.keys().cloned().collect();

        let Some(selection) = select_version(&versions, &range) else {
            state.events.push(ResolutionEvent::PackageNotFound {
                library_id: library_id.to_string(),
                range,
                edges,
            });
            state.failed.insert(key);
            return Ok(Vec::new());
        };

        let version = selection.version;
        let Some(&source) = available.get(&version) else {
            return Err(Error::Internal(format!(
                "Selected {} {} is not offered by any source",
                library_id, version
            )));
        };

        let depth = state.arena.edge(edges[0]).depth;
        let node = state
            .arena
            .add_node(library_id, NodeKind::Package, Some(version.clone()), depth);
        state.attach(&edges, node);

        if let SelectionRationale::ApproximateMatch { requested } = &selection.rationale {
            let asked: Vec<EdgeId> = edges
                .iter()
                .copied()
                .filter(|e| state.arena.edge(*e).range.floor.as_ref() == Some(requested))
                .collect();
            let asked = if asked.is_empty() { edges.clone() } else { asked };
            let first = state.arena.edge(asked[0]);

            state.events.push(ResolutionEvent::MissingRequestedVersion {
                library_id: library_id.to_string(),
                requirer: state.arena.node(first.from).label(),
                range: first.range.clone(),
                requested: requested.clone(),
                resolved: version.clone(),
                edges: asked,
            });
        }

        let groups = self
            .fetcher
            .get_dependencies(source, library_id, &version, self.cancel)
            .await?;

        let next: Vec<EdgeId> = dependencies_for(&groups, &platform.framework, self.compat)
            .iter()
            .map(|dep| {
                state.arena.add_edge(
                    node,
                    &dep.id,
                    NodeKind::Package,
                    dep.range.clone(),
                    BTreeSet::new(),
                )
            })
            .collect();

        state.resolved.insert(key.clone(), node);
        state.nearest.insert(key.clone(), edges.clone());
        state.sources.insert(key, source);
        state.libraries.insert(
            library_id.to_string(),
            ResolvedLibrary {
                kind: NodeKind::Package,
                version: Some(version),
                edges,
                depth,
                rationale: selection.rationale,
                source: self.fetcher.source_name(source).map(str::to_string),
            },
        );

        Ok(next)
    }

    /// Versions of `id` across every source; the first source offering a
    /// version is the one its metadata is read from
    ///
    /// Every source is allowed to finish so that no request is abandoned
    /// halfway through its retries. Cancellation takes precedence over a
    /// source failure, then the first failing source in declaration order.
    async fn available_versions(&self, id: &str) -> Result<BTreeMap<Version, usize>> {
        let per_source = join_all(
            (0..self.fetcher.sources().len())
                .map(|index| self.fetcher.list_versions(index, id, self.cancel)),
        )
        .await;

        if per_source.iter().any(|r| matches!(r, Err(Error::Cancelled))) {
            return Err(Error::Cancelled);
        }

        let mut available = BTreeMap::new();
        for (index, versions) in per_source.into_iter().enumerate() {
            for version in versions? {
                available.entry(version).or_insert(index);
            }
        }
        Ok(available)
    }

    async fn check_compatibility(&self, state: &mut WalkState, platform: &PlatformTarget) -> Result<()> {
        let packages: Vec<(String, Version, usize, NodeId)> = state
            .libraries
            .iter()
            .filter_map(|(id, library)| {
                let version = library.version.clone()?;
                let key = library_key(id);
                let source = *state.sources.get(&key)?;
                let node = *state.resolved.get(&key)?;
                Some((id.clone(), version, source, node))
            })
            .collect();

        for (library_id, version, source, node) in packages {
            let assets = self
                .fetcher
                .get_asset_groups(source, &library_id, &version, self.cancel)
                .await?;

            let edges = state.arena.node(node).incoming.clone();
            match check_assets(&assets, platform, self.compat) {
                AssetCheck::Compatible => {}
                AssetCheck::FrameworkIncompatible { supported } => {
                    state.events.push(ResolutionEvent::FrameworkIncompatible {
                        library_id,
                        kind: NodeKind::Package,
                        version: Some(version),
                        framework: platform.framework.clone(),
                        supported,
                        edges,
                    });
                }
                AssetCheck::RuntimeIncompatible => {
                    state.events.push(ResolutionEvent::RuntimeIncompatible {
                        library_id,
                        version,
                        platform: platform.clone(),
                        edges,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Requirement edges declared by a project for `framework`
fn expand_project(arena: &mut DependencyArena, node: NodeId, project: &ProjectNode, framework: &str) -> Vec<EdgeId> {
    let mut edges: Vec<EdgeId> = project
        .requirements
        .iter()
        .filter(|r| r.applies_to(framework))
        .map(|r| {
            arena.add_edge(
                node,
                &r.library_id,
                NodeKind::Package,
                r.range.clone(),
                r.suppressions.clone(),
            )
        })
        .collect();

    edges.extend(project.project_references.iter().map(|link| {
        arena.add_edge(
            node,
            &link.project_id,
            NodeKind::Project,
            VersionRange::any(),
            link.suppressions.clone(),
        )
    }));

    edges
}

/// Group a level's edges by library, keeping first-seen order and the
/// first-seen casing of the id
fn group_by_library(arena: &DependencyArena, level: &[EdgeId]) -> Vec<(String, Vec<EdgeId>)> {
    let mut groups: Vec<(String, Vec<EdgeId>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for edge in level {
        let library_id = &arena.edge(*edge).to_library;
        match index.entry(library_key(library_id)) {
            Entry::Occupied(slot) => groups[*slot.get()].1.push(*edge),
            Entry::Vacant(slot) => {
                slot.insert(groups.len());
                groups.push((library_id.clone(), vec![*edge]));
            }
        }
    }
    groups
}

/// Remove edges that lead back to their own ancestry, recording each cycle
fn drop_cycles(state: &mut WalkState, library_id: &str, edges: Vec<EdgeId>) -> Vec<EdgeId> {
    let mut kept = Vec::with_capacity(edges.len());
    for edge in edges {
        let from = state.arena.edge(edge).from;
        if state.arena.has_ancestor(from, library_id) {
            debug!("Cycle back to {} via edge {:?}", library_id, edge);
            state.events.push(ResolutionEvent::Circular {
                library_id: library_id.to_string(),
                edges: vec![edge],
            });
        } else {
            kept.push(edge);
        }
    }
    kept
}

fn intersect_all(ranges: &[VersionRange]) -> Option<VersionRange> {
    let (first, rest) = ranges.split_first()?;
    rest.iter().try_fold(first.clone(), |acc, range| acc.intersect(range))
}

/// Compare every transitive requirement with the version its nearest
/// requirements selected
fn check_transitive(state: &mut WalkState) {
    for edge_id in state.transitive.clone() {
        let edge = state.arena.edge(edge_id);
        let Some(target) = edge.target else {
            continue;
        };
        let node = state.arena.node(target);
        let Some(resolved) = node.version.clone() else {
            continue;
        };

        let mut evidence = vec![edge_id];
        if let Some(nearest) = state.nearest.get(&library_key(&node.library_id)) {
            evidence.extend(nearest.iter().copied());
        }

        if edge.range.is_below_floor(&resolved) {
            let Some(required) = edge.range.floor.clone() else {
                continue;
            };
            state.events.push(ResolutionEvent::Downgrade {
                library_id: node.library_id.clone(),
                resolved,
                required,
                edges: evidence,
            });
        } else if edge.range.is_above_ceiling(&resolved) {
            state.events.push(ResolutionEvent::OutsideConstraint {
                library_id: node.library_id.clone(),
                requirer: state.arena.node(edge.from).label(),
                range: edge.range.clone(),
                resolved,
                edges: evidence,
            });
        }
    }
}
