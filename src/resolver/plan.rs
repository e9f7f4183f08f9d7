// src/resolver/plan.rs

//! Resolution result data structures
//!
//! Contains the result types handed back to the caller of a run.

use super::graph::{DependencyArena, EdgeId, NodeKind};
use super::selector::SelectionRationale;
use crate::diagnostics::DiagnosticRecord;
use crate::error::{Error, Result};
use crate::fetch::FetchStats;
use crate::model::library_key;
use crate::platform::PlatformTarget;
use semver::Version;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// The single version chosen for one library on one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLibrary {
    pub kind: NodeKind,
    /// None for project references
    pub version: Option<Version>,
    /// Contributing edges in the graph arena
    pub edges: Vec<EdgeId>,
    /// Depth of the nearest requirement
    pub depth: usize,
    pub rationale: SelectionRationale,
    /// Source the package metadata came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Resolved dependency graph of one project for one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedGraph {
    pub platform: PlatformTarget,
    pub libraries: BTreeMap<String, ResolvedLibrary>,
    #[serde(skip)]
    pub arena: DependencyArena,
}

impl ResolvedGraph {
    /// Library with `library_id`, in any casing
    pub fn get(&self, library_id: &str) -> Option<&ResolvedLibrary> {
        self.libraries.get(library_id).or_else(|| {
            let key = library_key(library_id);
            self.libraries
                .iter()
                .find(|(id, _)| library_key(id) == key)
                .map(|(_, library)| library)
        })
    }

    pub fn version_of(&self, library_id: &str) -> Option<&Version> {
        self.get(library_id).and_then(|l| l.version.as_ref())
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

fn serialize_graphs<S: Serializer>(
    graphs: &BTreeMap<PlatformTarget, ResolvedGraph>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(graphs.iter().map(|(platform, graph)| (platform.graph_name(), graph)))
}

/// Outcome for one top-level project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectResult {
    pub project_id: String,
    pub success: bool,
    /// Only platforms whose walk completed are present
    #[serde(serialize_with = "serialize_graphs")]
    pub graphs_by_platform: BTreeMap<PlatformTarget, ResolvedGraph>,
    pub diagnostics: Vec<DiagnosticRecord>,
}

impl ProjectResult {
    pub fn graph(&self, platform: &PlatformTarget) -> Option<&ResolvedGraph> {
        self.graphs_by_platform.get(platform)
    }
}

/// Result of a whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub success: bool,
    pub projects: Vec<ProjectResult>,
    /// Records of every project, in project order
    pub diagnostics: Vec<DiagnosticRecord>,
    pub fetch: FetchStats,
}

impl ResolutionReport {
    pub fn project(&self, project_id: &str) -> Option<&ProjectResult> {
        let key = library_key(project_id);
        self.projects.iter().find(|p| library_key(&p.project_id) == key)
    }

    /// One line per record, `{level} {code}: {message}`
    pub fn render_diagnostics(&self) -> Vec<String> {
        self.diagnostics.iter().map(|d| d.render()).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Internal(format!("Failed to serialize report: {}", e)))
    }
}
