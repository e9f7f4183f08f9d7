// src/resolver/conflict.rs

//! Problems recorded while walking a dependency graph
//!
//! The walk does not build diagnostics itself; it records one event per
//! problem, referring to the arena edges that give evidence for it. The
//! classifier later turns events into diagnostics with rendered paths.

use super::graph::{EdgeId, NodeKind};
use crate::diagnostics::DiagnosticCode;
use crate::fetch::TransportError;
use crate::platform::PlatformTarget;
use crate::version::VersionRange;
use semver::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionEvent {
    /// Nearest requirements with disjoint ranges
    Conflict {
        library_id: String,
        /// (requirer label, range) per nearest requirement
        requirements: Vec<(String, VersionRange)>,
        edges: Vec<EdgeId>,
    },
    /// `edges[0]` closes a cycle back to `library_id`
    Circular {
        library_id: String,
        edges: Vec<EdgeId>,
    },
    /// A farther requirement wanted at least `required`
    Downgrade {
        library_id: String,
        resolved: Version,
        required: Version,
        edges: Vec<EdgeId>,
    },
    /// A farther requirement's ceiling excludes the resolved version
    OutsideConstraint {
        library_id: String,
        requirer: String,
        range: VersionRange,
        resolved: Version,
        edges: Vec<EdgeId>,
    },
    FrameworkIncompatible {
        library_id: String,
        kind: NodeKind,
        version: Option<Version>,
        framework: String,
        supported: Vec<String>,
        edges: Vec<EdgeId>,
    },
    RuntimeIncompatible {
        library_id: String,
        version: Version,
        platform: PlatformTarget,
        edges: Vec<EdgeId>,
    },
    MissingRequestedVersion {
        library_id: String,
        requirer: String,
        range: VersionRange,
        requested: Version,
        resolved: Version,
        edges: Vec<EdgeId>,
    },
    PackageNotFound {
        library_id: String,
        range: VersionRange,
        edges: Vec<EdgeId>,
    },
    /// A source request exhausted its retry budget
    SourceUnavailable { source: String, error: TransportError },
}

impl ResolutionEvent {
    pub fn code(&self) -> DiagnosticCode {
        match self {
            ResolutionEvent::Conflict { .. } => DiagnosticCode::Conflict,
            ResolutionEvent::Circular { .. } => DiagnosticCode::Circular,
            ResolutionEvent::Downgrade { .. } => DiagnosticCode::Downgrade,
            ResolutionEvent::OutsideConstraint { .. } => DiagnosticCode::OutsideConstraint,
            ResolutionEvent::FrameworkIncompatible { .. } => DiagnosticCode::FrameworkIncompatible,
            ResolutionEvent::RuntimeIncompatible { .. } => DiagnosticCode::RuntimeIncompatible,
            ResolutionEvent::MissingRequestedVersion { .. } => DiagnosticCode::MissingRequestedVersion,
            ResolutionEvent::PackageNotFound { .. } => DiagnosticCode::PackageNotFound,
            ResolutionEvent::SourceUnavailable { .. } => DiagnosticCode::SourceUnavailable,
        }
    }

    pub fn library_id(&self) -> Option<&str> {
        match self {
            ResolutionEvent::Conflict { library_id, .. }
            | ResolutionEvent::Circular { library_id, .. }
            | ResolutionEvent::Downgrade { library_id, .. }
            | ResolutionEvent::OutsideConstraint { library_id, .. }
            | ResolutionEvent::FrameworkIncompatible { library_id, .. }
            | ResolutionEvent::RuntimeIncompatible { library_id, .. }
            | ResolutionEvent::MissingRequestedVersion { library_id, .. }
            | ResolutionEvent::PackageNotFound { library_id, .. } => Some(library_id),
            ResolutionEvent::SourceUnavailable { .. } => None,
        }
    }

    /// Edges whose paths are evidence for this event
    pub fn edges(&self) -> &[EdgeId] {
        match self {
            ResolutionEvent::Conflict { edges, .. }
            | ResolutionEvent::Circular { edges, .. }
            | ResolutionEvent::Downgrade { edges, .. }
            | ResolutionEvent::OutsideConstraint { edges, .. }
            | ResolutionEvent::FrameworkIncompatible { edges, .. }
            | ResolutionEvent::RuntimeIncompatible { edges, .. }
            | ResolutionEvent::MissingRequestedVersion { edges, .. }
            | ResolutionEvent::PackageNotFound { edges, .. } => edges,
            ResolutionEvent::SourceUnavailable { .. } => &[],
        }
    }
}

impl std::fmt::Display for ResolutionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionEvent::Conflict {
                library_id,
                requirements,
                ..
            } => {
                let parts: Vec<String> = requirements
                    .iter()
                    .map(|(requirer, range)| format!("{} requires {} ({})", requirer, library_id, range))
                    .collect();
                write!(
                    f,
                    "Version conflict detected for {}: {}.",
                    library_id,
                    parts.join(", ")
                )
            }
            ResolutionEvent::Circular { library_id, .. } => {
                write!(f, "Cycle detected: {} depends on itself.", library_id)
            }
            ResolutionEvent::Downgrade {
                library_id,
                resolved,
                required,
                ..
            } => write!(
                f,
                "Detected package downgrade: {} from {} to {}. Reference the package directly from the project to select a different version.",
                library_id, required, resolved
            ),
            ResolutionEvent::OutsideConstraint {
                library_id,
                requirer,
                range,
                resolved,
                ..
            } => write!(
                f,
                "Detected package version outside of dependency constraint: {} requires {} ({}) but version {} {} was resolved.",
                requirer, library_id, range, library_id, resolved
            ),
            ResolutionEvent::FrameworkIncompatible {
                library_id,
                kind,
                version,
                framework,
                supported,
                ..
            } => {
                let subject = match (kind, version) {
                    (NodeKind::Package, Some(v)) => format!("Package {} {}", library_id, v),
                    (NodeKind::Package, None) => format!("Package {}", library_id),
                    (NodeKind::Project, _) => format!("Project {}", library_id),
                };
                write!(
                    f,
                    "{} is not compatible with {}. {} supports: {}",
                    subject,
                    framework,
                    subject,
                    if supported.is_empty() {
                        "(none)".to_string()
                    } else {
                        supported.join(", ")
                    }
                )
            }
            ResolutionEvent::RuntimeIncompatible {
                library_id,
                version,
                platform,
                ..
            } => write!(
                f,
                "Package {} {} has no runtime assets compatible with {}.",
                library_id, version, platform
            ),
            ResolutionEvent::MissingRequestedVersion {
                library_id,
                requirer,
                range,
                requested,
                resolved,
                ..
            } => write!(
                f,
                "{} depends on {} ({}) but {} {} was not found. An approximate best match of {} {} was resolved.",
                requirer, library_id, range, library_id, requested, library_id, resolved
            ),
            ResolutionEvent::PackageNotFound { library_id, range, .. } => {
                write!(f, "Unable to find package {} with version ({}).", library_id, range)
            }
            ResolutionEvent::SourceUnavailable { source, error } => {
                write!(f, "Unable to load package information from source '{}': {}", source, error)
            }
        }
    }
}
