// src/diagnostics/mod.rs

//! Diagnostics produced by a resolution run
//!
//! The resolver records what went wrong while walking the graph; the
//! [`DiagnosticClassifier`] turns those records into [`Diagnostic`]s with
//! evidentiary dependency paths, and the [`SuppressionEngine`] filters and
//! escalates them into the [`DiagnosticRecord`]s handed back to the caller.

mod classifier;
mod suppression;

pub use classifier::DiagnosticClassifier;
pub use suppression::SuppressionEngine;

use crate::error::{Error, Result};
use crate::platform::PlatformTarget;
use crate::resolver::NodeKind;
use crate::version::VersionRange;
use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Closed set of diagnostic codes
///
/// Declaration order is the sort order of diagnostics in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticCode {
    /// Equal-depth requirements with disjoint ranges
    Conflict,
    /// A library transitively requires itself
    Circular,
    /// Resolved version is below a transitive requirement's floor
    Downgrade,
    /// Resolved version is outside a transitive requirement's ceiling
    OutsideConstraint,
    /// No compatible assets/platform for a package or project
    FrameworkIncompatible,
    /// No runtime assets for the requested runtime identifier
    RuntimeIncompatible,
    /// The requested lower bound is missing; a higher version was chosen
    MissingRequestedVersion,
    /// No version satisfying the requirement exists in any source
    PackageNotFound,
    /// A source could not be reached within the retry budget
    SourceUnavailable,
}

impl DiagnosticCode {
    pub const ALL: [DiagnosticCode; 9] = [
        DiagnosticCode::Conflict,
        DiagnosticCode::Circular,
        DiagnosticCode::Downgrade,
        DiagnosticCode::OutsideConstraint,
        DiagnosticCode::FrameworkIncompatible,
        DiagnosticCode::RuntimeIncompatible,
        DiagnosticCode::MissingRequestedVersion,
        DiagnosticCode::PackageNotFound,
        DiagnosticCode::SourceUnavailable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::Conflict => "CONFLICT",
            DiagnosticCode::Circular => "CIRCULAR",
            DiagnosticCode::Downgrade => "DOWNGRADE",
            DiagnosticCode::OutsideConstraint => "OUTSIDE_CONSTRAINT",
            DiagnosticCode::FrameworkIncompatible => "FRAMEWORK_INCOMPATIBLE",
            DiagnosticCode::RuntimeIncompatible => "RUNTIME_INCOMPATIBLE",
            DiagnosticCode::MissingRequestedVersion => "MISSING_REQUESTED_VERSION",
            DiagnosticCode::PackageNotFound => "PACKAGE_NOT_FOUND",
            DiagnosticCode::SourceUnavailable => "SOURCE_UNAVAILABLE",
        }
    }

    /// Severity a diagnostic with this code starts out with
    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticCode::Downgrade
            | DiagnosticCode::OutsideConstraint
            | DiagnosticCode::MissingRequestedVersion => Severity::Warning,
            DiagnosticCode::Conflict
            | DiagnosticCode::Circular
            | DiagnosticCode::FrameworkIncompatible
            | DiagnosticCode::RuntimeIncompatible
            | DiagnosticCode::PackageNotFound
            | DiagnosticCode::SourceUnavailable => Severity::Error,
        }
    }

    /// Only warnings can be suppressed or escalated
    pub fn is_suppressible(&self) -> bool {
        self.default_severity() == Severity::Warning
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagnosticCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        DiagnosticCode::ALL
            .into_iter()
            .find(|code| code.as_str() == normalized)
            .ok_or_else(|| Error::ConfigurationError(format!("Unknown diagnostic code '{}'", s)))
    }
}

impl Serialize for DiagnosticCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DiagnosticCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One edge of an evidentiary path, detached from the walk arena
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathSegment {
    pub from: String,
    pub from_kind: NodeKind,
    pub from_version: Option<Version>,
    pub to: String,
    pub to_kind: NodeKind,
    pub range: VersionRange,
    pub suppressions: BTreeSet<DiagnosticCode>,
    pub depth: usize,
}

impl PathSegment {
    fn render_from(&self) -> String {
        match (&self.from_kind, &self.from_version) {
            (NodeKind::Package, Some(version)) => format!("{} {}", self.from, version),
            _ => self.from.clone(),
        }
    }

    fn render_to(&self) -> String {
        if self.to_kind == NodeKind::Project || self.range == VersionRange::any() {
            self.to.clone()
        } else {
            format!("{} ({})", self.to, self.range)
        }
    }
}

/// A chain of requirement edges starting at a top-level project
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DependencyPath {
    pub segments: Vec<PathSegment>,
}

impl DependencyPath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Project the path is rooted at
    pub fn root(&self) -> Option<&str> {
        self.segments.first().map(|s| s.from.as_str())
    }

    /// Render as `root -> x 1.0.0 -> z (>= 2.0.0)`
    pub fn render(&self) -> String {
        let Some(last) = self.segments.last() else {
            return String::new();
        };

        let mut parts: Vec<String> = self.segments.iter().map(|s| s.render_from()).collect();
        parts.push(last.render_to());
        parts.join(" -> ")
    }
}

impl fmt::Display for DependencyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// A classified resolution problem with its evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// Top-level project the resolution ran for
    pub project_id: String,
    pub library_id: Option<String>,
    pub file_path: Option<String>,
    pub platforms: BTreeSet<PlatformTarget>,
    /// Headline without the dependency chains
    pub message: String,
    pub paths: Vec<DependencyPath>,
}

impl Diagnostic {
    /// Headline followed by every evidentiary path, one per line
    pub fn full_message(&self) -> String {
        let mut message = self.message.clone();
        for path in &self.paths {
            message.push_str("\n  ");
            message.push_str(&path.render());
        }
        message
    }

    /// Key used to order diagnostics deterministically
    pub(crate) fn sort_key(&self) -> (DiagnosticCode, String, String) {
        (
            self.code,
            self.library_id.clone().unwrap_or_default(),
            self.paths.first().map(|p| p.render()).unwrap_or_default(),
        )
    }
}

/// A surviving diagnostic as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticRecord {
    pub code: DiagnosticCode,
    pub level: Severity,
    pub project_id: String,
    pub library_id: Option<String>,
    pub target_graphs: Vec<String>,
    pub file_path: Option<String>,
    pub message: String,
}

impl DiagnosticRecord {
    /// One-line rendering, e.g. `warning DOWNGRADE: Detected package downgrade ...`
    pub fn render(&self) -> String {
        format!("{} {}: {}", self.level, self.code, self.message.replace('\n', " "))
    }
}
