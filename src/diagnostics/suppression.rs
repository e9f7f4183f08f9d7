// src/diagnostics/suppression.rs

//! NoWarn / WarningsAsErrors policy
//!
//! A warning survives on a path unless an edge of the path suppresses its
//! code or a project on the path (other than the terminal library) lists it
//! in NoWarn. A warning with no surviving path is dropped. Each surviving
//! path becomes one record, escalated to an error when the project at the
//! root of the path asks for it. Errors are never suppressed.

use super::{DependencyPath, Diagnostic, DiagnosticCode, DiagnosticRecord, Severity};
use crate::model::ProjectSet;
use crate::resolver::NodeKind;
use tracing::debug;

pub struct SuppressionEngine<'a> {
    projects: &'a ProjectSet,
}

impl<'a> SuppressionEngine<'a> {
    pub fn new(projects: &'a ProjectSet) -> Self {
        Self { projects }
    }

    /// Filter and escalate `diagnostics` into caller-facing records
    pub fn apply(&self, diagnostics: &[Diagnostic]) -> Vec<DiagnosticRecord> {
        let mut records = Vec::new();

        for diagnostic in diagnostics {
            if !diagnostic.code.is_suppressible() {
                records.extend(self.error_records(diagnostic));
                continue;
            }

            if diagnostic.paths.is_empty() {
                let owner = diagnostic.project_id.as_str();
                if self.owner_suppresses(owner, diagnostic.code) {
                    debug!("Suppressed {} for {}", diagnostic.code, owner);
                    continue;
                }
                records.push(self.record(diagnostic, self.level_for(owner, diagnostic.code), None));
                continue;
            }

            let surviving: Vec<&DependencyPath> = diagnostic
                .paths
                .iter()
                .filter(|path| !self.is_path_suppressed(diagnostic.code, path))
                .collect();

            if surviving.is_empty() {
                debug!(
                    "Suppressed {} for {} on every path",
                    diagnostic.code,
                    diagnostic.library_id.as_deref().unwrap_or("-")
                );
                continue;
            }

            for path in surviving {
                let owner = path.root().unwrap_or(&diagnostic.project_id);
                let level = self.level_for(owner, diagnostic.code);
                if level == Severity::Error {
                    debug!("Escalated {} to error for {}", diagnostic.code, owner);
                }
                records.push(self.record(diagnostic, level, Some(path)));
            }
        }

        records
    }

    /// Whether an edge or an intermediate project on `path` suppresses `code`
    pub fn is_path_suppressed(&self, code: DiagnosticCode, path: &DependencyPath) -> bool {
        path.segments.iter().any(|segment| {
            segment.suppressions.contains(&code)
                || (segment.from_kind == NodeKind::Project && self.owner_suppresses(&segment.from, code))
        })
    }

    /// No record of Error level present
    pub fn succeeded(records: &[DiagnosticRecord]) -> bool {
        records.iter().all(|r| r.level != Severity::Error)
    }

    fn owner_suppresses(&self, owner: &str, code: DiagnosticCode) -> bool {
        self.projects
            .scope(owner)
            .is_some_and(|scope| scope.suppresses(code))
    }

    fn level_for(&self, owner: &str, code: DiagnosticCode) -> Severity {
        let escalated = self
            .projects
            .scope(owner)
            .is_some_and(|scope| scope.escalates(code));
        if escalated { Severity::Error } else { code.default_severity() }
    }

    fn error_records(&self, diagnostic: &Diagnostic) -> Vec<DiagnosticRecord> {
        if diagnostic.paths.is_empty() {
            return vec![self.record(diagnostic, Severity::Error, None)];
        }
        diagnostic
            .paths
            .iter()
            .map(|path| self.record(diagnostic, Severity::Error, Some(path)))
            .collect()
    }

    fn record(&self, diagnostic: &Diagnostic, level: Severity, path: Option<&DependencyPath>) -> DiagnosticRecord {
        let message = match path {
            Some(path) => format!("{}\n  {}", diagnostic.message, path.render()),
            None => diagnostic.message.clone(),
        };

        DiagnosticRecord {
            code: diagnostic.code,
            level,
            project_id: diagnostic.project_id.clone(),
            library_id: diagnostic.library_id.clone(),
            target_graphs: diagnostic.platforms.iter().map(|p| p.graph_name()).collect(),
            file_path: diagnostic.file_path.clone(),
            message,
        }
    }
}
