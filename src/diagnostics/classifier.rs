// src/diagnostics/classifier.rs

//! Turns recorded resolution events into diagnostics
//!
//! Pure and deterministic: identical walks give identical output in the
//! same order. Identical diagnostics (same code, library and message) raised
//! for several platforms of a project are merged into one.

use super::{DependencyPath, Diagnostic};
use crate::diagnostics::DiagnosticCode;
use crate::model::ProjectNode;
use crate::resolver::WalkOutcome;
use std::collections::HashMap;

pub struct DiagnosticClassifier {
    max_paths: usize,
}

impl DiagnosticClassifier {
    /// `max_paths` caps the evidentiary paths kept per diagnostic
    pub fn new(max_paths: usize) -> Self {
        Self {
            max_paths: max_paths.max(1),
        }
    }

    pub fn classify(&self, project: &ProjectNode, walks: &[WalkOutcome]) -> Vec<Diagnostic> {
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let mut index: HashMap<(DiagnosticCode, Option<String>, String), usize> = HashMap::new();

        for walk in walks {
            for event in &walk.events {
                let code = event.code();
                let library_id = event.library_id().map(str::to_string);
                let message = event.to_string();

                let mut paths: Vec<DependencyPath> = Vec::new();
                for edge in event.edges() {
                    if paths.len() >= self.max_paths {
                        break;
                    }
                    let found = walk.arena.paths_to_edge(*edge, self.max_paths - paths.len());
                    merge_paths(&mut paths, found, self.max_paths);
                }

                let key = (code, library_id.clone(), message.clone());
                if let Some(&i) = index.get(&key) {
                    let existing = &mut diagnostics[i];
                    existing.platforms.insert(walk.platform.clone());
                    merge_paths(&mut existing.paths, paths, self.max_paths);
                    continue;
                }

                index.insert(key, diagnostics.len());
                diagnostics.push(Diagnostic {
                    code,
                    severity: code.default_severity(),
                    project_id: project.id.clone(),
                    library_id,
                    file_path: project.file_path.clone(),
                    platforms: [walk.platform.clone()].into(),
                    message,
                    paths,
                });
            }
        }

        diagnostics.sort_by_cached_key(|d| d.sort_key());
        diagnostics
    }
}

fn merge_paths(into: &mut Vec<DependencyPath>, from: Vec<DependencyPath>, limit: usize) {
    for path in from {
        if into.len() >= limit {
            return;
        }
        if !into.contains(&path) {
            into.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::model::{ProjectModel, WarningProperties, validate_models};
    use crate::platform::PlatformTarget;
    use crate::resolver::{DependencyArena, NodeKind, ResolutionEvent};
    use crate::version::VersionRange;
    use semver::Version;
    use std::collections::{BTreeMap, BTreeSet};

    fn project() -> ProjectNode {
        let model = ProjectModel {
            id: "root".to_string(),
            file_path: Some("root.proj".to_string()),
            platforms: vec![PlatformTarget::new("net8.0"), PlatformTarget::new("net6.0")],
            package_references: Vec::new(),
            project_references: Vec::new(),
            warning_properties: WarningProperties::default(),
        };
        validate_models(&[model]).unwrap().get("root").unwrap().clone()
    }

    /// root -> x 1.0.0 -> z (>= 2.0.0), root -> z (1.*)
    fn walk(platform: &str) -> WalkOutcome {
        let mut arena = DependencyArena::new("root");
        let to_z = arena.add_edge(
            DependencyArena::ROOT,
            "z",
            NodeKind::Package,
            VersionRange::parse("1.*").unwrap(),
            BTreeSet::new(),
        );
        let to_x = arena.add_edge(
            DependencyArena::ROOT,
            "x",
            NodeKind::Package,
            VersionRange::parse("1.0.0").unwrap(),
            BTreeSet::new(),
        );
        let z = arena.add_node("z", NodeKind::Package, Some(Version::new(1, 5, 0)), 1);
        let x = arena.add_node("x", NodeKind::Package, Some(Version::new(1, 0, 0)), 1);
        arena.attach(to_z, z);
        arena.attach(to_x, x);
        let x_to_z = arena.add_edge(
            x,
            "z",
            NodeKind::Package,
            VersionRange::parse("2.0.0").unwrap(),
            BTreeSet::new(),
        );
        arena.attach(x_to_z, z);

        WalkOutcome {
            project_id: "root".to_string(),
            platform: PlatformTarget::new(platform),
            arena,
            libraries: BTreeMap::new(),
            events: vec![ResolutionEvent::Downgrade {
                library_id: "z".to_string(),
                resolved: Version::new(1, 5, 0),
                required: Version::new(2, 0, 0),
                edges: vec![x_to_z, to_z],
            }],
            completed: true,
        }
    }

    #[test]
    fn test_downgrade_diagnostic_has_both_paths() {
        let classifier = DiagnosticClassifier::new(256);
        let diagnostics = classifier.classify(&project(), &[walk("net8.0")]);

        assert_eq!(diagnostics.len(), 1);
        let d = &diagnostics[0];
        assert_eq!(d.code, DiagnosticCode::Downgrade);
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.file_path.as_deref(), Some("root.proj"));
        let paths: Vec<String> = d.paths.iter().map(|p| p.render()).collect();
        assert_eq!(
            paths,
            vec![
                "root -> x 1.0.0 -> z (>= 2.0.0)".to_string(),
                "root -> z (>= 1.0.0)".to_string(),
            ]
        );
        assert!(d.full_message().contains("from 2.0.0 to 1.5.0"));
    }

    #[test]
    fn test_identical_diagnostics_merge_across_platforms() {
        let classifier = DiagnosticClassifier::new(256);
        let diagnostics = classifier.classify(&project(), &[walk("net8.0"), walk("net6.0")]);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].platforms.len(), 2);
        assert_eq!(diagnostics[0].paths.len(), 2);
    }

    #[test]
    fn test_path_cap() {
        let classifier = DiagnosticClassifier::new(1);
        let diagnostics = classifier.classify(&project(), &[walk("net8.0")]);
        assert_eq!(diagnostics[0].paths.len(), 1);
    }

    #[test]
    fn test_sorted_by_code_then_library() {
        let mut w = walk("net8.0");
        w.events.insert(
            0,
            ResolutionEvent::PackageNotFound {
                library_id: "a".to_string(),
                range: VersionRange::parse("1.0.0").unwrap(),
                edges: vec![crate::resolver::EdgeId(0)],
            },
        );
        w.events.push(ResolutionEvent::Circular {
            library_id: "x".to_string(),
            edges: vec![crate::resolver::EdgeId(2)],
        });

        let diagnostics = DiagnosticClassifier::new(256).classify(&project(), &[w]);
        let codes: Vec<DiagnosticCode> = diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![
                DiagnosticCode::Circular,
                DiagnosticCode::Downgrade,
                DiagnosticCode::PackageNotFound
            ]
        );
    }
}
