// src/model.rs

//! Project model consumed by the resolver
//!
//! A [`ProjectModel`] is what the manifest-parsing collaborator hands over:
//! plain strings for ranges and diagnostic codes. [`validate_models`] checks
//! it and produces the typed [`ProjectSet`] the resolver works from. Every
//! problem found here is a configuration error and aborts the run before any
//! graph is built.
//!
//! Package and project ids compare case-insensitively; the casing of the
//! first declaration is the one shown.

use crate::diagnostics::DiagnosticCode;
use crate::error::{Error, Result};
use crate::platform::PlatformTarget;
use crate::version::VersionRange;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Comparison key of a package or project id
pub fn library_key(id: &str) -> String {
    id.to_lowercase()
}

/// A project as described by its build manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectModel {
    pub id: String,
    #[serde(default)]
    pub file_path: Option<String>,
    pub platforms: Vec<PlatformTarget>,
    #[serde(default)]
    pub package_references: Vec<PackageReference>,
    #[serde(default)]
    pub project_references: Vec<ProjectReference>,
    #[serde(default)]
    pub warning_properties: WarningProperties,
}

/// Direct reference to a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageReference {
    pub id: String,
    /// Version range in interval notation
    pub version: String,
    /// Codes suppressed for everything reached through this reference
    #[serde(default)]
    pub no_warn: Vec<String>,
    /// Limit the reference to these frameworks (all platforms if unset)
    #[serde(default)]
    pub frameworks: Option<Vec<String>>,
}

/// Direct reference to another project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectReference {
    pub id: String,
    #[serde(default)]
    pub no_warn: Vec<String>,
}

/// Project-wide warning properties
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WarningProperties {
    #[serde(default)]
    pub no_warn: Vec<String>,
    /// Codes escalated to errors; `*` escalates everything
    #[serde(default)]
    pub warnings_as_errors: Vec<String>,
    /// Codes exempt from escalation
    #[serde(default)]
    pub warnings_not_as_errors: Vec<String>,
    #[serde(default)]
    pub treat_warnings_as_errors: bool,
}

/// Which warnings a project escalates to errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarnAsError {
    Codes(BTreeSet<DiagnosticCode>),
    All,
}

impl WarnAsError {
    pub fn contains(&self, code: DiagnosticCode) -> bool {
        match self {
            WarnAsError::All => true,
            WarnAsError::Codes(codes) => codes.contains(&code),
        }
    }
}

impl Default for WarnAsError {
    fn default() -> Self {
        WarnAsError::Codes(BTreeSet::new())
    }
}

/// Suppression and escalation policy owned by one project
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SuppressionScope {
    pub owner_id: String,
    pub no_warn_codes: BTreeSet<DiagnosticCode>,
    pub warn_as_error_codes: WarnAsError,
    pub warn_not_as_error_codes: BTreeSet<DiagnosticCode>,
    pub treat_all_warnings_as_errors: bool,
}

impl SuppressionScope {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            ..Default::default()
        }
    }

    pub fn suppresses(&self, code: DiagnosticCode) -> bool {
        self.no_warn_codes.contains(&code)
    }

    /// Whether a surviving warning with `code` becomes an error for this owner
    ///
    /// NoWarn always wins over escalation.
    pub fn escalates(&self, code: DiagnosticCode) -> bool {
        if self.suppresses(code) || self.warn_not_as_error_codes.contains(&code) {
            return false;
        }
        self.treat_all_warnings_as_errors || self.warn_as_error_codes.contains(code)
    }
}

/// Validated direct package requirement of a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectRequirement {
    pub library_id: String,
    pub range: VersionRange,
    pub suppressions: BTreeSet<DiagnosticCode>,
    pub frameworks: Option<BTreeSet<String>>,
}

impl DirectRequirement {
    /// Whether this requirement is declared for `framework`
    pub fn applies_to(&self, framework: &str) -> bool {
        self.frameworks
            .as_ref()
            .is_none_or(|set| set.contains(framework))
    }
}

/// Validated project reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLink {
    pub project_id: String,
    pub suppressions: BTreeSet<DiagnosticCode>,
}

/// Validated project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectNode {
    pub id: String,
    pub file_path: Option<String>,
    pub platforms: Vec<PlatformTarget>,
    pub requirements: Vec<DirectRequirement>,
    pub project_references: Vec<ProjectLink>,
    pub scope: SuppressionScope,
}

impl ProjectNode {
    /// Frameworks this project builds for, in declaration order, deduplicated
    pub fn frameworks(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.platforms
            .iter()
            .map(|p| p.framework.as_str())
            .filter(|f| seen.insert(*f))
            .collect()
    }
}

/// All projects of one run, keyed by [`library_key`], in input order
#[derive(Debug, Clone, Default)]
pub struct ProjectSet {
    projects: BTreeMap<String, ProjectNode>,
    order: Vec<String>,
}

impl ProjectSet {
    pub fn get(&self, id: &str) -> Option<&ProjectNode> {
        self.projects.get(&library_key(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.projects.contains_key(&library_key(id))
    }

    /// Projects in input order
    pub fn iter(&self) -> impl Iterator<Item = &ProjectNode> {
        self.order.iter().filter_map(|id| self.projects.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn scope(&self, id: &str) -> Option<&SuppressionScope> {
        self.get(id).map(|p| &p.scope)
    }
}

fn parse_codes(project: &str, codes: &[String]) -> Result<BTreeSet<DiagnosticCode>> {
    codes
        .iter()
        .map(|c| {
            c.parse::<DiagnosticCode>().map_err(|e| {
                Error::ConfigurationError(format!("Project '{}': {}", project, e))
            })
        })
        .collect()
}

impl ProjectModel {
    /// Validate this project against the keys of every project in the run
    pub fn validate(&self, known_projects: &BTreeSet<String>) -> Result<ProjectNode> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(Error::ConfigurationError("Project with empty id".to_string()));
        }

        if self.platforms.is_empty() {
            return Err(Error::ConfigurationError(format!(
                "Project '{}' declares no platforms",
                id
            )));
        }

        let mut platforms: Vec<PlatformTarget> = Vec::new();
        for platform in &self.platforms {
            if platform.framework.trim().is_empty() {
                return Err(Error::ConfigurationError(format!(
                    "Project '{}' declares a platform with an empty framework",
                    id
                )));
            }
            if !platforms.contains(platform) {
                platforms.push(platform.clone());
            }
        }
        let frameworks: BTreeSet<&str> = platforms.iter().map(|p| p.framework.as_str()).collect();

        let mut requirements: Vec<DirectRequirement> = Vec::new();
        for reference in &self.package_references {
            if reference.id.trim().is_empty() {
                return Err(Error::ConfigurationError(format!(
                    "Project '{}' has a package reference with an empty id",
                    id
                )));
            }

            let range = VersionRange::parse(&reference.version).map_err(|e| {
                Error::ConfigurationError(format!(
                    "Project '{}', package '{}': {}",
                    id, reference.id, e
                ))
            })?;

            let reference_frameworks = match &reference.frameworks {
                None => None,
                Some(list) => {
                    let set: BTreeSet<String> = list.iter().cloned().collect();
                    if let Some(unknown) = set.iter().find(|f| !frameworks.contains(f.as_str())) {
                        return Err(Error::ConfigurationError(format!(
                            "Project '{}', package '{}': framework '{}' is not a project platform",
                            id, reference.id, unknown
                        )));
                    }
                    Some(set)
                }
            };

            let key = library_key(&reference.id);
            let overlaps = requirements.iter().any(|existing| {
                library_key(&existing.library_id) == key
                    && match (&existing.frameworks, &reference_frameworks) {
                        (Some(a), Some(b)) => !a.is_disjoint(b),
                        _ => true,
                    }
            });
            if overlaps {
                return Err(Error::ConfigurationError(format!(
                    "Project '{}' references package '{}' more than once",
                    id, reference.id
                )));
            }

            requirements.push(DirectRequirement {
                library_id: reference.id.clone(),
                range,
                suppressions: parse_codes(id, &reference.no_warn)?,
                frameworks: reference_frameworks,
            });
        }

        let mut project_references: Vec<ProjectLink> = Vec::new();
        for reference in &self.project_references {
            let key = library_key(&reference.id);
            if key == library_key(id) {
                return Err(Error::ConfigurationError(format!(
                    "Project '{}' references itself",
                    id
                )));
            }
            if !known_projects.contains(&key) {
                return Err(Error::ConfigurationError(format!(
                    "Project '{}' references unknown project '{}'",
                    id, reference.id
                )));
            }
            if project_references
                .iter()
                .any(|p| library_key(&p.project_id) == key)
            {
                return Err(Error::ConfigurationError(format!(
                    "Project '{}' references project '{}' more than once",
                    id, reference.id
                )));
            }
            project_references.push(ProjectLink {
                project_id: reference.id.clone(),
                suppressions: parse_codes(id, &reference.no_warn)?,
            });
        }

        Ok(ProjectNode {
            id: id.to_string(),
            file_path: self.file_path.clone(),
            platforms,
            requirements,
            project_references,
            scope: self.warning_properties.to_scope(id)?,
        })
    }
}

impl WarningProperties {
    fn to_scope(&self, owner: &str) -> Result<SuppressionScope> {
        let warn_as_error_codes = if self.warnings_as_errors.iter().any(|c| c.trim() == "*") {
            WarnAsError::All
        } else {
            WarnAsError::Codes(parse_codes(owner, &self.warnings_as_errors)?)
        };

        Ok(SuppressionScope {
            owner_id: owner.to_string(),
            no_warn_codes: parse_codes(owner, &self.no_warn)?,
            warn_as_error_codes,
            warn_not_as_error_codes: parse_codes(owner, &self.warnings_not_as_errors)?,
            treat_all_warnings_as_errors: self.treat_warnings_as_errors,
        })
    }
}

/// Validate every project of a run
pub fn validate_models(models: &[ProjectModel]) -> Result<ProjectSet> {
    if models.is_empty() {
        return Err(Error::ConfigurationError("No projects to resolve".to_string()));
    }

    let known: BTreeSet<String> = models.iter().map(|m| library_key(m.id.trim())).collect();
    let mut set = ProjectSet::default();

    for model in models {
        let node = model.validate(&known)?;
        let key = library_key(&node.id);
        if set.projects.contains_key(&key) {
            return Err(Error::ConfigurationError(format!(
                "Duplicate project id '{}'",
                node.id
            )));
        }
        set.order.push(key.clone());
        set.projects.insert(key, node);
    }

    Ok(set)
}
