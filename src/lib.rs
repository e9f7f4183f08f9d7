// src/lib.rs

//! Restore core
//!
//! Builds dependency graphs for a set of projects across their target
//! platforms, selects package versions, and reports problems as
//! path-carrying diagnostics filtered through each project's warning policy.
//!
//! # Architecture
//!
//! - Resolver: level-by-level graph walk per (project, platform), nearest wins
//! - Diagnostics: events become merged, sorted diagnostics; NoWarn and
//!   WarningsAsErrors are applied per dependency path
//! - Fetch: one in-flight request per resource, bounded retries, run-scoped cache
//! - Sources: local folder, HTTP feed and in-memory package sources

pub mod config;
pub mod diagnostics;
mod error;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod platform;
pub mod resolver;
pub mod source;
pub mod version;

pub use config::{ResolverConfig, RetryConfig};
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticRecord, DependencyPath, Severity};
pub use error::{Error, Result};
pub use fetch::{FetchStats, ResilientFetcher, TransportError};
pub use model::{PackageReference, ProjectModel, ProjectReference, WarningProperties};
pub use platform::{PlatformCompatibility, PlatformTarget};
pub use resolver::{ProjectResult, ResolutionReport, ResolvedGraph, Resolver};
pub use source::{PackageSource, SourceConfig, SourceError};
pub use version::VersionRange;
