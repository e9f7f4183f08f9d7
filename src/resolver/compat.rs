// src/resolver/compat.rs

//! Platform reduction of package metadata
//!
//! Picks the dependency group a consumer sees and checks whether a
//! package's asset groups can be consumed on a platform.

use crate::platform::{PlatformCompatibility, PlatformTarget};
use crate::source::{AssetGroup, AssetKind, DependencyGroup, PackageDependency};
use std::collections::BTreeSet;

/// Dependencies of a package as seen from `framework`
///
/// The nearest framework-specific group wins; otherwise the
/// framework-agnostic group; otherwise there are none.
pub fn dependencies_for<'a>(
    groups: &'a [DependencyGroup],
    framework: &str,
    compat: &PlatformCompatibility,
) -> &'a [PackageDependency] {
    let nearest = compat.nearest(
        framework,
        groups.iter().filter_map(|g| g.framework.as_deref()),
    );

    let group = match nearest {
        Some(fw) => groups.iter().find(|g| g.framework.as_deref() == Some(fw)),
        None => groups.iter().find(|g| g.framework.is_none()),
    };

    group.map(|g| g.dependencies.as_slice()).unwrap_or(&[])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetCheck {
    Compatible,
    /// No compile assets usable from the platform's framework
    FrameworkIncompatible { supported: Vec<String> },
    /// Compile assets exist, but nothing runs on the requested runtime
    RuntimeIncompatible,
}

/// Check a package's asset groups against a consuming platform
///
/// A package without asset groups (a meta-package) is always compatible.
pub fn check_assets(
    assets: &[AssetGroup],
    platform: &PlatformTarget,
    compat: &PlatformCompatibility,
) -> AssetCheck {
    if assets.is_empty() {
        return AssetCheck::Compatible;
    }

    let framework = platform.framework.as_str();
    let has_compile = assets
        .iter()
        .any(|a| a.kind == AssetKind::Compile && compat.is_compatible(framework, &a.framework));

    if !has_compile {
        let supported: BTreeSet<String> = assets.iter().map(|a| a.framework.clone()).collect();
        return AssetCheck::FrameworkIncompatible {
            supported: supported.into_iter().collect(),
        };
    }

    let Some(rid) = platform.runtime.as_deref() else {
        return AssetCheck::Compatible;
    };

    let has_runtime = assets.iter().any(|a| {
        a.kind == AssetKind::Runtime
            && compat.is_compatible(framework, &a.framework)
            && a.runtime.as_deref().is_none_or(|r| r == rid)
    });

    if has_runtime {
        AssetCheck::Compatible
    } else {
        AssetCheck::RuntimeIncompatible
    }
}
