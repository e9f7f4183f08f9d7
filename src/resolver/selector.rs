// src/resolver/selector.rs

//! Version selection for a single library

use crate::version::{FloatMode, VersionRange};
use semver::Version;
use serde::Serialize;

/// Why a library ended up at its version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionRationale {
    /// Lowest available version inside a fixed range
    LowestMatching,
    /// Highest available version matching a floating range
    HighestFloating { float: FloatMode },
    /// The requested lower bound was missing; the next version up was taken
    ApproximateMatch { requested: Version },
    /// A project reference, consumed through `framework`
    ProjectReference { framework: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub version: Version,
    pub rationale: SelectionRationale,
}

/// Pick a version of a library from `available` for `range`
///
/// Pre-release versions are only candidates when a bound of the range is
/// itself a pre-release. A floating range takes the highest candidate
/// matching its pattern, falling back to the lowest candidate when nothing
/// matches; a fixed range takes the lowest candidate.
pub fn select_version(available: &[Version], range: &VersionRange) -> Option<Selection> {
    let prerelease = range.allows_prerelease();
    let mut candidates: Vec<&Version> = available
        .iter()
        .filter(|v| range.satisfies(v) && (prerelease || v.pre.is_empty()))
        .collect();
    candidates.sort();

    let lowest = candidates.first().copied()?;

    if range.is_floating() {
        if let Some(highest) = candidates.iter().rev().find(|v| range.matches_float(v)) {
            return Some(Selection {
                version: (*highest).clone(),
                rationale: SelectionRationale::HighestFloating { float: range.float },
            });
        }
        return Some(Selection {
            version: lowest.clone(),
            rationale: SelectionRationale::LowestMatching,
        });
    }

    let rationale = match &range.floor {
        Some(floor) if range.floor_inclusive && floor != lowest => {
            SelectionRationale::ApproximateMatch {
                requested: floor.clone(),
            }
        }
        _ => SelectionRationale::LowestMatching,
    };

    Some(Selection {
        version: lowest.clone(),
        rationale,
    })
}
