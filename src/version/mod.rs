// src/version/mod.rs

//! Version parsing and version range handling for package requirements
//!
//! Versions are semantic versions; partial inputs such as `1` or `1.2` are
//! normalised to three components. Ranges follow the interval notation used
//! by package references:
//!
//! - `1.0.0` → `>= 1.0.0`
//! - `[1.0.0]` → exactly `1.0.0`
//! - `[1.0.0, 2.0.0)` → `>= 1.0.0 && < 2.0.0`
//! - `(, 2.0.0]` → `<= 2.0.0`
//! - `1.*`, `1.2.*`, `*` → floating to the highest matching version

use crate::error::{Error, Result};
use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Parse a version string, padding missing minor/patch components with zero
///
/// Examples:
/// - "1" → 1.0.0
/// - "1.2" → 1.2.0
/// - "1.2.3-beta.1" → 1.2.3-beta.1
pub fn parse_version(s: &str) -> Result<Version> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::ConfigurationError("Empty version string".to_string()));
    }

    // Split off pre-release/build metadata before counting components
    let split_at = s.find(['-', '+']).unwrap_or(s.len());
    let (numeric, suffix) = s.split_at(split_at);

    let parts: Vec<&str> = numeric.split('.').collect();
    if parts.len() > 3 {
        return Err(Error::ConfigurationError(format!(
            "Version '{}' has more than three numeric components",
            s
        )));
    }
    if parts.iter().any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit())) {
        return Err(Error::ConfigurationError(format!("Invalid version '{}'", s)));
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);

    Version::parse(&padded)
        .map_err(|e| Error::ConfigurationError(format!("Invalid version '{}': {}", s, e)))
}

/// Floating behaviour of a range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatMode {
    /// Fixed range: the lowest applicable version wins
    #[default]
    None,
    /// `1.2.*`
    PatchFloat,
    /// `1.*`
    MinorFloat,
    /// `*`
    MajorFloat,
}

/// A floor/ceiling version constraint, optionally floating
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub floor: Option<Version>,
    pub floor_inclusive: bool,
    pub ceiling: Option<Version>,
    pub ceiling_inclusive: bool,
    pub float: FloatMode,
}

impl VersionRange {
    /// Range accepting every version
    pub fn any() -> Self {
        Self {
            floor: None,
            floor_inclusive: true,
            ceiling: None,
            ceiling_inclusive: false,
            float: FloatMode::None,
        }
    }

    /// `>= version`
    pub fn at_least(version: Version) -> Self {
        Self {
            floor: Some(version),
            ..Self::any()
        }
    }

    /// `[version]`
    pub fn exact(version: Version) -> Self {
        Self {
            floor: Some(version.clone()),
            floor_inclusive: true,
            ceiling: Some(version),
            ceiling_inclusive: true,
            float: FloatMode::None,
        }
    }

    /// Parse a range string
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ConfigurationError("Empty version range".to_string()));
        }

        let first = s.as_bytes()[0];
        if first == b'[' || first == b'(' {
            return Self::parse_interval(s);
        }

        if s.contains('*') {
            let (floor, float) = parse_float(s)?;
            return Ok(Self {
                floor: Some(floor),
                float,
                ..Self::any()
            });
        }

        Ok(Self::at_least(parse_version(s)?))
    }

    fn parse_interval(s: &str) -> Result<Self> {
        let invalid = || Error::ConfigurationError(format!("Invalid version range '{}'", s));

        let floor_inclusive = s.starts_with('[');
        let ceiling_inclusive = if s.ends_with(']') {
            true
        } else if s.ends_with(')') {
            false
        } else {
            return Err(invalid());
        };

        let inner = &s[1..s.len() - 1];

        let Some((left, right)) = inner.split_once(',') else {
            // Only "[x]" is meaningful without a comma
            if !floor_inclusive || !ceiling_inclusive || inner.contains('*') {
                return Err(invalid());
            }
            return Ok(Self::exact(parse_version(inner)?));
        };

        if right.contains(',') {
            return Err(invalid());
        }

        let (left, right) = (left.trim(), right.trim());
        if left.is_empty() && right.is_empty() {
            return Err(invalid());
        }

        let (floor, float) = if left.is_empty() {
            (None, FloatMode::None)
        } else if left.contains('*') {
            let (floor, float) = parse_float(left)?;
            (Some(floor), float)
        } else {
            (Some(parse_version(left)?), FloatMode::None)
        };

        let ceiling = if right.is_empty() {
            None
        } else {
            Some(parse_version(right)?)
        };

        let range = Self {
            floor,
            floor_inclusive: floor_inclusive && !left.is_empty(),
            ceiling,
            ceiling_inclusive: ceiling_inclusive && !right.is_empty(),
            float,
        };

        if range.is_empty() {
            return Err(Error::ConfigurationError(format!(
                "Version range '{}' cannot be satisfied by any version",
                s
            )));
        }

        Ok(range)
    }

    /// Floor == ceiling, both inclusive, not floating
    pub fn is_exact(&self) -> bool {
        self.float == FloatMode::None
            && self.floor_inclusive
            && self.ceiling_inclusive
            && self.floor.is_some()
            && self.floor == self.ceiling
    }

    pub fn is_floating(&self) -> bool {
        self.float != FloatMode::None
    }

    /// True when pre-release versions may be selected for this range
    pub fn allows_prerelease(&self) -> bool {
        let has_pre = |v: &Option<Version>| v.as_ref().is_some_and(|v| !v.pre.is_empty());
        has_pre(&self.floor) || has_pre(&self.ceiling)
    }

    /// Check whether a version lies within the floor/ceiling bounds
    pub fn satisfies(&self, version: &Version) -> bool {
        !self.is_below_floor(version) && !self.is_above_ceiling(version)
    }

    /// True if `version` is lower than the floor this range requires
    pub fn is_below_floor(&self, version: &Version) -> bool {
        match &self.floor {
            None => false,
            Some(floor) => match version.cmp(floor) {
                Ordering::Less => true,
                Ordering::Equal => !self.floor_inclusive,
                Ordering::Greater => false,
            },
        }
    }

    /// True if `version` is higher than the ceiling this range allows
    pub fn is_above_ceiling(&self, version: &Version) -> bool {
        match &self.ceiling {
            None => false,
            Some(ceiling) => match version.cmp(ceiling) {
                Ordering::Greater => true,
                Ordering::Equal => !self.ceiling_inclusive,
                Ordering::Less => false,
            },
        }
    }

    /// Check whether a version matches the floating pattern of this range
    ///
    /// Non-floating ranges match every version.
    pub fn matches_float(&self, version: &Version) -> bool {
        let Some(anchor) = &self.floor else {
            return true;
        };
        match self.float {
            FloatMode::None | FloatMode::MajorFloat => true,
            FloatMode::MinorFloat => version.major == anchor.major,
            FloatMode::PatchFloat => version.major == anchor.major && version.minor == anchor.minor,
        }
    }

    /// Intersection of two ranges, or None if they share no version
    ///
    /// The floating mode of the first floating operand is kept.
    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        let (floor, floor_inclusive) = match (&self.floor, &other.floor) {
            (None, None) => (None, true),
            (Some(a), None) => (Some(a.clone()), self.floor_inclusive),
            (None, Some(b)) => (Some(b.clone()), other.floor_inclusive),
            (Some(a), Some(b)) => match a.cmp(b) {
                Ordering::Greater => (Some(a.clone()), self.floor_inclusive),
                Ordering::Less => (Some(b.clone()), other.floor_inclusive),
                Ordering::Equal => (
                    Some(a.clone()),
                    self.floor_inclusive && other.floor_inclusive,
                ),
            },
        };

        let (ceiling, ceiling_inclusive) = match (&self.ceiling, &other.ceiling) {
            (None, None) => (None, false),
            (Some(a), None) => (Some(a.clone()), self.ceiling_inclusive),
            (None, Some(b)) => (Some(b.clone()), other.ceiling_inclusive),
            (Some(a), Some(b)) => match a.cmp(b) {
                Ordering::Less => (Some(a.clone()), self.ceiling_inclusive),
                Ordering::Greater => (Some(b.clone()), other.ceiling_inclusive),
                Ordering::Equal => (
                    Some(a.clone()),
                    self.ceiling_inclusive && other.ceiling_inclusive,
                ),
            },
        };

        let float = if self.is_floating() { self.float } else { other.float };

        let range = VersionRange {
            floor,
            floor_inclusive,
            ceiling,
            ceiling_inclusive,
            float,
        };

        if range.is_empty() { None } else { Some(range) }
    }

    fn is_empty(&self) -> bool {
        match (&self.floor, &self.ceiling) {
            (Some(floor), Some(ceiling)) => match floor.cmp(ceiling) {
                Ordering::Greater => true,
                Ordering::Equal => !(self.floor_inclusive && self.ceiling_inclusive),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    /// Range in interval notation, e.g. `[1.0.0, 2.0.0)` or `1.*`
    pub fn to_notation(&self) -> String {
        if self.is_exact() {
            if let Some(floor) = &self.floor {
                return format!("[{}]", floor);
            }
        }

        let floor_str = match (&self.floor, self.float) {
            (None, _) => String::new(),
            (Some(_), FloatMode::MajorFloat) => "*".to_string(),
            (Some(v), FloatMode::MinorFloat) => format!("{}.*", v.major),
            (Some(v), FloatMode::PatchFloat) => format!("{}.{}.*", v.major, v.minor),
            (Some(v), FloatMode::None) => v.to_string(),
        };

        if self.ceiling.is_none() && self.floor.is_some() && self.floor_inclusive {
            return floor_str;
        }

        let ceiling_str = self.ceiling.as_ref().map(|v| v.to_string()).unwrap_or_default();
        format!(
            "{}{}, {}{}",
            if self.floor_inclusive && self.floor.is_some() { '[' } else { '(' },
            floor_str,
            ceiling_str,
            if self.ceiling_inclusive { ']' } else { ')' },
        )
    }
}

/// Parse `*`, `1.*` or `1.2.*` into a floor and floating mode
fn parse_float(s: &str) -> Result<(Version, FloatMode)> {
    let invalid = || Error::ConfigurationError(format!("Invalid floating version '{}'", s));

    if s == "*" {
        return Ok((Version::new(0, 0, 0), FloatMode::MajorFloat));
    }

    let prefix = s.strip_suffix(".*").ok_or_else(invalid)?;
    if prefix.contains('*') {
        return Err(invalid());
    }

    let parts: Vec<&str> = prefix.split('.').collect();
    let numbers: Vec<u64> = parts
        .iter()
        .map(|p| p.parse::<u64>().map_err(|_| invalid()))
        .collect::<Result<_>>()?;

    match numbers.as_slice() {
        [major] => Ok((Version::new(*major, 0, 0), FloatMode::MinorFloat)),
        [major, minor] => Ok((Version::new(*major, *minor, 0), FloatMode::PatchFloat)),
        _ => Err(invalid()),
    }
}

impl fmt::Display for VersionRange {
    /// Pretty form used in diagnostics: `>= 1.0.0`, `= 1.0.0`, `>= 1.0.0 && < 2.0.0`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exact() {
            if let Some(floor) = &self.floor {
                return write!(f, "= {}", floor);
            }
        }

        let floor = self.floor.as_ref().map(|v| {
            let op = if self.floor_inclusive { ">=" } else { ">" };
            format!("{} {}", op, v)
        });
        let ceiling = self.ceiling.as_ref().map(|v| {
            let op = if self.ceiling_inclusive { "<=" } else { "<" };
            format!("{} {}", op, v)
        });

        match (floor, ceiling) {
            (Some(lo), Some(hi)) => write!(f, "{} && {}", lo, hi),
            (Some(lo), None) => write!(f, "{}", lo),
            (None, Some(hi)) => write!(f, "{}", hi),
            (None, None) => write!(f, "*"),
        }
    }
}

impl FromStr for VersionRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_notation())
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        VersionRange::parse(&s).map_err(serde::de::Error::custom)
    }
}
