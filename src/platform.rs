// src/platform.rs

//! Build platform targets and the compatibility relation between them
//!
//! A platform target is an opaque framework identifier plus an optional
//! runtime identifier. Compatibility between frameworks is not inferred from
//! their names: a framework is compatible with itself, and with whatever the
//! configured fallback list names for it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A build platform (+ optional runtime identifier) a project builds for
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlatformTarget {
    pub framework: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

impl PlatformTarget {
    pub fn new(framework: impl Into<String>) -> Self {
        Self {
            framework: framework.into(),
            runtime: None,
        }
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    /// Name of the target graph, e.g. `net8.0` or `net8.0/linux-x64`
    pub fn graph_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.runtime {
            Some(rid) => write!(f, "{}/{}", self.framework, rid),
            None => write!(f, "{}", self.framework),
        }
    }
}

/// Framework compatibility relation built from configured fallbacks
#[derive(Debug, Clone, Default)]
pub struct PlatformCompatibility {
    fallbacks: BTreeMap<String, Vec<String>>,
}

impl PlatformCompatibility {
    pub fn new(fallbacks: BTreeMap<String, Vec<String>>) -> Self {
        Self { fallbacks }
    }

    /// Can a consumer building for `consumer` use something built for `candidate`?
    pub fn is_compatible(&self, consumer: &str, candidate: &str) -> bool {
        consumer == candidate
            || self
                .fallbacks
                .get(consumer)
                .is_some_and(|list| list.iter().any(|f| f == candidate))
    }

    /// Pick the nearest compatible framework from `candidates`
    ///
    /// An exact match wins; otherwise the first fallback (in configured
    /// order) that appears among the candidates.
    pub fn nearest<'a, I>(&self, consumer: &str, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let candidates: Vec<&'a str> = candidates.into_iter().collect();

        if let Some(exact) = candidates.iter().find(|c| **c == consumer) {
            return Some(*exact);
        }

        self.fallbacks.get(consumer).and_then(|list| {
            list.iter()
                .find_map(|fallback| candidates.iter().find(|c| **c == fallback.as_str()).copied())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compat() -> PlatformCompatibility {
        let mut fallbacks = BTreeMap::new();
        fallbacks.insert(
            "net8.0".to_string(),
            vec!["net6.0".to_string(), "netstandard2.0".to_string()],
        );
        PlatformCompatibility::new(fallbacks)
    }

    #[test]
    fn test_graph_name() {
        assert_eq!(PlatformTarget::new("net8.0").graph_name(), "net8.0");
        assert_eq!(
            PlatformTarget::new("net8.0").with_runtime("linux-x64").graph_name(),
            "net8.0/linux-x64"
        );
    }

    #[test]
    fn test_is_compatible() {
        let c = compat();
        assert!(c.is_compatible("net8.0", "net8.0"));
        assert!(c.is_compatible("net8.0", "netstandard2.0"));
        assert!(!c.is_compatible("net6.0", "net8.0"));
        assert!(!c.is_compatible("netstandard2.0", "net8.0"));
    }

    #[test]
    fn test_nearest_prefers_exact_then_fallback_order() {
        let c = compat();
        assert_eq!(c.nearest("net8.0", ["netstandard2.0", "net8.0"]), Some("net8.0"));
        assert_eq!(c.nearest("net8.0", ["netstandard2.0", "net6.0"]), Some("net6.0"));
        assert_eq!(c.nearest("net8.0", ["net472"]), None);
    }
}
