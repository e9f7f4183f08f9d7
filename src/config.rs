// src/config.rs
//! Resolver configuration
//!
//! Loaded from TOML; every field has a default so an empty document is a
//! valid configuration.
//!
//! ```toml
//! max_paths_per_diagnostic = 256
//!
//! [retry]
//! max_attempts = 3
//! delay_ms = 200
//!
//! [[sources]]
//! type = "feed"
//! name = "public"
//! url = "https://feed.example/v3"
//!
//! [platform_fallbacks]
//! "net8.0" = ["net6.0", "netstandard2.0"]
//! ```

use crate::error::{Error, Result};
use crate::platform::PlatformCompatibility;
use crate::source::{PackageSource, SourceConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Hard upper bound on attempts per resource key
pub const MAX_ATTEMPTS: u32 = 3;

/// Default delay between attempts in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 200;

/// Default per-request timeout for feed sources
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 100;

/// Default cap on evidentiary paths per diagnostic
pub const DEFAULT_MAX_PATHS: usize = 256;

/// Retry policy of the resilient fetcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per key, clamped to `1..=3`
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delay_ms: DEFAULT_RETRY_DELAY_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl RetryConfig {
    /// Effective attempt budget
    pub fn attempts(&self) -> u32 {
        self.max_attempts.clamp(1, MAX_ATTEMPTS)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub retry: RetryConfig,
    /// Worker pool size for (project, platform) pairs; 0 means available cores
    pub max_parallelism: usize,
    pub max_paths_per_diagnostic: usize,
    pub sources: Vec<SourceConfig>,
    /// framework → frameworks it can additionally consume, nearest first
    pub platform_fallbacks: BTreeMap<String, Vec<String>>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            max_parallelism: 0,
            max_paths_per_diagnostic: DEFAULT_MAX_PATHS,
            sources: Vec::new(),
            platform_fallbacks: BTreeMap::new(),
        }
    }
}

impl ResolverConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: ResolverConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigurationError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.max_paths_per_diagnostic == 0 {
            return Err(Error::ConfigurationError(
                "max_paths_per_diagnostic must be at least 1".to_string(),
            ));
        }

        let mut names = std::collections::BTreeSet::new();
        for source in &self.sources {
            if !names.insert(source.name()) {
                return Err(Error::ConfigurationError(format!(
                    "Duplicate source name '{}'",
                    source.name()
                )));
            }
        }
        Ok(())
    }

    /// Worker count, resolving 0 to the number of available cores
    pub fn workers(&self) -> usize {
        if self.max_parallelism > 0 {
            self.max_parallelism
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    pub fn compatibility(&self) -> PlatformCompatibility {
        PlatformCompatibility::new(self.platform_fallbacks.clone())
    }

    /// Open every configured source, in order
    pub fn open_sources(&self) -> Result<Vec<Arc<dyn PackageSource>>> {
        self.sources.iter().map(|s| s.open(&self.retry)).collect()
    }
}
