// src/fetch/cache.rs
//! Run-scoped response cache

use super::{FetchPayload, ResourceKey};
use dashmap::DashMap;

/// Storage for successful source responses
///
/// Passed into the fetcher explicitly; nothing in the crate keeps a global
/// cache.
pub trait Cache: Send + Sync {
    fn get(&self, key: &ResourceKey) -> Option<FetchPayload>;

    fn put(&self, key: ResourceKey, payload: FetchPayload);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory cache that lives as long as one resolution run
#[derive(Debug, Default)]
pub struct RunCache {
    entries: DashMap<ResourceKey, FetchPayload>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for RunCache {
    fn get(&self, key: &ResourceKey) -> Option<FetchPayload> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: ResourceKey, payload: FetchPayload) {
        self.entries.insert(key, payload);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Operation;
    use semver::Version;

    #[test]
    fn test_run_cache() {
        let cache = RunCache::new();
        let key = ResourceKey::new("memory", "z", None, Operation::ListVersions);
        assert!(cache.is_empty());
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), FetchPayload::Versions(vec![Version::new(1, 0, 0)]));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get(&key),
            Some(FetchPayload::Versions(vec![Version::new(1, 0, 0)]))
        );
    }
}
