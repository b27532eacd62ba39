//! Whole-snapshot Acl cache
//!
//! The cache holds either nothing or a complete snapshot of every stored
//! Acl with its path matcher compiled. Writes clear it wholesale; the next
//! reader rebuilds it from the store.

use depot_core::PathMatcher;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::model::Acl;
use crate::store::AclStore;

/// An Acl with its compiled permission target patterns
#[derive(Debug, Clone)]
pub struct CachedAcl {
    pub acl: Acl,
    pub matcher: PathMatcher,
}

/// Immutable view of every Acl, keyed by target name
#[derive(Debug, Default)]
pub struct AclSnapshot {
    entries: IndexMap<String, CachedAcl>,
}

impl AclSnapshot {
    fn build(acls: Vec<Acl>) -> Self {
        let mut entries = IndexMap::with_capacity(acls.len());
        for acl in acls {
            match acl.target.matcher() {
                Ok(matcher) => {
                    entries.insert(acl.name().to_string(), CachedAcl { acl, matcher });
                }
                Err(e) => tracing::warn!("Skipping Acl with invalid patterns: {}", e),
            }
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&CachedAcl> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CachedAcl> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default)]
struct CacheState {
    snapshot: Option<Arc<AclSnapshot>>,
    /// Bumped by every invalidation
    generation: u64,
}

/// Acl cache owning its own lock
#[derive(Default)]
pub struct AclCache {
    state: RwLock<CacheState>,
    rebuilds: AtomicU64,
}

impl AclCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, rebuilt from `store` when the cache is empty
    ///
    /// Concurrent readers of an empty cache may each rebuild; a snapshot
    /// loaded before an invalidation is returned to its reader but never
    /// published.
    pub fn get_or_rebuild(&self, store: &dyn AclStore) -> Result<Arc<AclSnapshot>> {
        let generation = {
            let state = self.state.read();
            if let Some(snapshot) = &state.snapshot {
                return Ok(Arc::clone(snapshot));
            }
            state.generation
        };

        let snapshot = Arc::new(AclSnapshot::build(store.load_all()?));
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(acls = snapshot.len(), "Acl cache rebuilt");

        let mut state = self.state.write();
        if state.generation == generation {
            state.snapshot = Some(Arc::clone(&snapshot));
        }
        Ok(snapshot)
    }

    /// Drop the snapshot
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.snapshot = None;
        state.generation += 1;
    }

    pub fn is_populated(&self) -> bool {
        self.state.read().snapshot.is_some()
    }

    /// Number of rebuilds so far
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PermissionTarget;
    use crate::store::MemoryAclStore;

    #[test]
    fn test_rebuilds_only_when_empty() {
        let store = MemoryAclStore::with_acls([Acl::new(PermissionTarget::new("t", ["libs"]))]);
        let cache = AclCache::new();
        assert!(!cache.is_populated());

        let first = cache.get_or_rebuild(&store).unwrap();
        let second = cache.get_or_rebuild(&store).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.load_count(), 1);
        assert_eq!(cache.rebuild_count(), 1);

        cache.invalidate();
        assert!(!cache.is_populated());
        let third = cache.get_or_rebuild(&store).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.len(), 1);
        assert_eq!(store.load_count(), 2);
    }

    #[test]
    fn test_invalid_patterns_are_skipped() {
        let bad = Acl::new(PermissionTarget::new("bad", ["libs"]).with_includes(["a/[b"]));
        let good = Acl::new(PermissionTarget::new("good", ["libs"]));
        let store = MemoryAclStore::with_acls([bad, good]);

        let snapshot = AclCache::new().get_or_rebuild(&store).unwrap();
        assert!(snapshot.get("bad").is_none());
        assert!(snapshot.get("good").is_some());
    }
}
