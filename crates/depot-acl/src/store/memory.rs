//! In-memory Acl store for tests

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::AclStore;
use crate::error::{AclError, Result};
use crate::model::Acl;

#[derive(Debug, Default)]
pub struct MemoryAclStore {
    acls: RwLock<BTreeMap<String, Acl>>,
    loads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryAclStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_acls(acls: impl IntoIterator<Item = Acl>) -> Self {
        let store = Self::new();
        {
            let mut map = store.acls.write();
            for acl in acls {
                map.insert(acl.name().to_string(), acl);
            }
        }
        store
    }

    /// Number of `load_all` calls, for cache assertions
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of inserts and removals
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl AclStore for MemoryAclStore {
    fn load_all(&self) -> Result<Vec<Acl>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.acls.read().values().cloned().collect())
    }

    fn get(&self, name: &str) -> Result<Option<Acl>> {
        Ok(self.acls.read().get(name).cloned())
    }

    fn insert(&self, acl: &Acl) -> Result<()> {
        let mut acls = self.acls.write();
        if acls.contains_key(acl.name()) {
            return Err(AclError::AlreadyExists {
                name: acl.name().to_string(),
            });
        }
        acls.insert(acl.name().to_string(), acl.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<bool> {
        let removed = self.acls.write().remove(name).is_some();
        if removed {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }
}
