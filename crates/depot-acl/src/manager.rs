//! Acl mutations
//!
//! Every write goes to the store first and then clears the cache, so the
//! next evaluation sees it.

use std::sync::Arc;

use crate::cache::AclCache;
use crate::error::{AclError, Result};
use crate::model::Acl;
use crate::store::AclStore;

#[derive(Clone)]
pub struct AclManager {
    store: Arc<dyn AclStore>,
    cache: Arc<AclCache>,
}

impl AclManager {
    pub fn new(store: Arc<dyn AclStore>, cache: Arc<AclCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<AclCache> {
        &self.cache
    }

    pub fn get(&self, name: &str) -> Result<Option<Acl>> {
        let snapshot = self.cache.get_or_rebuild(self.store.as_ref())?;
        Ok(snapshot.get(name).map(|cached| cached.acl.clone()))
    }

    /// Every Acl, ordered by target name
    pub fn all(&self) -> Result<Vec<Acl>> {
        let snapshot = self.cache.get_or_rebuild(self.store.as_ref())?;
        Ok(snapshot.iter().map(|cached| cached.acl.clone()).collect())
    }

    /// Store a new Acl; `AlreadyExists` when its target name is taken
    pub fn create(&self, acl: &Acl) -> Result<()> {
        acl.validate()?;
        let result = self.store.insert(acl);
        self.cache.invalidate();
        result?;
        tracing::debug!(target_name = acl.name(), "Acl created");
        Ok(())
    }

    /// Replace an Acl with the complete `acl` given
    pub fn update(&self, acl: &Acl) -> Result<()> {
        acl.validate()?;
        if !self.store.remove(acl.name())? {
            return Err(AclError::NotFound {
                name: acl.name().to_string(),
            });
        }
        let result = self.store.insert(acl);
        self.cache.invalidate();
        result?;
        tracing::debug!(target_name = acl.name(), "Acl updated");
        Ok(())
    }

    /// Remove the Acl of a permission target
    pub fn delete(&self, name: &str) -> Result<()> {
        let removed = self.store.remove(name);
        self.cache.invalidate();
        if !removed? {
            return Err(AclError::NotFound {
                name: name.to_string(),
            });
        }
        tracing::debug!(target_name = name, "Acl deleted");
        Ok(())
    }

    /// Remove every user entry for `username`, writing each changed Acl
    ///
    /// Returns the number of Acls rewritten.
    pub fn remove_all_user_aces(&self, username: &str) -> Result<usize> {
        let snapshot = self.cache.get_or_rebuild(self.store.as_ref())?;
        let mut changed = 0;
        for cached in snapshot.iter() {
            let mut acl = cached.acl.clone();
            if !acl.remove_user_aces(username) {
                continue;
            }
            self.update(&acl)?;
            changed += 1;
        }
        tracing::debug!(user = username, acls = changed, "removed user entries");
        Ok(changed)
    }
}
