//! Persistent Acl storage
//!
//! Acls are keyed by permission target name. Stores know nothing about
//! caching; `AclManager` invalidates the cache around every write.

mod memory;
mod sqlite;

pub use memory::MemoryAclStore;
pub use sqlite::SqliteAclStore;

use crate::error::Result;
use crate::model::Acl;

/// Backing store for Acls
pub trait AclStore: Send + Sync {
    /// Every stored Acl, ordered by target name
    fn load_all(&self) -> Result<Vec<Acl>>;

    fn get(&self, name: &str) -> Result<Option<Acl>>;

    /// Insert a new Acl; fails with `AlreadyExists` when the name is taken
    fn insert(&self, acl: &Acl) -> Result<()>;

    /// Remove an Acl; returns whether one was stored
    fn remove(&self, name: &str) -> Result<bool>;

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.get(name)?.is_some())
    }
}
