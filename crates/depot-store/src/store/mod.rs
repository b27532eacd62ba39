//! Tree stores holding the committed items of every repository
//!
//! Depot supports two backends:
//! - **Memory**: items live in a process-local map (tests, dry runs)
//! - **SQLite**: items live in a WAL-mode SQLite database shared by all
//!   connections
//!
//! A store hands out connections. Reads on a connection see committed state;
//! `commit` applies a batch of mutations atomically or not at all.

mod memory;
mod sqlite;

pub use memory::{MemoryTreeStore, OperationCounts};
pub use sqlite::SqliteTreeStore;

use chrono::{DateTime, Utc};
use depot_core::RepoPath;

use crate::error::{Result, StoreError};
use crate::item::{ItemInfo, Mutation};

/// Backing store for repository trees
///
/// Implementations must be Send + Sync so one store can serve every pooled
/// session.
pub trait TreeStore: Send + Sync {
    /// Open a new connection
    fn connect(&self) -> Result<Box<dyn StoreConnection>>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// One connection to a tree store, owned by a single session
pub trait StoreConnection: Send {
    /// Committed item at `path`; repository roots always exist
    fn item(&self, path: &RepoPath) -> Result<Option<ItemInfo>>;

    /// Committed direct children of a folder, ordered by name
    fn children(&self, folder: &RepoPath) -> Result<Vec<ItemInfo>>;

    /// Apply mutations atomically
    ///
    /// Fails with `ConcurrencyConflict` when committed state no longer
    /// allows a mutation; nothing is applied in that case.
    fn commit(&mut self, mutations: &[Mutation]) -> Result<()>;

    /// Drop any connection-local read state
    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }

    fn exists(&self, path: &RepoPath) -> Result<bool> {
        Ok(self.item(path)?.is_some())
    }
}

/// Node-level access used to apply mutations the same way on every backend
pub(crate) trait NodeTable {
    fn get(&self, path: &RepoPath) -> Result<Option<ItemInfo>>;

    /// Insert or replace a node
    fn put(&mut self, item: ItemInfo) -> Result<()>;

    /// Remove a node and everything below it
    fn remove_tree(&mut self, path: &RepoPath) -> Result<usize>;
}

/// Apply a batch of mutations to a node table
pub(crate) fn apply_mutations<T: NodeTable>(
    table: &mut T,
    mutations: &[Mutation],
    now: DateTime<Utc>,
) -> Result<()> {
    for mutation in mutations {
        apply_mutation(table, mutation, now)?;
    }
    Ok(())
}

fn apply_mutation<T: NodeTable>(
    table: &mut T,
    mutation: &Mutation,
    now: DateTime<Utc>,
) -> Result<()> {
    match mutation {
        Mutation::CreateFolder(path) => {
            ensure_parents(table, path, now)?;
            match existing(table, path)? {
                Some(item) if item.folder => Ok(()),
                Some(_) => Err(StoreError::conflict(path, "a file exists at this path")),
                None => table.put(ItemInfo::folder(path.clone(), now)),
            }
        }
        Mutation::PutFile { path, size, sha256 } => {
            if path.is_root() {
                return Err(StoreError::RootNotAllowed {
                    path: path.to_string(),
                    operation: "write a file over".to_string(),
                });
            }
            ensure_parents(table, path, now)?;
            if let Some(item) = existing(table, path)?
                && item.folder
            {
                return Err(StoreError::conflict(path, "a folder exists at this path"));
            }
            table.put(ItemInfo::file(path.clone(), *size, sha256.clone(), now))
        }
        Mutation::Delete(path) => {
            if existing(table, path)?.is_none() {
                return Err(StoreError::conflict(path, "item no longer exists"));
            }
            table.remove_tree(path)?;
            Ok(())
        }
    }
}

fn existing<T: NodeTable>(table: &T, path: &RepoPath) -> Result<Option<ItemInfo>> {
    if path.is_root() {
        return Ok(Some(ItemInfo::repo_root(path.repo_key())));
    }
    table.get(path)
}

fn ensure_parents<T: NodeTable>(table: &mut T, path: &RepoPath, now: DateTime<Utc>) -> Result<()> {
    for ancestor in path.ancestors().into_iter().rev() {
        if ancestor.is_root() {
            continue;
        }
        match table.get(&ancestor)? {
            Some(item) if item.folder => {}
            Some(_) => {
                return Err(StoreError::conflict(&ancestor, "a file exists where a folder is needed"));
            }
            None => table.put(ItemInfo::folder(ancestor, now))?,
        }
    }
    Ok(())
}

/// Parent path string of a repo-relative path, `""` for top-level items
pub(crate) fn parent_of(path: &RepoPath) -> String {
    path.parent()
        .map(|p| p.path().to_string())
        .unwrap_or_default()
}
