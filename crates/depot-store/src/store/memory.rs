//! In-memory tree store
//!
//! Items live in a shared ordered map, useful for unit tests and for
//! simulating backend failures in the middle of a multi-commit operation.

use chrono::Utc;
use depot_core::RepoPath;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{NodeTable, StoreConnection, TreeStore, apply_mutations};
use crate::error::{Result, StoreError};
use crate::item::{ItemInfo, Mutation};

type Nodes = BTreeMap<(String, String), ItemInfo>;

/// In-memory tree store
#[derive(Clone, Default)]
pub struct MemoryTreeStore {
    nodes: Arc<RwLock<Nodes>>,
    operations: Arc<Mutex<OperationCounts>>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone)]
pub struct OperationCounts {
    pub connects: usize,
    pub reads: usize,
    pub commits: usize,
    pub failed_commits: usize,
    /// Commits allowed before every further commit fails
    pub crash_after: Option<usize>,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every commit after the first `commits` successful ones fail
    pub fn crash_after_commits(&self, commits: usize) {
        let mut ops = self.operations.lock();
        ops.crash_after = Some(ops.commits + commits);
    }

    /// Undo `crash_after_commits`
    pub fn recover(&self) {
        self.operations.lock().crash_after = None;
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.lock().clone()
    }

    pub fn reset_counts(&self) {
        let mut ops = self.operations.lock();
        let crash_after = ops.crash_after.take().map(|c| c.saturating_sub(ops.commits));
        *ops = OperationCounts {
            crash_after,
            ..Default::default()
        };
    }

    /// All committed paths, for assertions
    pub fn all_paths(&self) -> Vec<RepoPath> {
        self.nodes
            .read()
            .values()
            .map(|item| item.repo_path.clone())
            .collect()
    }

    /// Commit mutations directly, bypassing any session
    pub fn seed(&self, mutations: &[Mutation]) -> Result<()> {
        let mut nodes = self.nodes.write();
        let mut staged = nodes.clone();
        apply_mutations(&mut MapTable(&mut staged), mutations, Utc::now())?;
        *nodes = staged;
        Ok(())
    }
}

impl TreeStore for MemoryTreeStore {
    fn connect(&self) -> Result<Box<dyn StoreConnection>> {
        self.operations.lock().connects += 1;
        Ok(Box::new(MemoryConnection {
            store: self.clone(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

fn key(path: &RepoPath) -> (String, String) {
    (path.repo_key().to_string(), path.path().to_string())
}

struct MapTable<'a>(&'a mut Nodes);

impl NodeTable for MapTable<'_> {
    fn get(&self, path: &RepoPath) -> Result<Option<ItemInfo>> {
        Ok(self.0.get(&key(path)).cloned())
    }

    fn put(&mut self, item: ItemInfo) -> Result<()> {
        self.0.insert(key(&item.repo_path), item);
        Ok(())
    }

    fn remove_tree(&mut self, path: &RepoPath) -> Result<usize> {
        let before = self.0.len();
        self.0.retain(|_, item| !path.contains(&item.repo_path));
        Ok(before - self.0.len())
    }
}

struct MemoryConnection {
    store: MemoryTreeStore,
}

impl StoreConnection for MemoryConnection {
    fn item(&self, path: &RepoPath) -> Result<Option<ItemInfo>> {
        self.store.operations.lock().reads += 1;
        if path.is_root() {
            return Ok(Some(ItemInfo::repo_root(path.repo_key())));
        }
        Ok(self.store.nodes.read().get(&key(path)).cloned())
    }

    fn children(&self, folder: &RepoPath) -> Result<Vec<ItemInfo>> {
        self.store.operations.lock().reads += 1;
        let nodes = self.store.nodes.read();
        Ok(nodes
            .values()
            .filter(|item| item.repo_path.parent().as_ref() == Some(folder))
            .cloned()
            .collect())
    }

    fn commit(&mut self, mutations: &[Mutation]) -> Result<()> {
        {
            let mut ops = self.store.operations.lock();
            if ops.crash_after.is_some_and(|limit| ops.commits >= limit) {
                ops.failed_commits += 1;
                return Err(StoreError::Backend("simulated store crash".to_string()));
            }
        }

        let mut nodes = self.store.nodes.write();
        let mut staged = nodes.clone();
        match apply_mutations(&mut MapTable(&mut staged), mutations, Utc::now()) {
            Ok(()) => {
                *nodes = staged;
                self.store.operations.lock().commits += 1;
                Ok(())
            }
            Err(e) => {
                self.store.operations.lock().failed_commits += 1;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(path: &str) -> RepoPath {
        RepoPath::new("libs", path).unwrap()
    }

    #[test]
    fn test_put_creates_parents() {
        let store = MemoryTreeStore::new();
        let mut conn = store.connect().unwrap();
        conn.commit(&[Mutation::put_bytes(p("a/b/c.jar"), b"x")])
            .unwrap();

        assert!(conn.item(&p("a")).unwrap().unwrap().folder);
        assert!(conn.item(&p("a/b")).unwrap().unwrap().folder);
        let file = conn.item(&p("a/b/c.jar")).unwrap().unwrap();
        assert!(!file.folder);
        assert_eq!(file.size, 1);
    }

    #[test]
    fn test_children_are_direct_and_sorted() {
        let store = MemoryTreeStore::new();
        store
            .seed(&[
                Mutation::put_bytes(p("a/z.jar"), b"z"),
                Mutation::put_bytes(p("a/b/c.jar"), b"c"),
                Mutation::CreateFolder(p("a/m")),
            ])
            .unwrap();
        let conn = store.connect().unwrap();
        let names: Vec<String> = conn
            .children(&p("a"))
            .unwrap()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, vec!["b", "m", "z.jar"]);

        let top: Vec<String> = conn
            .children(&RepoPath::root("libs"))
            .unwrap()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(top, vec!["a"]);
    }

    #[test]
    fn test_failed_commit_applies_nothing() {
        let store = MemoryTreeStore::new();
        let mut conn = store.connect().unwrap();
        let err = conn
            .commit(&[
                Mutation::CreateFolder(p("x")),
                Mutation::Delete(p("missing")),
            ])
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(!conn.exists(&p("x")).unwrap());
        assert_eq!(store.operation_counts().failed_commits, 1);
    }

    #[test]
    fn test_type_conflicts() {
        let store = MemoryTreeStore::new();
        store.seed(&[Mutation::put_bytes(p("f"), b"1")]).unwrap();
        let mut conn = store.connect().unwrap();

        assert!(conn.commit(&[Mutation::CreateFolder(p("f"))]).unwrap_err().is_conflict());
        assert!(
            conn.commit(&[Mutation::put_bytes(p("f/child"), b"2")])
                .unwrap_err()
                .is_conflict()
        );
    }

    #[test]
    fn test_delete_removes_subtree() {
        let store = MemoryTreeStore::new();
        store
            .seed(&[
                Mutation::put_bytes(p("a/b/c"), b"c"),
                Mutation::put_bytes(p("ab"), b"sibling"),
            ])
            .unwrap();
        let mut conn = store.connect().unwrap();
        conn.commit(&[Mutation::Delete(p("a"))]).unwrap();
        assert_eq!(store.all_paths(), vec![p("ab")]);
    }

    #[test]
    fn test_crash_after_commits() {
        let store = MemoryTreeStore::new();
        let mut conn = store.connect().unwrap();
        store.crash_after_commits(1);
        conn.commit(&[Mutation::CreateFolder(p("one"))]).unwrap();
        assert!(conn.commit(&[Mutation::CreateFolder(p("two"))]).is_err());
        store.recover();
        conn.commit(&[Mutation::CreateFolder(p("two"))]).unwrap();
        assert_eq!(store.operation_counts().commits, 2);
    }
}
