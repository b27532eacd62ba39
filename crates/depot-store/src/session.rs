//! Content sessions
//!
//! A session wraps one store connection. Writes are staged as pending
//! mutations and only reach the store on `save`. Reads through the session
//! see committed state overlaid with the session's own pending changes.

use chrono::Utc;
use depot_core::RepoPath;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::item::{ItemInfo, Mutation};
use crate::lock::LockCoordinator;
use crate::registry::{DeferredAction, ResourceRegistry};
use crate::store::StoreConnection;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle on the tree store with staged writes and a resource registry
pub struct ContentSession {
    id: SessionId,
    conn: Box<dyn StoreConnection>,
    locks: Arc<LockCoordinator>,
    lock_timeout: Duration,
    pending: Vec<Mutation>,
    resources: ResourceRegistry,
    rollback_only: bool,
    closed: bool,
}

impl fmt::Debug for ContentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentSession")
            .field("id", &self.id)
            .field("pending", &self.pending.len())
            .field("resources", &self.resources)
            .field("rollback_only", &self.rollback_only)
            .finish_non_exhaustive()
    }
}

impl ContentSession {
    pub fn new(
        conn: Box<dyn StoreConnection>,
        locks: Arc<LockCoordinator>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            id: SessionId::next(),
            conn,
            locks,
            lock_timeout,
            pending: Vec::new(),
            resources: ResourceRegistry::new(),
            rollback_only: false,
            closed: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> &[Mutation] {
        &self.pending
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    // Reads

    pub fn item(&self, path: &RepoPath) -> Result<Option<ItemInfo>> {
        if self.pending.is_empty() {
            return self.conn.item(path);
        }
        self.overlay_item(path)
    }

    pub fn exists(&self, path: &RepoPath) -> Result<bool> {
        Ok(self.item(path)?.is_some())
    }

    pub fn is_folder(&self, path: &RepoPath) -> Result<bool> {
        Ok(self.item(path)?.is_some_and(|i| i.folder))
    }

    /// Direct children of a folder, ordered by name
    ///
    /// A missing folder has no children; a file is an error.
    pub fn list_children(&self, folder: &RepoPath) -> Result<Vec<ItemInfo>> {
        match self.item(folder)? {
            None => return Ok(Vec::new()),
            Some(item) if !item.folder => {
                return Err(StoreError::NotAFolder {
                    path: folder.to_string(),
                });
            }
            Some(_) => {}
        }
        if self.pending.is_empty() {
            return self.conn.children(folder);
        }

        let mut names: BTreeSet<String> = self
            .conn
            .children(folder)?
            .into_iter()
            .map(|item| item.name().to_string())
            .collect();
        for mutation in &self.pending {
            if let Some(name) = direct_child_name(folder, mutation.path()) {
                names.insert(name.to_string());
            }
        }

        let mut children = Vec::with_capacity(names.len());
        for name in names {
            let child = folder.child(&name)?;
            if let Some(item) = self.overlay_item(&child)? {
                children.push(item);
            }
        }
        Ok(children)
    }

    /// Resolve an item from the newest pending mutation that decides it,
    /// falling back to committed state
    fn overlay_item(&self, path: &RepoPath) -> Result<Option<ItemInfo>> {
        if path.is_root() {
            return Ok(Some(ItemInfo::repo_root(path.repo_key())));
        }
        for mutation in self.pending.iter().rev() {
            match mutation {
                Mutation::Delete(deleted) if deleted.contains(path) => return Ok(None),
                Mutation::CreateFolder(created) if created == path => {
                    return Ok(Some(self.committed_folder_or_new(path)?));
                }
                Mutation::PutFile { path: written, size, sha256 } if written == path => {
                    return Ok(Some(ItemInfo::file(
                        path.clone(),
                        *size,
                        sha256.clone(),
                        Utc::now(),
                    )));
                }
                m if path.contains(m.path()) && !matches!(m, Mutation::Delete(_)) => {
                    // Implicitly created parent
                    return Ok(Some(self.committed_folder_or_new(path)?));
                }
                _ => {}
            }
        }
        self.conn.item(path)
    }

    fn committed_folder_or_new(&self, path: &RepoPath) -> Result<ItemInfo> {
        match self.conn.item(path)? {
            Some(item) if item.folder => Ok(item),
            _ => Ok(ItemInfo::folder(path.clone(), Utc::now())),
        }
    }

    // Staged writes

    pub fn create_folder(&mut self, path: &RepoPath) {
        self.pending.push(Mutation::CreateFolder(path.clone()));
    }

    pub fn put_file(&mut self, path: &RepoPath, content: &[u8]) -> Result<()> {
        if path.is_root() {
            return Err(StoreError::RootNotAllowed {
                path: path.to_string(),
                operation: "write a file over".to_string(),
            });
        }
        self.pending.push(Mutation::put_bytes(path.clone(), content));
        Ok(())
    }

    pub fn delete(&mut self, path: &RepoPath) {
        self.pending.push(Mutation::Delete(path.clone()));
    }

    /// Stage an arbitrary mutation
    pub fn stage(&mut self, mutation: Mutation) {
        self.pending.push(mutation);
    }

    // Lifecycle

    /// Persist pending changes
    ///
    /// Does nothing without pending changes. On a rollback-only session the
    /// changes are not persisted and stay pending until `refresh(false)`.
    pub fn save(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if self.rollback_only {
            tracing::debug!(session = %self.id, pending = self.pending.len(), "save skipped on rollback-only session");
            return Ok(());
        }

        self.conn.commit(&self.pending)?;
        tracing::debug!(session = %self.id, mutations = self.pending.len(), "session saved");
        self.pending.clear();
        Ok(())
    }

    pub fn set_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    /// Re-sync with committed state, optionally discarding pending changes
    pub fn refresh(&mut self, keep_changes: bool) -> Result<()> {
        if !keep_changes {
            self.pending.clear();
        }
        self.conn.refresh()
    }

    /// Prepare a returned session for its next borrower
    pub(crate) fn reset(&mut self) {
        self.rollback_only = false;
    }

    // Resources

    /// Lock a path for the rest of the unit of work
    pub fn lock(&mut self, path: &RepoPath) -> Result<()> {
        let handle = self.locks.acquire(self.id, path, self.lock_timeout)?;
        self.resources.add_lock(handle);
        Ok(())
    }

    /// Lock every path or none of them
    pub fn lock_all(&mut self, paths: &[RepoPath]) -> Result<()> {
        let handles = self.locks.acquire_all(self.id, paths, self.lock_timeout)?;
        for handle in handles {
            self.resources.add_lock(handle);
        }
        Ok(())
    }

    /// Release one lock before the unit of work ends
    pub fn unlock(&mut self, path: &RepoPath) -> bool {
        match self.resources.take_lock(path) {
            Some(handle) => {
                self.locks.release(handle);
                true
            }
            None => false,
        }
    }

    /// Paths this session currently has locked
    pub fn locked_paths(&self) -> Vec<RepoPath> {
        self.locks.held_by(self.id)
    }

    /// Register work to run after a successful commit
    pub fn defer(&mut self, description: impl Into<String>, action: impl FnOnce() + Send + 'static) {
        self.resources
            .add_deferred(DeferredAction::new(description, action));
    }

    /// Release registered resources, locks first
    pub fn release_resources(&mut self, success: bool) -> usize {
        self.resources.release_all(&self.locks, success)
    }

    /// Close the session
    ///
    /// Outstanding changes or resources are reported as a leak; locks are
    /// force-released so other sessions are not blocked. Returns whether the
    /// session was clean.
    pub fn logout(mut self) -> bool {
        self.shutdown()
    }

    fn shutdown(&mut self) -> bool {
        if self.closed {
            return true;
        }
        self.closed = true;

        let leak = self.leak_report();
        if let Some(detail) = &leak {
            let err = StoreError::ResourceLeak {
                session: self.id.as_u64(),
                detail: detail.clone(),
            };
            tracing::error!("{}", err);
            self.pending.clear();
            self.resources.release_all(&self.locks, false);
        }
        leak.is_none()
    }

    /// Description of outstanding changes and resources, `None` when clean
    pub fn leak_report(&self) -> Option<String> {
        let mut parts = Vec::new();
        if !self.pending.is_empty() {
            parts.push(format!("{} pending change(s)", self.pending.len()));
        }
        if !self.resources.is_empty() {
            parts.push(self.resources.describe());
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

impl Drop for ContentSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Name of the direct child of `folder` on the way to `path`
fn direct_child_name<'a>(folder: &RepoPath, path: &'a RepoPath) -> Option<&'a str> {
    if !folder.contains(path) || folder == path {
        return None;
    }
    let rest = if folder.is_root() {
        path.path()
    } else {
        &path.path()[folder.path().len() + 1..]
    };
    rest.split('/').next()
}
