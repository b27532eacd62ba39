//! Hierarchical path locks shared by every session
//!
//! A lock on a folder covers its whole subtree: a session cannot lock a path
//! while another session holds a lock on one of its ancestors or
//! descendants. Locks are reentrant per session.

use depot_core::RepoPath;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::{Result, StoreError};
use crate::session::SessionId;

#[derive(Debug)]
struct LockEntry {
    owner: SessionId,
    holds: u32,
}

/// A held lock; give it back with [`LockCoordinator::release`]
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a lock handle must be released"]
pub struct LockHandle {
    path: RepoPath,
    owner: SessionId,
}

impl LockHandle {
    pub fn path(&self) -> &RepoPath {
        &self.path
    }

    pub fn owner(&self) -> SessionId {
        self.owner
    }
}

/// Lock table with blocking acquisition
#[derive(Debug, Default)]
pub struct LockCoordinator {
    table: Mutex<HashMap<RepoPath, LockEntry>>,
    released: Condvar,
}

impl LockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `path` for `owner`, waiting up to `timeout` for conflicting
    /// locks to go away
    pub fn acquire(&self, owner: SessionId, path: &RepoPath, timeout: Duration) -> Result<LockHandle> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut table = self.table.lock();

        loop {
            match blocker(&table, owner, path) {
                None => {
                    table
                        .entry(path.clone())
                        .or_insert(LockEntry { owner, holds: 0 })
                        .holds += 1;
                    tracing::debug!(session = %owner, path = %path, "lock acquired");
                    return Ok(LockHandle {
                        path: path.clone(),
                        owner,
                    });
                }
                Some(held) => {
                    tracing::debug!(session = %owner, path = %path, blocked_by = %held, "waiting for lock");
                    if self.released.wait_until(&mut table, deadline).timed_out()
                        && blocker(&table, owner, path).is_some()
                    {
                        return Err(StoreError::LockTimeout {
                            path: path.to_string(),
                            waited: started.elapsed(),
                        });
                    }
                }
            }
        }
    }

    /// Lock every path or none of them
    pub fn acquire_all(
        &self,
        owner: SessionId,
        paths: &[RepoPath],
        timeout: Duration,
    ) -> Result<Vec<LockHandle>> {
        let deadline = Instant::now() + timeout;
        let mut handles = Vec::with_capacity(paths.len());
        for path in paths {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.acquire(owner, path, remaining) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    for handle in handles {
                        self.release(handle);
                    }
                    return Err(e);
                }
            }
        }
        Ok(handles)
    }

    pub fn release(&self, handle: LockHandle) {
        let mut table = self.table.lock();
        if let Some(entry) = table.get_mut(&handle.path)
            && entry.owner == handle.owner
        {
            entry.holds -= 1;
            if entry.holds == 0 {
                table.remove(&handle.path);
            }
            tracing::debug!(session = %handle.owner, path = %handle.path, "lock released");
        }
        drop(table);
        self.released.notify_all();
    }

    /// Paths currently locked by `owner`
    pub fn held_by(&self, owner: SessionId) -> Vec<RepoPath> {
        let table = self.table.lock();
        let mut paths: Vec<RepoPath> = table
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// True when any session holds a lock covering `path`
    pub fn is_locked(&self, path: &RepoPath) -> bool {
        let table = self.table.lock();
        table
            .keys()
            .any(|held| held.contains(path) || path.contains(held))
    }
}

/// A lock held by another session on `path`, an ancestor or a descendant
fn blocker(
    table: &HashMap<RepoPath, LockEntry>,
    owner: SessionId,
    path: &RepoPath,
) -> Option<RepoPath> {
    table
        .iter()
        .find(|(held, entry)| {
            entry.owner != owner && (held.contains(path) || path.contains(held))
        })
        .map(|(held, _)| held.clone())
}
