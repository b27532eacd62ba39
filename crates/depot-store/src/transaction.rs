//! Transaction hooks binding a pooled session to one unit of work
//!
//! The hooks run in a fixed order at the end of a unit of work:
//! `prepare_for_commit`, `before_commit` (only when the work succeeded),
//! then `after_completion`.

use std::sync::Arc;

use crate::error::StoreError;
use crate::pool::SessionPool;
use crate::session::ContentSession;

/// Whether a transaction may persist changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadWrite,
    ReadOnly,
}

/// One unit of work on a session
#[derive(Debug)]
pub struct Transaction {
    session: ContentSession,
    mode: TxMode,
}

impl Transaction {
    pub fn begin(session: ContentSession, mode: TxMode) -> Self {
        Self { session, mode }
    }

    pub fn mode(&self) -> TxMode {
        self.mode
    }

    pub fn session(&mut self) -> &mut ContentSession {
        &mut self.session
    }

    /// Read-only transactions must not carry changes into commit
    pub fn prepare_for_commit(&mut self) -> crate::Result<()> {
        if self.mode == TxMode::ReadOnly && self.session.has_pending_changes() {
            tracing::warn!(
                session = %self.session.id(),
                pending = self.session.pending().len(),
                "read-only transaction has pending changes, forcing rollback"
            );
            self.session.set_rollback_only();
            self.session.refresh(false)?;
        }
        Ok(())
    }

    /// Persist pending changes of a read-write transaction
    pub fn before_commit(&mut self) -> crate::Result<()> {
        match self.mode {
            TxMode::ReadWrite => self.session.save(),
            TxMode::ReadOnly => Ok(()),
        }
    }

    /// Release resources and, on failure, drop whatever is still pending
    pub fn after_completion(&mut self, success: bool) {
        self.session.release_resources(success);
        if !success && let Err(e) = self.session.refresh(false) {
            tracing::error!(session = %self.session.id(), "failed to refresh session after rollback: {}", e);
        }
    }

    pub fn into_session(self) -> ContentSession {
        self.session
    }
}

/// Runs closures inside pooled transactions
#[derive(Clone)]
pub struct TransactionManager {
    pool: Arc<SessionPool>,
}

impl TransactionManager {
    pub fn new(pool: Arc<SessionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    /// Borrow a session, run `work`, commit on success, and return the
    /// session to the pool
    pub fn execute<T, E, F>(&self, mode: TxMode, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut ContentSession) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let session = self.pool.borrow()?;
        let mut tx = Transaction::begin(session, mode);

        let result = work(tx.session()).and_then(|value| {
            tx.prepare_for_commit()?;
            tx.before_commit()?;
            Ok(value)
        });

        tx.after_completion(result.is_ok());

        // A leak is already logged; the request keeps its own outcome
        let _ = self.pool.return_session(tx.into_session());
        result
    }

    pub fn read<T, E, F>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut ContentSession) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        self.execute(TxMode::ReadOnly, work)
    }

    pub fn write<T, E, F>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut ContentSession) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        self.execute(TxMode::ReadWrite, work)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::lock::LockCoordinator;
    use crate::store::MemoryTreeStore;
    use depot_core::{EngineConfig, RepoPath};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn p(path: &str) -> RepoPath {
        RepoPath::new("libs", path).unwrap()
    }

    fn manager() -> (MemoryTreeStore, TransactionManager) {
        let store = MemoryTreeStore::new();
        let pool = SessionPool::new(
            Arc::new(store.clone()),
            Arc::new(LockCoordinator::new()),
            &EngineConfig::default(),
        );
        (store, TransactionManager::new(Arc::new(pool)))
    }

    #[test]
    fn test_write_commits_and_releases() {
        let (store, tx) = manager();
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);

        tx.write(|s| -> Result<()> {
            s.lock(&p("a"))?;
            s.create_folder(&p("a"));
            s.defer("count", move || {
                seen.fetch_add(1, Ordering::SeqCst);
            });
            Ok(())
        })
        .unwrap();

        assert_eq!(store.all_paths(), vec![p("a")]);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!tx.pool().locks().is_locked(&p("a")));
        assert_eq!(tx.pool().stats().discarded, 0);
    }

    #[test]
    fn test_read_only_discards_changes() {
        let (store, tx) = manager();
        tx.read(|s| -> Result<()> {
            s.create_folder(&p("sneaky"));
            Ok(())
        })
        .unwrap();

        assert!(store.all_paths().is_empty());
        let stats = tx.pool().stats();
        assert_eq!(stats.discarded, 0);
        assert_eq!(stats.idle, 1);
    }

    #[test]
    fn test_failed_work_rolls_back() {
        let (store, tx) = manager();
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);

        let result = tx.write(|s| -> Result<()> {
            s.lock(&p("a"))?;
            s.create_folder(&p("a"));
            s.defer("count", move || {
                seen.fetch_add(1, Ordering::SeqCst);
            });
            Err(StoreError::Backend("boom".to_string()))
        });

        assert!(result.is_err());
        assert!(store.all_paths().is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!tx.pool().locks().is_locked(&p("a")));
        // Rolled back cleanly, so the session went back to the pool
        assert_eq!(tx.pool().stats().idle, 1);
    }

    #[test]
    fn test_commit_conflict_surfaces() {
        let (store, tx) = manager();
        let result = tx.write(|s| -> Result<()> {
            s.delete(&p("never-existed"));
            Ok(())
        });
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(store.operation_counts().failed_commits, 1);
        assert_eq!(tx.pool().stats().discarded, 0);
    }

    #[test]
    fn test_hook_order_on_transaction() {
        let (store, tx) = manager();
        let session = tx.pool().borrow().unwrap();
        let mut t = Transaction::begin(session, TxMode::ReadWrite);
        t.session().create_folder(&p("x"));
        t.prepare_for_commit().unwrap();
        assert!(t.session().has_pending_changes());
        t.before_commit().unwrap();
        t.after_completion(true);
        assert_eq!(store.all_paths(), vec![p("x")]);
        tx.pool().return_session(t.into_session()).unwrap();
    }
}
