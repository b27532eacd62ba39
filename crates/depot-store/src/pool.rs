//! Bounded pool of content sessions

use depot_core::{EngineConfig, ExhaustedPolicy, PoolConfig};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Result, StoreError};
use crate::lock::LockCoordinator;
use crate::session::ContentSession;
use crate::store::TreeStore;

/// Pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Sessions opened against the store
    pub created: u64,
    /// Borrows served from an idle session
    pub reused: u64,
    /// Sessions destroyed on return because they leaked
    pub discarded: u64,
    pub idle: usize,
    pub outstanding: usize,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<ContentSession>,
    outstanding: usize,
}

/// Hands out sessions up to a fixed ceiling
pub struct SessionPool {
    store: Arc<dyn TreeStore>,
    locks: Arc<LockCoordinator>,
    config: PoolConfig,
    lock_timeout: Duration,
    state: Mutex<PoolState>,
    returned: Condvar,
    created: AtomicU64,
    reused: AtomicU64,
    discarded: AtomicU64,
}

impl SessionPool {
    pub fn new(store: Arc<dyn TreeStore>, locks: Arc<LockCoordinator>, config: &EngineConfig) -> Self {
        Self {
            store,
            locks,
            config: config.pool.clone(),
            lock_timeout: config.locks.acquire_timeout,
            state: Mutex::new(PoolState::default()),
            returned: Condvar::new(),
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    pub fn locks(&self) -> &Arc<LockCoordinator> {
        &self.locks
    }

    pub fn max_sessions(&self) -> usize {
        self.config.max_sessions
    }

    /// Borrow a session, opening a new one while under the ceiling
    ///
    /// At the ceiling this waits for a return or fails, depending on the
    /// configured exhaustion policy.
    pub fn borrow(&self) -> Result<ContentSession> {
        let started = Instant::now();
        let deadline = started + self.config.borrow_timeout;
        let mut state = self.state.lock();

        loop {
            if let Some(session) = state.idle.pop() {
                state.outstanding += 1;
                self.reused.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(session = %session.id(), "session borrowed from pool");
                return Ok(session);
            }

            if state.outstanding < self.config.max_sessions {
                state.outstanding += 1;
                drop(state);
                return match self.store.connect() {
                    Ok(conn) => {
                        let session =
                            ContentSession::new(conn, Arc::clone(&self.locks), self.lock_timeout);
                        self.created.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(
                            session = %session.id(),
                            backend = self.store.backend_name(),
                            "session opened"
                        );
                        Ok(session)
                    }
                    Err(e) => {
                        self.state.lock().outstanding -= 1;
                        self.returned.notify_one();
                        Err(e)
                    }
                };
            }

            match self.config.on_exhausted {
                ExhaustedPolicy::Fail => {
                    return Err(StoreError::PoolExhausted {
                        max: self.config.max_sessions,
                    });
                }
                ExhaustedPolicy::Block => {
                    if self.returned.wait_until(&mut state, deadline).timed_out()
                        && state.idle.is_empty()
                        && state.outstanding >= self.config.max_sessions
                    {
                        return Err(StoreError::BorrowTimeout {
                            waited: started.elapsed(),
                        });
                    }
                }
            }
        }
    }

    /// Give a session back
    ///
    /// A session still holding pending changes or registered resources is
    /// destroyed instead of pooled and the leak is returned as an error.
    pub fn return_session(&self, mut session: ContentSession) -> Result<()> {
        let leak = session.leak_report().map(|detail| StoreError::ResourceLeak {
            session: session.id().as_u64(),
            detail,
        });

        let keep = if leak.is_some() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            // logout reports the leak and releases what it can
            session.logout();
            None
        } else {
            session.reset();
            tracing::debug!(session = %session.id(), "session returned to pool");
            Some(session)
        };

        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        if let Some(session) = keep {
            state.idle.push(session);
        }
        drop(state);
        self.returned.notify_one();

        match leak {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle: state.idle.len(),
            outstanding: state.outstanding,
        }
    }

    /// Log out every idle session
    pub fn close_idle(&self) -> usize {
        let idle: Vec<ContentSession> = std::mem::take(&mut self.state.lock().idle);
        let count = idle.len();
        for session in idle {
            session.logout();
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTreeStore;
    use depot_core::RepoPath;
    use std::thread;

    fn pool(max: usize, policy: ExhaustedPolicy, timeout: Duration) -> SessionPool {
        let mut config = EngineConfig::default();
        config.pool.max_sessions = max;
        config.pool.on_exhausted = policy;
        config.pool.borrow_timeout = timeout;
        config.locks.acquire_timeout = Duration::from_millis(50);
        SessionPool::new(
            Arc::new(MemoryTreeStore::new()),
            Arc::new(LockCoordinator::new()),
            &config,
        )
    }

    #[test]
    fn test_reuses_returned_sessions() {
        let pool = pool(2, ExhaustedPolicy::Fail, Duration::from_millis(10));
        let s = pool.borrow().unwrap();
        let id = s.id();
        pool.return_session(s).unwrap();
        let again = pool.borrow().unwrap();
        assert_eq!(again.id(), id);
        pool.return_session(again).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.outstanding, 0);
    }

    #[test]
    fn test_fail_fast_when_exhausted() {
        let pool = pool(1, ExhaustedPolicy::Fail, Duration::from_millis(10));
        let held = pool.borrow().unwrap();
        assert!(matches!(
            pool.borrow(),
            Err(StoreError::PoolExhausted { max: 1 })
        ));
        pool.return_session(held).unwrap();
        assert!(pool.borrow().is_ok());
    }

    #[test]
    fn test_block_times_out() {
        let pool = pool(1, ExhaustedPolicy::Block, Duration::from_millis(30));
        let held = pool.borrow().unwrap();
        assert!(pool.borrow().unwrap_err().is_timeout());
        pool.return_session(held).unwrap();
    }

    #[test]
    fn test_blocked_borrower_gets_returned_session() {
        let pool = Arc::new(pool(1, ExhaustedPolicy::Block, Duration::from_secs(5)));
        let held = pool.borrow().unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let s = pool.borrow()?;
                pool.return_session(s)
            })
        };

        thread::sleep(Duration::from_millis(20));
        pool.return_session(held).unwrap();
        waiter.join().unwrap().unwrap();
        assert_eq!(pool.stats().created, 1);
    }

    #[test]
    fn test_leaking_session_is_discarded() {
        let pool = pool(1, ExhaustedPolicy::Fail, Duration::from_millis(10));
        let mut s = pool.borrow().unwrap();
        let path = RepoPath::new("libs", "a").unwrap();
        s.lock(&path).unwrap();

        let err = pool.return_session(s).unwrap_err();
        assert!(matches!(err, StoreError::ResourceLeak { .. }));
        assert!(!pool.locks().is_locked(&path));

        let stats = pool.stats();
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.outstanding, 0);

        // The slot is free again
        let fresh = pool.borrow().unwrap();
        assert!(fresh.resources().is_empty());
        pool.return_session(fresh).unwrap();
    }

    #[test]
    fn test_pending_changes_count_as_leak() {
        let pool = pool(1, ExhaustedPolicy::Fail, Duration::from_millis(10));
        let mut s = pool.borrow().unwrap();
        s.create_folder(&RepoPath::new("libs", "x").unwrap());
        assert!(pool.return_session(s).is_err());
        assert_eq!(pool.close_idle(), 0);
    }
}
