//! Per-session registry of resources released at transaction end

use std::fmt;

use crate::lock::{LockCoordinator, LockHandle};

/// Work to run once the owning transaction has committed
pub struct DeferredAction {
    description: String,
    action: Box<dyn FnOnce() + Send>,
}

impl DeferredAction {
    pub fn new(description: impl Into<String>, action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            description: description.into(),
            action: Box::new(action),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    fn run(self) {
        (self.action)()
    }
}

impl fmt::Debug for DeferredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredAction")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Resources a session accumulates during one unit of work
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    locks: Vec<LockHandle>,
    deferred: Vec<DeferredAction>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty() && self.deferred.is_empty()
    }

    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    pub fn add_lock(&mut self, handle: LockHandle) {
        self.locks.push(handle);
    }

    pub fn add_deferred(&mut self, action: DeferredAction) {
        self.deferred.push(action);
    }

    /// Remove the most recently registered lock on exactly this path
    pub fn take_lock(&mut self, path: &depot_core::RepoPath) -> Option<LockHandle> {
        let idx = self.locks.iter().rposition(|h| h.path() == path)?;
        Some(self.locks.remove(idx))
    }

    /// Short description of everything still registered, for leak reports
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self
            .locks
            .iter()
            .map(|h| format!("lock {}", h.path()))
            .collect();
        parts.extend(
            self.deferred
                .iter()
                .map(|a| format!("deferred '{}'", a.description())),
        );
        parts.join(", ")
    }

    /// Release everything, locks first
    ///
    /// Deferred actions run only when `success` is true; otherwise they are
    /// dropped unexecuted. Returns the number of actions run.
    pub fn release_all(&mut self, locks: &LockCoordinator, success: bool) -> usize {
        for handle in self.locks.drain(..).rev() {
            locks.release(handle);
        }

        let actions: Vec<DeferredAction> = self.deferred.drain(..).collect();
        if !success {
            if !actions.is_empty() {
                tracing::debug!(dropped = actions.len(), "discarding deferred actions");
            }
            return 0;
        }

        let count = actions.len();
        for action in actions {
            tracing::debug!(action = action.description(), "running deferred action");
            action.run();
        }
        count
    }
}
