//! Recursive folder deletion

use depot_core::{DeleteConfig, RepoPath};

use crate::error::Result;
use crate::session::ContentSession;

/// How a tree delete is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Commit after every removed child; a failure leaves a partial delete
    #[default]
    PerChildCommit,
    /// Stage everything and let the caller's single commit apply it
    SingleTransaction,
}

impl From<&DeleteConfig> for DeleteMode {
    fn from(config: &DeleteConfig) -> Self {
        if config.single_transaction {
            DeleteMode::SingleTransaction
        } else {
            DeleteMode::PerChildCommit
        }
    }
}

/// Outcome of a tree delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Items removed, the target included
    pub deleted: usize,
    /// Commits issued by the delete itself
    pub commits: usize,
}

/// Delete `path` and, for a folder, everything below it, depth first
///
/// The target is locked for the rest of the caller's unit of work. Deleting
/// a repository root empties the repository. A missing target is not an
/// error.
pub fn delete_tree(
    session: &mut ContentSession,
    path: &RepoPath,
    mode: DeleteMode,
) -> Result<DeleteReport> {
    let mut report = DeleteReport::default();
    let Some(item) = session.item(path)? else {
        tracing::debug!(path = %path, "nothing to delete");
        return Ok(report);
    };

    session.lock(path)?;
    if item.folder {
        delete_children(session, path, mode, &mut report)?;
    }
    if !path.is_root() {
        remove_one(session, path, mode, &mut report)?;
    }

    tracing::debug!(path = %path, deleted = report.deleted, commits = report.commits, ?mode, "tree deleted");
    Ok(report)
}

fn delete_children(
    session: &mut ContentSession,
    folder: &RepoPath,
    mode: DeleteMode,
    report: &mut DeleteReport,
) -> Result<()> {
    for child in session.list_children(folder)? {
        if child.folder {
            delete_children(session, &child.repo_path, mode, report)?;
        }
        remove_one(session, &child.repo_path, mode, report)?;
    }
    Ok(())
}

fn remove_one(
    session: &mut ContentSession,
    path: &RepoPath,
    mode: DeleteMode,
    report: &mut DeleteReport,
) -> Result<()> {
    session.delete(path);
    report.deleted += 1;
    if mode == DeleteMode::PerChildCommit {
        session.save()?;
        report.commits += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Mutation;
    use crate::lock::LockCoordinator;
    use crate::store::{MemoryTreeStore, TreeStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn p(path: &str) -> RepoPath {
        RepoPath::new("libs", path).unwrap()
    }

    fn seeded() -> (MemoryTreeStore, ContentSession) {
        let store = MemoryTreeStore::new();
        store
            .seed(&[
                Mutation::put_bytes(p("a/b/c"), b"c"),
                Mutation::put_bytes(p("a/b/d"), b"d"),
                Mutation::put_bytes(p("keep"), b"k"),
            ])
            .unwrap();
        let session = ContentSession::new(
            store.connect().unwrap(),
            Arc::new(LockCoordinator::new()),
            Duration::from_millis(50),
        );
        (store, session)
    }

    #[test]
    fn test_per_child_commits() {
        let (store, mut session) = seeded();
        let report = delete_tree(&mut session, &p("a/b"), DeleteMode::PerChildCommit).unwrap();
        assert_eq!(report, DeleteReport { deleted: 3, commits: 3 });
        assert_eq!(store.all_paths(), vec![p("a"), p("keep")]);
        assert_eq!(session.locked_paths(), vec![p("a/b")]);
        session.release_resources(true);
    }

    #[test]
    fn test_crash_leaves_partial_delete() {
        let (store, mut session) = seeded();
        store.crash_after_commits(1);

        assert!(delete_tree(&mut session, &p("a/b"), DeleteMode::PerChildCommit).is_err());
        let paths = store.all_paths();
        assert!(!paths.contains(&p("a/b/c")));
        assert!(paths.contains(&p("a/b/d")));
        assert!(paths.contains(&p("a/b")));

        session.release_resources(false);
        session.refresh(false).unwrap();
    }

    #[test]
    fn test_single_transaction_stages_only() {
        let (store, mut session) = seeded();
        let report = delete_tree(&mut session, &p("a"), DeleteMode::SingleTransaction).unwrap();
        assert_eq!(report, DeleteReport { deleted: 4, commits: 0 });
        assert!(!session.exists(&p("a/b/c")).unwrap());
        assert_eq!(store.all_paths().len(), 5);

        session.save().unwrap();
        assert_eq!(store.all_paths(), vec![p("keep")]);
        assert_eq!(store.operation_counts().commits, 1);
        session.release_resources(true);
    }

    #[test]
    fn test_root_delete_empties_repository() {
        let (store, mut session) = seeded();
        let report =
            delete_tree(&mut session, &RepoPath::root("libs"), DeleteMode::SingleTransaction)
                .unwrap();
        assert_eq!(report.deleted, 5);
        session.save().unwrap();
        assert!(store.all_paths().is_empty());
        session.release_resources(true);
    }

    #[test]
    fn test_missing_target_is_noop() {
        let (_store, mut session) = seeded();
        let report = delete_tree(&mut session, &p("nope"), DeleteMode::PerChildCommit).unwrap();
        assert_eq!(report, DeleteReport::default());
        assert!(session.resources().is_empty());
    }

    #[test]
    fn test_mode_from_config() {
        assert_eq!(DeleteMode::from(&DeleteConfig::default()), DeleteMode::PerChildCommit);
        assert_eq!(
            DeleteMode::from(&DeleteConfig {
                single_transaction: true
            }),
            DeleteMode::SingleTransaction
        );
    }
}
