//! Permission evaluation
//!
//! Evaluation searches four levels, most specific first, and stops at the
//! first one yielding a non-empty mask for the principal:
//!
//! 1. targets naming the repository, matching the path; retried for each
//!    parent path up to the root
//! 2. targets naming the repository, accepting any path
//! 3. `ANY` targets matching the path, with the same parent retries
//! 4. `ANY` targets accepting any path

use depot_core::{ANY_REMOTE_REPO, ANY_REPO, Permission, PermissionMask, RepoPath};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::cache::{AclCache, AclSnapshot, CachedAcl};
use crate::error::Result;
use crate::principal::Principal;
use crate::store::AclStore;

/// Tells the engine which repositories `ANY REMOTE` covers
pub trait RepoClassifier: Send + Sync {
    /// True for remote repositories and their caches
    fn is_remote_or_cache(&self, repo_key: &str) -> bool;
}

/// Classifier for setups without remote repositories
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRemotes;

impl RepoClassifier for NoRemotes {
    fn is_remote_or_cache(&self, _repo_key: &str) -> bool {
        false
    }
}

/// The level that decided an evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionLevel {
    Admin,
    /// Level 1, at the given (possibly generalized) path
    RepoPath(String),
    RepoAnyPath,
    /// Level 3, at the given (possibly generalized) path
    AnyRepoPath(String),
    AnyRepoAnyPath,
}

impl fmt::Display for DecisionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionLevel::Admin => f.write_str("administrator"),
            DecisionLevel::RepoPath(path) => write!(f, "repository, path '{}'", path),
            DecisionLevel::RepoAnyPath => f.write_str("repository, any path"),
            DecisionLevel::AnyRepoPath(path) => write!(f, "any repository, path '{}'", path),
            DecisionLevel::AnyRepoAnyPath => f.write_str("any repository, any path"),
        }
    }
}

/// Outcome of an evaluation with the mask that decided it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub granted: bool,
    pub mask: PermissionMask,
    /// `None` when no level yielded a mask
    pub level: Option<DecisionLevel>,
}

#[derive(Clone, Copy)]
enum RepoScope<'a> {
    Exact { key: &'a str, remote: bool },
    Any,
}

impl RepoScope<'_> {
    fn covers(&self, cached: &CachedAcl) -> bool {
        let keys = &cached.acl.target.repo_keys;
        match *self {
            RepoScope::Exact { key, remote } => {
                keys.contains(key) || (remote && keys.contains(ANY_REMOTE_REPO))
            }
            RepoScope::Any => keys.contains(ANY_REPO),
        }
    }
}

#[derive(Clone, Copy)]
enum PathScope<'a> {
    Path(&'a str),
    AnyPath,
}

impl PathScope<'_> {
    fn covers(&self, cached: &CachedAcl) -> bool {
        match *self {
            PathScope::Path(path) => cached.matcher.matches(path),
            PathScope::AnyPath => cached.matcher.accepts_any_path(),
        }
    }
}

/// Evaluates permissions against the cached Acls
#[derive(Clone)]
pub struct AccessControlEngine {
    store: Arc<dyn AclStore>,
    cache: Arc<AclCache>,
    classifier: Arc<dyn RepoClassifier>,
}

impl AccessControlEngine {
    pub fn new(
        store: Arc<dyn AclStore>,
        cache: Arc<AclCache>,
        classifier: Arc<dyn RepoClassifier>,
    ) -> Self {
        Self {
            store,
            cache,
            classifier,
        }
    }

    /// Does the principal hold `permission` on `repo_path`?
    pub fn evaluate(
        &self,
        principal: &Principal,
        repo_path: &RepoPath,
        permission: Permission,
    ) -> Result<bool> {
        Ok(self.decide(principal, repo_path, permission)?.granted)
    }

    /// Evaluate and report which level decided
    pub fn decide(
        &self,
        principal: &Principal,
        repo_path: &RepoPath,
        permission: Permission,
    ) -> Result<Decision> {
        if principal.admin {
            return Ok(Decision {
                granted: true,
                mask: Permission::ALL.into_iter().collect(),
                level: Some(DecisionLevel::Admin),
            });
        }

        let snapshot = self.cache.get_or_rebuild(self.store.as_ref())?;
        let decision = match effective_mask(&snapshot, principal, repo_path, self.classifier.as_ref()) {
            Some((mask, level)) => Decision {
                granted: mask.contains(permission),
                mask,
                level: Some(level),
            },
            None => Decision {
                granted: false,
                mask: PermissionMask::EMPTY,
                level: None,
            },
        };

        if !decision.granted {
            tracing::debug!(
                user = %principal.username,
                path = %repo_path,
                %permission,
                "permission denied"
            );
        }
        Ok(decision)
    }
}

fn effective_mask(
    snapshot: &AclSnapshot,
    principal: &Principal,
    repo_path: &RepoPath,
    classifier: &dyn RepoClassifier,
) -> Option<(PermissionMask, DecisionLevel)> {
    let exact = RepoScope::Exact {
        key: repo_path.repo_key(),
        remote: classifier.is_remote_or_cache(repo_path.repo_key()),
    };

    if let Some((mask, path)) = mask_with_parent_fallback(snapshot, principal, exact, repo_path) {
        return Some((mask, DecisionLevel::RepoPath(path)));
    }
    let mask = level_mask(snapshot, principal, exact, PathScope::AnyPath);
    if !mask.is_empty() {
        return Some((mask, DecisionLevel::RepoAnyPath));
    }
    if let Some((mask, path)) =
        mask_with_parent_fallback(snapshot, principal, RepoScope::Any, repo_path)
    {
        return Some((mask, DecisionLevel::AnyRepoPath(path)));
    }
    let mask = level_mask(snapshot, principal, RepoScope::Any, PathScope::AnyPath);
    if !mask.is_empty() {
        return Some((mask, DecisionLevel::AnyRepoAnyPath));
    }
    None
}

/// Try the path, then each parent up to the root
///
/// A target whose excludes reject the requested path, or any parent tried
/// on the way up, takes no further part in the walk.
fn mask_with_parent_fallback(
    snapshot: &AclSnapshot,
    principal: &Principal,
    repo: RepoScope<'_>,
    repo_path: &RepoPath,
) -> Option<(PermissionMask, String)> {
    let mut excluded: HashSet<&str> = HashSet::new();
    let mut current = Some(repo_path.clone());
    while let Some(path) = current {
        let mut mask = PermissionMask::EMPTY;
        for cached in snapshot.iter().filter(|cached| repo.covers(cached)) {
            let name = cached.acl.target.name.as_str();
            if cached.matcher.is_excluded(path.path()) {
                excluded.insert(name);
            }
            if excluded.contains(name) || !PathScope::Path(path.path()).covers(cached) {
                continue;
            }
            mask |= cached.acl.mask_for(principal);
        }
        if !mask.is_empty() {
            return Some((mask, path.path().to_string()));
        }
        current = path.parent();
    }
    None
}

fn level_mask(
    snapshot: &AclSnapshot,
    principal: &Principal,
    repo: RepoScope<'_>,
    path: PathScope<'_>,
) -> PermissionMask {
    snapshot
        .iter()
        .filter(|cached| repo.covers(cached) && path.covers(cached))
        .fold(PermissionMask::EMPTY, |mask, cached| {
            mask | cached.acl.mask_for(principal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Acl, PermissionTarget, Sid};
    use crate::store::MemoryAclStore;

    struct RemoteKeys(Vec<&'static str>);

    impl RepoClassifier for RemoteKeys {
        fn is_remote_or_cache(&self, repo_key: &str) -> bool {
            self.0.iter().any(|k| *k == repo_key)
        }
    }

    fn engine(acls: Vec<Acl>) -> AccessControlEngine {
        AccessControlEngine::new(
            Arc::new(MemoryAclStore::with_acls(acls)),
            Arc::new(AclCache::new()),
            Arc::new(RemoteKeys(vec!["jcenter", "jcenter-cache"])),
        )
    }

    fn path(key: &str, p: &str) -> RepoPath {
        RepoPath::new(key, p).unwrap()
    }

    fn bob() -> Principal {
        Principal::user("bob").with_groups(["readers"])
    }

    #[test]
    fn test_any_any_grants_through_group() {
        let acl = Acl::new(PermissionTarget::new("anyAny", [ANY_REPO]))
            .grant(Sid::group("readers"), Permission::Read);
        let engine = engine(vec![acl]);

        let decision = engine
            .decide(&bob(), &path("any-repo-key", "x/y"), Permission::Read)
            .unwrap();
        assert!(decision.granted);
        assert_eq!(decision.level, Some(DecisionLevel::AnyRepoPath("x/y".to_string())));
        assert!(!engine
            .evaluate(&bob(), &path("any-repo-key", "x/y"), Permission::Deploy)
            .unwrap());
    }

    #[test]
    fn test_exact_match_wins_without_fallback() {
        let exact = Acl::new(PermissionTarget::new("exact", ["libs"]).with_includes(["org/**"]))
            .grant(Sid::user("bob"), Permission::Deploy);
        let broad = Acl::new(PermissionTarget::new("broad", [ANY_REPO]))
            .grant(Sid::user("bob"), Permission::Read);
        let engine = engine(vec![exact, broad]);

        let decision = engine
            .decide(&bob(), &path("libs", "org/app.jar"), Permission::Deploy)
            .unwrap();
        assert!(decision.granted);
        assert_eq!(decision.level, Some(DecisionLevel::RepoPath("org/app.jar".to_string())));
        // Level 1 decided, so the ANY grant of read is never consulted
        assert!(!engine
            .evaluate(&bob(), &path("libs", "org/app.jar"), Permission::Read)
            .unwrap());
    }

    #[test]
    fn test_parent_fallback_before_repo_any_path() {
        let folder = Acl::new(PermissionTarget::new("folder", ["libs"]).with_includes(["org"]))
            .grant(Sid::user("bob"), Permission::Delete);
        let engine = engine(vec![folder]);

        let decision = engine
            .decide(&bob(), &path("libs", "org/acme/app.jar"), Permission::Delete)
            .unwrap();
        assert!(decision.granted);
        assert_eq!(decision.level, Some(DecisionLevel::RepoPath("org".to_string())));
    }

    #[test]
    fn test_excluded_path_uses_remaining_targets() {
        let snapshots = Acl::new(
            PermissionTarget::new("snapshots", ["libs"])
                .with_includes(["snap/**"])
                .with_excludes(["**/*.tmp"]),
        )
        .grant(Sid::user("bob"), Permission::Manage);
        let whole = Acl::new(PermissionTarget::new("whole", ["libs"]))
            .grant(Sid::group("readers"), Permission::Read);
        let engine = engine(vec![snapshots, whole]);

        let kept = path("libs", "snap/a.jar");
        assert!(engine.evaluate(&bob(), &kept, Permission::Manage).unwrap());

        let excluded = path("libs", "snap/a.tmp");
        let decision = engine.decide(&bob(), &excluded, Permission::Manage).unwrap();
        assert!(!decision.granted);
        assert_eq!(decision.mask, PermissionMask::from(Permission::Read));
        assert_eq!(decision.level, Some(DecisionLevel::RepoPath("snap/a.tmp".to_string())));
    }

    #[test]
    fn test_excluded_path_is_not_granted_through_parent() {
        let keys =
            Acl::new(PermissionTarget::new("no-keys", ["libs"]).with_excludes(["**/*.key"]))
                .grant(Sid::user("bob"), Permission::Read);
        let engine = engine(vec![keys]);

        let decision = engine
            .decide(&bob(), &path("libs", "certs/server.key"), Permission::Read)
            .unwrap();
        assert!(!decision.granted);
        assert_eq!(decision.level, None);

        let pem = engine
            .decide(&bob(), &path("libs", "certs/server.pem"), Permission::Read)
            .unwrap();
        assert!(pem.granted);
        assert_eq!(pem.level, Some(DecisionLevel::RepoPath("certs/server.pem".to_string())));
    }

    #[test]
    fn test_any_remote_covers_remotes_and_caches() {
        let remote = Acl::new(PermissionTarget::new("remotes", [ANY_REMOTE_REPO]))
            .grant(Sid::user("bob"), Permission::Read);
        let engine = engine(vec![remote]);

        assert!(engine.evaluate(&bob(), &path("jcenter-cache", "a"), Permission::Read).unwrap());
        assert!(engine.evaluate(&bob(), &path("jcenter", "a"), Permission::Read).unwrap());
        assert!(!engine.evaluate(&bob(), &path("libs", "a"), Permission::Read).unwrap());
    }

    #[test]
    fn test_nothing_matches_is_denied() {
        let other = Acl::new(PermissionTarget::new("other", ["elsewhere"]))
            .grant(Sid::user("bob"), Permission::Read);
        let engine = engine(vec![other]);
        let decision = engine
            .decide(&bob(), &path("libs", "a/b"), Permission::Read)
            .unwrap();
        assert!(!decision.granted);
        assert_eq!(decision.level, None);
        assert!(decision.mask.is_empty());
    }

    #[test]
    fn test_admin_bypasses() {
        let engine = engine(Vec::new());
        let admin = Principal::user("root").as_admin();
        assert!(engine.evaluate(&admin, &path("libs", "a"), Permission::Manage).unwrap());
    }

    #[test]
    fn test_zero_mask_for_other_principal_falls_through() {
        let exact = Acl::new(PermissionTarget::new("exact", ["libs"]))
            .grant(Sid::user("alice"), Permission::Deploy);
        let any = Acl::new(PermissionTarget::new("any", [ANY_REPO]))
            .grant(Sid::group("readers"), Permission::Read);
        let engine = engine(vec![exact, any]);

        let decision = engine.decide(&bob(), &path("libs", "a"), Permission::Read).unwrap();
        assert!(decision.granted);
        assert_eq!(decision.level, Some(DecisionLevel::AnyRepoPath("a".to_string())));
    }
}
