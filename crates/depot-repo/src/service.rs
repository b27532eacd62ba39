//! Access-checked resolution and mutation
//!
//! Every request runs in one pooled session: classify the repository,
//! resolve virtual repositories to physical members, then re-check the
//! principal's permission on the physical path before returning anything.
//! Absent and forbidden both come back as `None` or a filtered listing.

use depot_acl::{AccessControlEngine, Principal};
use depot_core::{Permission, RepoDescriptor, RepoPath};
use depot_store::{DeleteMode, ItemInfo, TransactionManager, delete_tree};
use std::sync::Arc;

use crate::error::{RepoError, Result};
use crate::resolver::{AggregatedItem, VirtualResolver, aggregate};
use crate::topology::{RepositoryHandle, RepositoryTopology, TopologySnapshot};

/// An item found for a request, with the physical path that holds it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem {
    pub requested: RepoPath,
    pub item: ItemInfo,
}

impl ResolvedItem {
    pub fn physical(&self) -> &RepoPath {
        &self.item.repo_path
    }
}

/// Outcome of a write request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied { path: RepoPath, items: usize },
    NotFound,
    Forbidden,
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied { .. })
    }
}

/// Request entry point tying topology, sessions and access control together
pub struct ResolutionService {
    topology: Arc<RepositoryTopology>,
    transactions: TransactionManager,
    acl: AccessControlEngine,
    delete_mode: DeleteMode,
}

impl ResolutionService {
    pub fn new(
        topology: Arc<RepositoryTopology>,
        transactions: TransactionManager,
        acl: AccessControlEngine,
        delete_mode: DeleteMode,
    ) -> Self {
        Self {
            topology,
            transactions,
            acl,
            delete_mode,
        }
    }

    pub fn topology(&self) -> &Arc<RepositoryTopology> {
        &self.topology
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    pub fn acl(&self) -> &AccessControlEngine {
        &self.acl
    }

    /// Rebuild the topology from a new descriptor list
    pub fn reload(&self, descriptors: Vec<RepoDescriptor>) -> Result<()> {
        self.topology.reload(descriptors)
    }

    /// Physical repositories searched for `key`, in resolution order
    fn candidates(topology: &TopologySnapshot, handle: &RepositoryHandle) -> Vec<String> {
        match handle {
            RepositoryHandle::Virtual { key, .. } => VirtualResolver::new(topology)
                .flatten(key)
                .physical
                .into_iter()
                .collect(),
            other => other.physical_key().map(str::to_string).into_iter().collect(),
        }
    }

    /// Find the item at `repo_path` that the principal may access with
    /// `permission`
    ///
    /// For a virtual repository the first member holding the path that the
    /// principal may access wins.
    pub fn resolve(
        &self,
        principal: &Principal,
        repo_path: &RepoPath,
        permission: Permission,
    ) -> Result<Option<ResolvedItem>> {
        let topology = self.topology.snapshot();
        let Some(handle) = topology.classify(repo_path.repo_key()) else {
            tracing::debug!(repo = repo_path.repo_key(), "unknown repository");
            return Ok(None);
        };
        let candidates = Self::candidates(&topology, &handle);

        self.transactions.read(|session| -> Result<Option<ResolvedItem>> {
            for repo in &candidates {
                let physical = repo_path.with_repo(repo);
                let Some(item) = session.item(&physical)? else {
                    continue;
                };
                if !self.acl.evaluate(principal, &physical, permission)? {
                    tracing::debug!(path = %physical, "member holds path but access denied");
                    continue;
                }
                return Ok(Some(ResolvedItem {
                    requested: repo_path.clone(),
                    item,
                }));
            }
            tracing::debug!(path = %repo_path, "not found");
            Ok(None)
        })
    }

    /// Children of `repo_path` the principal may read
    ///
    /// Backing repositories the principal cannot read are dropped from each
    /// item; items left without any are dropped entirely.
    pub fn list(
        &self,
        principal: &Principal,
        repo_path: &RepoPath,
        deep: bool,
    ) -> Result<Vec<AggregatedItem>> {
        let topology = self.topology.snapshot();
        let Some(handle) = topology.classify(repo_path.repo_key()) else {
            tracing::debug!(repo = repo_path.repo_key(), "unknown repository");
            return Ok(Vec::new());
        };

        let items = self.transactions.read(|session| -> Result<Vec<AggregatedItem>> {
            match &handle {
                RepositoryHandle::Virtual { key, .. } => {
                    let resolver = VirtualResolver::new(&topology);
                    if deep {
                        resolver.list_children_deep(session, key, repo_path.path())
                    } else {
                        resolver.list_children(session, key, repo_path.path())
                    }
                }
                other => {
                    let physical: Vec<String> =
                        other.physical_key().map(str::to_string).into_iter().collect();
                    aggregate(session, &physical, repo_path.path())
                }
            }
        })?;

        let mut visible = Vec::with_capacity(items.len());
        for mut item in items {
            let mut readable = item.repo_keys.clone();
            for repo in &item.repo_keys {
                let physical = RepoPath::new(repo.as_str(), &item.path)?;
                if !self.acl.evaluate(principal, &physical, Permission::Read)? {
                    readable.shift_remove(repo);
                }
            }
            if readable.is_empty() {
                continue;
            }
            item.repo_keys = readable;
            visible.push(item);
        }
        Ok(visible)
    }

    /// Repository that receives writes addressed to `key`
    fn deploy_target(&self, key: &str) -> Result<Option<String>> {
        let topology = self.topology.snapshot();
        match topology.classify(key) {
            None => Ok(None),
            Some(RepositoryHandle::Local { key }) => Ok(Some(key)),
            Some(RepositoryHandle::Virtual {
                default_deployment: Some(target),
                ..
            }) if topology.is_local(&target) => Ok(Some(target)),
            Some(other) => Err(RepoError::NotDeployable {
                key: other.key().to_string(),
            }),
        }
    }

    /// Store `content` at `repo_path`, replacing any existing file
    pub fn deploy(
        &self,
        principal: &Principal,
        repo_path: &RepoPath,
        content: &[u8],
    ) -> Result<MutationOutcome> {
        let Some(target) = self.deploy_target(repo_path.repo_key())? else {
            return Ok(MutationOutcome::NotFound);
        };
        let physical = repo_path.with_repo(&target);
        if !self.acl.evaluate(principal, &physical, Permission::Deploy)? {
            return Ok(MutationOutcome::Forbidden);
        }

        self.transactions.write(|session| -> Result<()> {
            let parent = physical
                .parent()
                .unwrap_or_else(|| RepoPath::root(target.as_str()));
            session.lock(&parent)?;
            session.put_file(&physical, content)?;
            Ok(())
        })?;
        tracing::debug!(path = %physical, bytes = content.len(), "deployed");
        Ok(MutationOutcome::Applied {
            path: physical,
            items: 1,
        })
    }

    /// Create a folder and any missing parents
    pub fn create_folder(
        &self,
        principal: &Principal,
        repo_path: &RepoPath,
    ) -> Result<MutationOutcome> {
        let Some(target) = self.deploy_target(repo_path.repo_key())? else {
            return Ok(MutationOutcome::NotFound);
        };
        let physical = repo_path.with_repo(&target);
        if !self.acl.evaluate(principal, &physical, Permission::Deploy)? {
            return Ok(MutationOutcome::Forbidden);
        }

        self.transactions.write(|session| -> Result<()> {
            session.lock(&physical)?;
            session.create_folder(&physical);
            Ok(())
        })?;
        Ok(MutationOutcome::Applied {
            path: physical,
            items: 1,
        })
    }

    /// Delete an item or a folder tree from a physical repository
    pub fn delete(&self, principal: &Principal, repo_path: &RepoPath) -> Result<MutationOutcome> {
        let topology = self.topology.snapshot();
        let physical_key = match topology.classify(repo_path.repo_key()) {
            None => return Ok(MutationOutcome::NotFound),
            Some(handle) => match handle.physical_key() {
                Some(key) => key.to_string(),
                None => {
                    return Err(RepoError::NotPhysical {
                        key: handle.key().to_string(),
                    });
                }
            },
        };
        let physical = repo_path.with_repo(&physical_key);
        if !self.acl.evaluate(principal, &physical, Permission::Delete)? {
            return Ok(MutationOutcome::Forbidden);
        }

        let mode = self.delete_mode;
        let report = self
            .transactions
            .write(|session| -> Result<_> { Ok(delete_tree(session, &physical, mode)?) })?;
        if report.deleted == 0 && !physical.is_root() {
            return Ok(MutationOutcome::NotFound);
        }
        Ok(MutationOutcome::Applied {
            path: physical,
            items: report.deleted,
        })
    }
}
