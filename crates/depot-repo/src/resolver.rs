//! Virtual repository resolution
//!
//! A virtual repository is flattened into the physical repositories it
//! reaches, then listings of those repositories are merged by path. Member
//! order decides which repository is the first-seen owner of a path.

use depot_core::RepoPath;
use depot_store::ContentSession;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::error::Result;
use crate::topology::{RepositoryHandle, TopologySnapshot};

/// One logical path and the repositories physically holding it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedItem {
    /// Repo-relative path
    pub path: String,
    pub name: String,
    pub folder: bool,
    /// Backing repositories, first-seen owner first
    pub repo_keys: IndexSet<String>,
}

impl AggregatedItem {
    /// Repository that wins for this path
    pub fn owner(&self) -> Option<&str> {
        self.repo_keys.first().map(String::as_str)
    }
}

/// Result of flattening a virtual repository's member graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedVirtual {
    /// The root first, then fully walked nested virtuals in discovery order
    pub virtuals: IndexSet<String>,
    pub locals: IndexSet<String>,
    pub caches: IndexSet<String>,
    pub remotes: IndexSet<String>,
    /// Locals and caches in configured member order
    pub physical: IndexSet<String>,
    /// Set when a member referenced a virtual already being traversed
    pub cycle_detected: bool,
}

/// Flatten the member graph of `virtual_key`
///
/// Traversal is an explicit depth-first walk. A member pointing back at a
/// virtual repository on the current path is a cycle: the walk warns and
/// stops there, keeping only what was collected before the back-edge.
/// Nested virtuals whose walk was cut short are not reported as searchable.
/// A virtual reached twice through different branches is only walked once.
pub fn flatten(topology: &TopologySnapshot, virtual_key: &str) -> FlattenedVirtual {
    let mut out = FlattenedVirtual::default();
    if !topology.is_virtual(virtual_key) {
        return out;
    }

    out.virtuals.insert(virtual_key.to_string());
    // (virtual key, next member index)
    let mut stack: Vec<(String, usize)> = vec![(virtual_key.to_string(), 0)];

    while let Some((current, index)) = stack.last_mut() {
        let members = topology.members(current).unwrap_or_default();
        let Some(member) = members.get(*index) else {
            stack.pop();
            continue;
        };
        *index += 1;
        let current = current.clone();

        match topology.classify(member) {
            Some(RepositoryHandle::Virtual { key, .. }) => {
                if stack.iter().any(|(on_path, _)| *on_path == key) {
                    let visited: Vec<&str> = out.virtuals.iter().map(String::as_str).collect();
                    tracing::warn!(
                        "Virtual repository '{}' references '{}' which is already being resolved; \
                         truncating resolution of '{}' (visited: {})",
                        current,
                        key,
                        virtual_key,
                        visited.join(", ")
                    );
                    for (unfinished, _) in stack.iter().skip(1) {
                        out.virtuals.shift_remove(unfinished);
                    }
                    out.cycle_detected = true;
                    break;
                }
                if out.virtuals.insert(key.clone()) {
                    stack.push((key, 0));
                }
            }
            Some(RepositoryHandle::Local { key }) => {
                out.locals.insert(key.clone());
                out.physical.insert(key);
            }
            Some(RepositoryHandle::Cache { key, remote }) => {
                out.remotes.insert(remote);
                out.caches.insert(key.clone());
                out.physical.insert(key);
            }
            Some(RepositoryHandle::Remote { key, cache, .. }) => {
                out.remotes.insert(key);
                if let Some(cache) = cache {
                    out.caches.insert(cache.clone());
                    out.physical.insert(cache);
                }
            }
            None => tracing::debug!(member = %member, "skipping unknown virtual member"),
        }
    }

    out
}

/// Merge the direct children of `path` across `repos`, in order
pub fn aggregate<'a>(
    session: &ContentSession,
    repos: impl IntoIterator<Item = &'a String>,
    path: &str,
) -> Result<Vec<AggregatedItem>> {
    let mut merged: IndexMap<String, AggregatedItem> = IndexMap::new();
    for repo in repos {
        let folder = RepoPath::new(repo.as_str(), path)?;
        if !session.is_folder(&folder)? {
            continue;
        }
        for child in session.list_children(&folder)? {
            let child_path = child.repo_path.path().to_string();
            match merged.get_mut(&child_path) {
                Some(item) => {
                    item.repo_keys.insert(repo.clone());
                }
                None => {
                    merged.insert(
                        child_path.clone(),
                        AggregatedItem {
                            path: child_path,
                            name: child.name().to_string(),
                            folder: child.folder,
                            repo_keys: IndexSet::from([repo.clone()]),
                        },
                    );
                }
            }
        }
    }
    Ok(merged.into_values().collect())
}

/// Lists virtual repositories through their flattened members
pub struct VirtualResolver<'a> {
    topology: &'a TopologySnapshot,
}

impl<'a> VirtualResolver<'a> {
    pub fn new(topology: &'a TopologySnapshot) -> Self {
        Self { topology }
    }

    pub fn flatten(&self, virtual_key: &str) -> FlattenedVirtual {
        flatten(self.topology, virtual_key)
    }

    /// Children of `path` merged across every physical repository reached
    pub fn list_children(
        &self,
        session: &ContentSession,
        virtual_key: &str,
        path: &str,
    ) -> Result<Vec<AggregatedItem>> {
        let flattened = self.flatten(virtual_key);
        aggregate(session, &flattened.physical, path)
    }

    /// `list_children`, followed by the same flatten-and-list procedure
    /// once per nested virtual repository
    ///
    /// Contributions of different virtual repositories are concatenated,
    /// not merged.
    pub fn list_children_deep(
        &self,
        session: &ContentSession,
        virtual_key: &str,
        path: &str,
    ) -> Result<Vec<AggregatedItem>> {
        let flattened = self.flatten(virtual_key);
        let mut items = aggregate(session, &flattened.physical, path)?;
        for nested in flattened.virtuals.iter().skip(1) {
            let nested = self.flatten(nested);
            items.extend(aggregate(session, &nested.physical, path)?);
        }
        Ok(items)
    }
}
