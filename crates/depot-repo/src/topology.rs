//! Repository topology
//!
//! The configured repositories partitioned into locals, remotes (with their
//! caches) and virtuals, in configuration order. The topology is read-mostly:
//! readers take a cheap snapshot, a reload swaps in a whole new one.

use depot_acl::RepoClassifier;
use depot_core::{CACHE_SUFFIX, RepoDescriptor, RepoKind};
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use crate::error::{RepoError, Result};

/// Classified repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RepositoryHandle {
    Local {
        key: String,
    },
    /// Local storage attached to a remote repository
    Cache {
        key: String,
        remote: String,
    },
    Remote {
        key: String,
        url: String,
        /// Set when the remote stores artifacts locally
        cache: Option<String>,
    },
    Virtual {
        key: String,
        members: Vec<String>,
        default_deployment: Option<String>,
    },
}

impl RepositoryHandle {
    pub fn key(&self) -> &str {
        match self {
            RepositoryHandle::Local { key }
            | RepositoryHandle::Cache { key, .. }
            | RepositoryHandle::Remote { key, .. }
            | RepositoryHandle::Virtual { key, .. } => key,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            RepositoryHandle::Local { .. } => "local",
            RepositoryHandle::Cache { .. } => "cache",
            RepositoryHandle::Remote { .. } => "remote",
            RepositoryHandle::Virtual { .. } => "virtual",
        }
    }

    /// Key of the repository physically holding this one's items
    pub fn physical_key(&self) -> Option<&str> {
        match self {
            RepositoryHandle::Local { key } | RepositoryHandle::Cache { key, .. } => Some(key),
            RepositoryHandle::Remote { cache, .. } => cache.as_deref(),
            RepositoryHandle::Virtual { .. } => None,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, RepositoryHandle::Virtual { .. })
    }
}

#[derive(Debug, Clone)]
struct RemoteEntry {
    url: String,
    store_locally: bool,
}

#[derive(Debug, Clone)]
struct VirtualEntry {
    members: Vec<String>,
    default_deployment: Option<String>,
}

/// Immutable view of the topology
#[derive(Debug, Default)]
pub struct TopologySnapshot {
    locals: IndexSet<String>,
    remotes: IndexMap<String, RemoteEntry>,
    virtuals: IndexMap<String, VirtualEntry>,
    descriptors: Vec<RepoDescriptor>,
}

impl TopologySnapshot {
    /// Partition descriptors, rejecting duplicate keys and unknown members
    pub fn build(descriptors: Vec<RepoDescriptor>) -> Result<Self> {
        let mut snapshot = TopologySnapshot::default();
        let mut seen = IndexSet::new();
        let mut claim = |key: String| -> Result<()> {
            if seen.insert(key.clone()) {
                Ok(())
            } else {
                Err(RepoError::DuplicateKey { key })
            }
        };

        for descriptor in &descriptors {
            claim(descriptor.key.clone())?;
            match &descriptor.kind {
                RepoKind::Local => {
                    snapshot.locals.insert(descriptor.key.clone());
                }
                RepoKind::Remote {
                    url,
                    store_artifacts_locally,
                } => {
                    if *store_artifacts_locally
                        && let Some(cache_key) = descriptor.cache_key()
                    {
                        claim(cache_key)?;
                    }
                    snapshot.remotes.insert(
                        descriptor.key.clone(),
                        RemoteEntry {
                            url: url.clone(),
                            store_locally: *store_artifacts_locally,
                        },
                    );
                }
                RepoKind::Virtual {
                    repositories,
                    default_deployment_repo,
                } => {
                    snapshot.virtuals.insert(
                        descriptor.key.clone(),
                        VirtualEntry {
                            members: repositories.clone(),
                            default_deployment: default_deployment_repo.clone(),
                        },
                    );
                }
            }
        }

        for (virtual_key, entry) in &snapshot.virtuals {
            let unknown = entry
                .members
                .iter()
                .chain(entry.default_deployment.iter())
                .find(|member| snapshot.classify(member).is_none());
            if let Some(member) = unknown {
                return Err(RepoError::UnknownMember {
                    virtual_key: virtual_key.clone(),
                    member: member.clone(),
                });
            }
        }

        snapshot.descriptors = descriptors;
        Ok(snapshot)
    }

    /// Classify a key; `None` for unknown keys
    pub fn classify(&self, key: &str) -> Option<RepositoryHandle> {
        if let Some(entry) = self.virtuals.get(key) {
            return Some(RepositoryHandle::Virtual {
                key: key.to_string(),
                members: entry.members.clone(),
                default_deployment: entry.default_deployment.clone(),
            });
        }
        if let Some(entry) = self.remotes.get(key) {
            return Some(RepositoryHandle::Remote {
                key: key.to_string(),
                url: entry.url.clone(),
                cache: entry
                    .store_locally
                    .then(|| format!("{}{}", key, CACHE_SUFFIX)),
            });
        }
        self.resolve_cache_or_local(key)
    }

    /// Physical repository for `key`: a local, or the cache of a remote
    ///
    /// Accepts a cache key (`<remote>-cache`) or the bare key of a remote.
    /// Remotes that do not store artifacts locally have no cache.
    pub fn resolve_cache_or_local(&self, key: &str) -> Option<RepositoryHandle> {
        if self.locals.contains(key) {
            return Some(RepositoryHandle::Local {
                key: key.to_string(),
            });
        }

        let (remote_key, cache_key) = match key.strip_suffix(CACHE_SUFFIX) {
            Some(remote) if self.remotes.contains_key(remote) => {
                (remote.to_string(), key.to_string())
            }
            _ => (key.to_string(), format!("{}{}", key, CACHE_SUFFIX)),
        };
        match self.remotes.get(&remote_key) {
            Some(entry) if entry.store_locally => Some(RepositoryHandle::Cache {
                key: cache_key,
                remote: remote_key,
            }),
            _ => None,
        }
    }

    pub fn is_local(&self, key: &str) -> bool {
        self.locals.contains(key)
    }

    pub fn is_remote(&self, key: &str) -> bool {
        self.remotes.contains_key(key)
    }

    pub fn is_virtual(&self, key: &str) -> bool {
        self.virtuals.contains_key(key)
    }

    pub fn remote_url(&self, key: &str) -> Option<&str> {
        self.remotes.get(key).map(|r| r.url.as_str())
    }

    /// Ordered members of a virtual repository
    pub fn members(&self, virtual_key: &str) -> Option<&[String]> {
        self.virtuals.get(virtual_key).map(|v| v.members.as_slice())
    }

    /// Every configured key, in configuration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|d| d.key.as_str())
    }

    pub fn descriptors(&self) -> &[RepoDescriptor] {
        &self.descriptors
    }
}

/// Shared, reloadable topology
#[derive(Debug)]
pub struct RepositoryTopology {
    current: RwLock<Arc<TopologySnapshot>>,
}

impl RepositoryTopology {
    pub fn new(descriptors: Vec<RepoDescriptor>) -> Result<Self> {
        Ok(Self {
            current: RwLock::new(Arc::new(TopologySnapshot::build(descriptors)?)),
        })
    }

    /// Consistent view for the duration of one request
    pub fn snapshot(&self) -> Arc<TopologySnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Replace the whole topology; the old one stays in place on error
    pub fn reload(&self, descriptors: Vec<RepoDescriptor>) -> Result<()> {
        let next = Arc::new(TopologySnapshot::build(descriptors)?);
        let count = next.descriptors.len();
        *self.current.write() = next;
        tracing::debug!(repositories = count, "topology reloaded");
        Ok(())
    }

    pub fn classify(&self, key: &str) -> Option<RepositoryHandle> {
        self.snapshot().classify(key)
    }

    pub fn resolve_cache_or_local(&self, key: &str) -> Option<RepositoryHandle> {
        self.snapshot().resolve_cache_or_local(key)
    }
}

impl RepoClassifier for RepositoryTopology {
    fn is_remote_or_cache(&self, repo_key: &str) -> bool {
        matches!(
            self.classify(repo_key),
            Some(RepositoryHandle::Remote { .. } | RepositoryHandle::Cache { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors() -> Vec<RepoDescriptor> {
        vec![
            RepoDescriptor::local("libs-release"),
            RepoDescriptor::remote("libs-remote", "https://repo.example.com"),
            RepoDescriptor::remote("plain", "https://plain.example.com").without_local_cache(),
            RepoDescriptor::virtual_repo("libs", ["libs-release", "libs-remote-cache"]),
        ]
    }

    #[test]
    fn test_classify_variants() {
        let topology = RepositoryTopology::new(descriptors()).unwrap();
        assert_eq!(topology.classify("libs-release").unwrap().kind_name(), "local");
        assert_eq!(
            topology.classify("libs-remote-cache"),
            Some(RepositoryHandle::Cache {
                key: "libs-remote-cache".to_string(),
                remote: "libs-remote".to_string(),
            })
        );
        let remote = topology.classify("libs-remote").unwrap();
        assert_eq!(remote.physical_key(), Some("libs-remote-cache"));
        assert!(topology.classify("libs").unwrap().is_virtual());
        assert_eq!(topology.classify("nope"), None);
        assert_eq!(topology.classify("plain-cache"), None);
        assert_eq!(topology.classify("plain").unwrap().physical_key(), None);
    }

    #[test]
    fn test_resolve_cache_or_local() {
        let snapshot = TopologySnapshot::build(descriptors()).unwrap();
        assert!(matches!(
            snapshot.resolve_cache_or_local("libs-release"),
            Some(RepositoryHandle::Local { .. })
        ));
        // bare remote key resolves to its cache
        assert_eq!(
            snapshot
                .resolve_cache_or_local("libs-remote")
                .map(|h| h.key().to_string()),
            Some("libs-remote-cache".to_string())
        );
        assert_eq!(snapshot.resolve_cache_or_local("plain"), None);
        assert_eq!(snapshot.resolve_cache_or_local("libs"), None);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let err = TopologySnapshot::build(vec![
            RepoDescriptor::local("a"),
            RepoDescriptor::local("a"),
        ])
        .unwrap_err();
        assert!(matches!(err, RepoError::DuplicateKey { key } if key == "a"));

        let clash = TopologySnapshot::build(vec![
            RepoDescriptor::remote("r", "https://r.example.com"),
            RepoDescriptor::local("r-cache"),
        ]);
        assert!(matches!(clash, Err(RepoError::DuplicateKey { .. })));
    }

    #[test]
    fn test_unknown_member_rejected() {
        let err = TopologySnapshot::build(vec![RepoDescriptor::virtual_repo("v", ["ghost"])])
            .unwrap_err();
        assert!(matches!(err, RepoError::UnknownMember { member, .. } if member == "ghost"));
    }

    #[test]
    fn test_configuration_order_preserved() {
        let snapshot = TopologySnapshot::build(descriptors()).unwrap();
        let keys: Vec<&str> = snapshot.keys().collect();
        assert_eq!(keys, vec!["libs-release", "libs-remote", "plain", "libs"]);
    }

    #[test]
    fn test_reload_swaps_wholesale() {
        let topology = RepositoryTopology::new(descriptors()).unwrap();
        let before = topology.snapshot();

        assert!(topology.reload(vec![RepoDescriptor::local("a"), RepoDescriptor::local("a")]).is_err());
        assert!(topology.classify("libs").is_some());

        topology.reload(vec![RepoDescriptor::local("only")]).unwrap();
        assert!(topology.classify("libs").is_none());
        assert!(topology.classify("only").is_some());
        // Earlier snapshots are unaffected
        assert!(before.classify("libs").is_some());
    }

    #[test]
    fn test_any_remote_classifier() {
        let topology = RepositoryTopology::new(descriptors()).unwrap();
        assert!(topology.is_remote_or_cache("libs-remote"));
        assert!(topology.is_remote_or_cache("libs-remote-cache"));
        assert!(!topology.is_remote_or_cache("libs-release"));
        assert!(!topology.is_remote_or_cache("libs"));
    }
}
