//! Repository descriptors
//!
//! A descriptor is the configuration-side description of one repository:
//! its key and which variant it is. The topology is built from a list of
//! descriptors.

use serde::{Deserialize, Serialize};

/// Suffix of the cache repository attached to a remote repository
pub const CACHE_SUFFIX: &str = "-cache";

/// Sentinel repo key matching every repository in a permission target
pub const ANY_REPO: &str = "ANY";

/// Sentinel repo key matching every remote repository (and its cache)
pub const ANY_REMOTE_REPO: &str = "ANY REMOTE";

/// One configured repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoDescriptor {
    /// Unique repository key
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub kind: RepoKind,
}

/// Repository variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RepoKind {
    /// Owns physical items
    Local,

    /// Proxies an upstream URL, optionally caching into `<key>-cache`
    Remote {
        url: String,
        #[serde(default = "default_true", rename = "storeArtifactsLocally")]
        store_artifacts_locally: bool,
    },

    /// Ordered aggregation of other repositories
    Virtual {
        #[serde(default)]
        repositories: Vec<String>,
        #[serde(default, rename = "defaultDeploymentRepo")]
        default_deployment_repo: Option<String>,
    },
}

fn default_true() -> bool {
    true
}

impl RepoDescriptor {
    pub fn local(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: None,
            kind: RepoKind::Local,
        }
    }

    pub fn remote(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: None,
            kind: RepoKind::Remote {
                url: url.into(),
                store_artifacts_locally: true,
            },
        }
    }

    pub fn virtual_repo<I, S>(key: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            description: None,
            kind: RepoKind::Virtual {
                repositories: members.into_iter().map(Into::into).collect(),
                default_deployment_repo: None,
            },
        }
    }

    /// Builder-style toggle for remote repositories
    pub fn without_local_cache(mut self) -> Self {
        if let RepoKind::Remote {
            store_artifacts_locally,
            ..
        } = &mut self.kind
        {
            *store_artifacts_locally = false;
        }
        self
    }

    /// Builder-style default deployment target for virtual repositories
    pub fn with_default_deployment(mut self, target: impl Into<String>) -> Self {
        if let RepoKind::Virtual {
            default_deployment_repo,
            ..
        } = &mut self.kind
        {
            *default_deployment_repo = Some(target.into());
        }
        self
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            RepoKind::Local => "local",
            RepoKind::Remote { .. } => "remote",
            RepoKind::Virtual { .. } => "virtual",
        }
    }

    /// Key of the cache attached to a remote repository
    pub fn cache_key(&self) -> Option<String> {
        match self.kind {
            RepoKind::Remote { .. } => Some(format!("{}{}", self.key, CACHE_SUFFIX)),
            _ => None,
        }
    }
}
