//! Permission targets, Acls and their entries

use depot_core::{ANY_PATH, PathMatcher, PermissionMask};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AclError, Result};
use crate::principal::Principal;

/// Principal identity an Ace grants to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sid {
    User(String),
    Group(String),
}

impl Sid {
    pub fn user(name: impl Into<String>) -> Self {
        Sid::User(name.into())
    }

    pub fn group(name: impl Into<String>) -> Self {
        Sid::Group(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Sid::User(name) | Sid::Group(name) => name,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Sid::Group(_))
    }

    /// True when this sid is the principal itself or one of its groups
    pub fn applies_to(&self, principal: &Principal) -> bool {
        match self {
            Sid::User(name) => *name == principal.username,
            Sid::Group(name) => principal.groups.contains(name),
        }
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sid::User(name) => write!(f, "user:{}", name),
            Sid::Group(name) => write!(f, "group:{}", name),
        }
    }
}

/// One access control entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ace {
    #[serde(flatten)]
    pub sid: Sid,
    pub permissions: PermissionMask,
}

impl Ace {
    pub fn new(sid: Sid, permissions: impl Into<PermissionMask>) -> Self {
        Self {
            sid,
            permissions: permissions.into(),
        }
    }
}

fn default_includes() -> Vec<String> {
    vec![ANY_PATH.to_string()]
}

/// Named set of repositories and path patterns an Acl applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionTarget {
    pub name: String,

    /// Repository keys, possibly the `ANY` / `ANY REMOTE` sentinels
    #[serde(default)]
    pub repo_keys: IndexSet<String>,

    #[serde(default = "default_includes")]
    pub includes: Vec<String>,

    #[serde(default)]
    pub excludes: Vec<String>,
}

impl PermissionTarget {
    pub fn new<I, S>(name: impl Into<String>, repo_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            repo_keys: repo_keys.into_iter().map(Into::into).collect(),
            includes: default_includes(),
            excludes: Vec::new(),
        }
    }

    pub fn with_includes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, includes: I) -> Self {
        self.includes = includes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_excludes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, excludes: I) -> Self {
        self.excludes = excludes.into_iter().map(Into::into).collect();
        self
    }

    /// Compile the include/exclude patterns
    pub fn matcher(&self) -> Result<PathMatcher> {
        PathMatcher::new(&self.includes, &self.excludes).map_err(|e| AclError::InvalidTarget {
            name: self.name.clone(),
            message: e.to_string(),
        })
    }
}

/// A permission target with the entries granted on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    pub target: PermissionTarget,
    #[serde(default)]
    pub aces: Vec<Ace>,
}

impl Acl {
    pub fn new(target: PermissionTarget) -> Self {
        Self {
            target,
            aces: Vec::new(),
        }
    }

    /// Builder-style grant, merged into an existing entry for the same sid
    pub fn grant(mut self, sid: Sid, permissions: impl Into<PermissionMask>) -> Self {
        self.set_ace(Ace::new(sid, permissions));
        self
    }

    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Add an entry; an existing entry for the same sid is widened
    pub fn set_ace(&mut self, ace: Ace) {
        match self.aces.iter_mut().find(|a| a.sid == ace.sid) {
            Some(existing) => existing.permissions |= ace.permissions,
            None => self.aces.push(ace),
        }
    }

    /// Union of the masks of every entry applying to the principal
    pub fn mask_for(&self, principal: &Principal) -> PermissionMask {
        self.aces
            .iter()
            .filter(|ace| ace.sid.applies_to(principal))
            .fold(PermissionMask::EMPTY, |mask, ace| mask | ace.permissions)
    }

    /// Drop every user entry for `username`; returns whether anything changed
    pub fn remove_user_aces(&mut self, username: &str) -> bool {
        let before = self.aces.len();
        self.aces
            .retain(|ace| !matches!(&ace.sid, Sid::User(name) if name == username));
        self.aces.len() != before
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.name.trim().is_empty() {
            return Err(AclError::InvalidTarget {
                name: self.target.name.clone(),
                message: "name must not be empty".to_string(),
            });
        }
        if self.target.repo_keys.is_empty() {
            return Err(AclError::InvalidTarget {
                name: self.target.name.clone(),
                message: "at least one repository key is required".to_string(),
            });
        }
        self.target.matcher().map(|_| ())
    }
}
