//! Repository-relative item addressing
//!
//! A [`RepoPath`] is the pair `(repo_key, path)`. The path is slash separated,
//! relative, and the repository root is the empty string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Address of one item (file or folder) inside one repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoPath {
    repo_key: String,
    path: String,
}

impl RepoPath {
    /// Create a normalized repo path
    ///
    /// Leading and trailing slashes are stripped and repeated slashes are
    /// collapsed. `.` and `..` segments are rejected.
    pub fn new(repo_key: impl Into<String>, path: impl AsRef<str>) -> Result<Self> {
        let repo_key = repo_key.into();
        let raw = path.as_ref();

        if repo_key.is_empty() || repo_key.contains('/') || repo_key.contains(':') {
            return Err(CoreError::InvalidRepoPath {
                path: format!("{}:{}", repo_key, raw),
                reason: "repository key must be non-empty and contain no '/' or ':'".to_string(),
            });
        }

        let mut segments = Vec::new();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(CoreError::InvalidRepoPath {
                    path: format!("{}:{}", repo_key, raw),
                    reason: "relative segments are not allowed".to_string(),
                });
            }
            segments.push(segment);
        }

        Ok(Self {
            repo_key,
            path: segments.join("/"),
        })
    }

    /// Root of a repository
    pub fn root(repo_key: impl Into<String>) -> Self {
        Self {
            repo_key: repo_key.into(),
            path: String::new(),
        }
    }

    pub fn repo_key(&self) -> &str {
        &self.repo_key
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Last path segment (empty for the root)
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Parent path, `None` for the root
    pub fn parent(&self) -> Option<RepoPath> {
        if self.is_root() {
            return None;
        }
        let parent = match self.path.rfind('/') {
            Some(idx) => self.path[..idx].to_string(),
            None => String::new(),
        };
        Some(Self {
            repo_key: self.repo_key.clone(),
            path: parent,
        })
    }

    /// Direct child with the given name
    pub fn child(&self, name: &str) -> Result<RepoPath> {
        if self.is_root() {
            Self::new(self.repo_key.clone(), name)
        } else {
            Self::new(self.repo_key.clone(), format!("{}/{}", self.path, name))
        }
    }

    /// Same path in another repository
    pub fn with_repo(&self, repo_key: &str) -> RepoPath {
        Self {
            repo_key: repo_key.to_string(),
            path: self.path.clone(),
        }
    }

    /// All ancestors from the direct parent up to the root
    pub fn ancestors(&self) -> Vec<RepoPath> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(p) = current {
            current = p.parent();
            out.push(p);
        }
        out
    }

    /// True if `other` is this path or lies below it, in the same repository
    pub fn contains(&self, other: &RepoPath) -> bool {
        if self.repo_key != other.repo_key {
            return false;
        }
        self.is_root()
            || other.path == self.path
            || (other.path.len() > self.path.len()
                && other.path.starts_with(&self.path)
                && other.path.as_bytes()[self.path.len()] == b'/')
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repo_key, self.path)
    }
}

impl FromStr for RepoPath {
    type Err = CoreError;

    /// Parse `repo:path`, or a bare `repo` meaning its root
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((key, path)) => Self::new(key, path),
            None => Self::new(s, ""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let p = RepoPath::new("libs", "/a//b/c.txt/").unwrap();
        assert_eq!(p.path(), "a/b/c.txt");
        assert_eq!(p.name(), "c.txt");
        assert_eq!(p.to_string(), "libs:a/b/c.txt");
    }

    #[test]
    fn test_rejects_relative_segments() {
        assert!(RepoPath::new("libs", "a/../b").is_err());
        assert!(RepoPath::new("libs", "./a").is_err());
        assert!(RepoPath::new("", "a").is_err());
        assert!(RepoPath::new("a:b", "a").is_err());
    }

    #[test]
    fn test_parent_chain() {
        let p = RepoPath::new("libs", "a/b/c").unwrap();
        assert_eq!(p.parent().unwrap().path(), "a/b");
        let ancestors: Vec<_> = p.ancestors().iter().map(|a| a.path().to_string()).collect();
        assert_eq!(ancestors, vec!["a/b", "a", ""]);
        assert!(RepoPath::root("libs").parent().is_none());
    }

    #[test]
    fn test_contains() {
        let folder = RepoPath::new("libs", "a/b").unwrap();
        assert!(folder.contains(&RepoPath::new("libs", "a/b/c").unwrap()));
        assert!(folder.contains(&folder));
        assert!(!folder.contains(&RepoPath::new("libs", "a/bc").unwrap()));
        assert!(!folder.contains(&RepoPath::new("other", "a/b/c").unwrap()));
        assert!(RepoPath::root("libs").contains(&folder));
    }

    #[test]
    fn test_parse() {
        let p: RepoPath = "libs-release:org/acme/app.jar".parse().unwrap();
        assert_eq!(p.repo_key(), "libs-release");
        assert_eq!(p.path(), "org/acme/app.jar");

        let root: RepoPath = "libs-release".parse().unwrap();
        assert!(root.is_root());
    }

    #[test]
    fn test_child() {
        let root = RepoPath::root("libs");
        let a = root.child("a").unwrap();
        assert_eq!(a.path(), "a");
        assert_eq!(a.child("b").unwrap().path(), "a/b");
    }
}
