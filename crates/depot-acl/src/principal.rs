//! Principals and the user directory resolving them

use depot_core::CoreError;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// The identity an access check is evaluated for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub groups: IndexSet<String>,
    /// Administrators bypass evaluation
    pub admin: bool,
}

impl Principal {
    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            groups: IndexSet::new(),
            admin: false,
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn as_admin(mut self) -> Self {
        self.admin = true;
        self
    }
}

/// Supplies the groups and role of a username
pub trait PrincipalResolver: Send + Sync {
    fn resolve(&self, username: &str) -> Option<Principal>;

    /// Resolve, treating unknown users as group-less principals
    fn resolve_or_anonymous(&self, username: &str) -> Principal {
        self.resolve(username)
            .unwrap_or_else(|| Principal::user(username))
    }
}

/// One entry of `users.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub admin: bool,
}

/// Static user directory loaded from `users.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDirectory {
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

impl UserDirectory {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(CoreError::from)?;
        Ok(serde_yaml::from_str(&content).map_err(CoreError::from)?)
    }

    /// Load when the file exists, otherwise an empty directory
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(CoreError::from)?;
        }
        let content = serde_yaml::to_string(self).map_err(CoreError::from)?;
        std::fs::write(path, content).map_err(CoreError::from)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(depot_core::config::config_dir()?.join("users.yaml"))
    }
}

impl PrincipalResolver for UserDirectory {
    fn resolve(&self, username: &str) -> Option<Principal> {
        self.users
            .iter()
            .find(|u| u.name == username)
            .map(|u| Principal {
                username: u.name.clone(),
                groups: u.groups.iter().cloned().collect(),
                admin: u.admin,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_resolves_groups() {
        let yaml = r#"
users:
  - name: bob
    groups: [readers, deployers]
  - name: root
    admin: true
"#;
        let dir: UserDirectory = serde_yaml::from_str(yaml).unwrap();
        let bob = dir.resolve("bob").unwrap();
        assert!(bob.groups.contains("readers"));
        assert!(!bob.admin);
        assert!(dir.resolve("root").unwrap().admin);
        assert!(dir.resolve("eve").is_none());

        let eve = dir.resolve_or_anonymous("eve");
        assert_eq!(eve, Principal::user("eve"));
    }

    #[test]
    fn test_directory_file_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("users.yaml");
        assert!(UserDirectory::load_or_default(&path).unwrap().users.is_empty());

        let dir = UserDirectory {
            users: vec![UserEntry {
                name: "bob".to_string(),
                groups: vec!["readers".to_string()],
                admin: false,
            }],
        };
        dir.save_to(&path).unwrap();
        assert_eq!(UserDirectory::load_from(&path).unwrap(), dir);
    }
}
