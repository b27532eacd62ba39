//! Configuration documents
//!
//! Repository configuration lives in `~/.config/depot/repositories.yaml`,
//! engine tuning in `~/.config/depot/engine.yaml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::descriptor::RepoDescriptor;
use crate::error::{CoreError, Result};

/// Directory holding depot configuration files
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| CoreError::InvalidConfig {
        message: "Could not determine config directory".to_string(),
    })?;
    Ok(config_dir.join("depot"))
}

fn load_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

fn save_yaml<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_yaml::to_string(value)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Repository configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Configured repositories, in configuration order
    #[serde(default)]
    pub repositories: Vec<RepoDescriptor>,
}

fn default_api_version() -> String {
    "depot.io/v1".to_string()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            repositories: Vec::new(),
        }
    }
}

impl RepositoryConfig {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        load_yaml(path)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        save_yaml(self, path)
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("repositories.yaml"))
    }

    /// Get a repository by key
    pub fn get(&self, key: &str) -> Option<&RepoDescriptor> {
        self.repositories.iter().find(|r| r.key == key)
    }

    /// Add a repository
    pub fn add(&mut self, repo: RepoDescriptor) -> Result<()> {
        if self.get(&repo.key).is_some() {
            return Err(CoreError::InvalidConfig {
                message: format!("Repository already exists: {}", repo.key),
            });
        }
        self.repositories.push(repo);
        Ok(())
    }

    /// Remove a repository by key
    pub fn remove(&mut self, key: &str) -> Result<RepoDescriptor> {
        let idx = self
            .repositories
            .iter()
            .position(|r| r.key == key)
            .ok_or_else(|| CoreError::InvalidConfig {
                message: format!("Repository not found: {}", key),
            })?;
        Ok(self.repositories.remove(idx))
    }

    /// List all repository keys
    pub fn keys(&self) -> Vec<&str> {
        self.repositories.iter().map(|r| r.key.as_str()).collect()
    }
}

/// What `SessionPool::borrow` does when every session is in use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustedPolicy {
    /// Wait up to `borrow_timeout` for a session to come back
    #[default]
    Block,
    /// Fail immediately
    Fail,
}

/// Session pool tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    #[serde(default)]
    pub on_exhausted: ExhaustedPolicy,

    #[serde(default = "default_borrow_timeout", with = "humantime_serde")]
    pub borrow_timeout: Duration,
}

fn default_max_sessions() -> usize {
    16
}

fn default_borrow_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            on_exhausted: ExhaustedPolicy::default(),
            borrow_timeout: default_borrow_timeout(),
        }
    }
}

/// Path lock tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockConfig {
    #[serde(default = "default_acquire_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: default_acquire_timeout(),
        }
    }
}

/// Folder deletion behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteConfig {
    /// Delete a whole tree in one commit instead of committing after every child
    #[serde(default)]
    pub single_transaction: bool,
}

/// Engine configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub locks: LockConfig,

    #[serde(default)]
    pub delete: DeleteConfig,
}

impl EngineConfig {
    /// Load from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Self = load_yaml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        save_yaml(self, path)
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("engine.yaml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool.max_sessions == 0 {
            return Err(CoreError::InvalidConfig {
                message: "pool.maxSessions must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
