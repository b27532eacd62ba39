//! Depot Core - shared types for the Depot artifact repository engine
//!
//! This crate provides the foundational types used throughout Depot:
//! - `RepoPath`: `(repo key, relative path)` addressing
//! - `Permission` / `PermissionMask`: grantable permissions
//! - `RepoDescriptor`: configuration-side description of a repository
//! - `PathMatcher`: include/exclude glob matching
//! - `RepositoryConfig` / `EngineConfig`: YAML configuration documents

pub mod config;
pub mod descriptor;
pub mod error;
pub mod matcher;
pub mod path;
pub mod permission;

pub use config::{
    DeleteConfig, EngineConfig, ExhaustedPolicy, LockConfig, PoolConfig, RepositoryConfig,
};
pub use descriptor::{ANY_REMOTE_REPO, ANY_REPO, CACHE_SUFFIX, RepoDescriptor, RepoKind};
pub use error::{CoreError, Result};
pub use matcher::{ANY_PATH, PathMatcher};
pub use path::RepoPath;
pub use permission::{Permission, PermissionMask};
