//! Depot ACL - access control for repository paths
//!
//! - `Acl` / `Ace` / `PermissionTarget`: what is granted, to whom, where
//! - `AclStore`: persistence (in-memory and SQLite)
//! - `AclCache`: whole-snapshot cache rebuilt lazily after writes
//! - `AclManager`: create / update / delete / revoke operations
//! - `AccessControlEngine`: four-level permission evaluation

pub mod cache;
pub mod engine;
pub mod error;
pub mod manager;
pub mod model;
pub mod principal;
pub mod store;

pub use cache::{AclCache, AclSnapshot, CachedAcl};
pub use engine::{AccessControlEngine, Decision, DecisionLevel, NoRemotes, RepoClassifier};
pub use error::{AclError, Result};
pub use manager::AclManager;
pub use model::{Ace, Acl, PermissionTarget, Sid};
pub use principal::{Principal, PrincipalResolver, UserDirectory, UserEntry};
pub use store::{AclStore, MemoryAclStore, SqliteAclStore};
