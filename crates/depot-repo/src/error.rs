//! Error types for topology and resolution

use thiserror::Error;

/// Topology and resolution errors
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Duplicate repository key: {key}")]
    DuplicateKey { key: String },

    #[error("Virtual repository '{virtual_key}' references unknown repository '{member}'")]
    UnknownMember { virtual_key: String, member: String },

    #[error("Repository '{key}' holds no items of its own")]
    NotPhysical { key: String },

    #[error("Repository '{key}' does not accept deployments")]
    NotDeployable { key: String },

    #[error(transparent)]
    Store(#[from] depot_store::StoreError),

    #[error(transparent)]
    Acl(#[from] depot_acl::AclError),

    #[error(transparent)]
    Core(#[from] depot_core::CoreError),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;
