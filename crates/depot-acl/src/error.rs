//! Error types for access control operations

use thiserror::Error;

/// Acl storage and mutation errors
#[derive(Debug, Error)]
pub enum AclError {
    #[error("Acl already exists for permission target: {name}")]
    AlreadyExists { name: String },

    #[error("No Acl for permission target: {name}")]
    NotFound { name: String },

    #[error("Invalid permission target '{name}': {message}")]
    InvalidTarget { name: String, message: String },

    #[error("Acl store error: {0}")]
    Backend(String),

    #[error("Acl serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Core(#[from] depot_core::CoreError),
}

/// Result type for Acl operations
pub type Result<T> = std::result::Result<T, AclError>;

impl From<rusqlite::Error> for AclError {
    fn from(e: rusqlite::Error) -> Self {
        AclError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for AclError {
    fn from(e: serde_json::Error) -> Self {
        AclError::Serialization(e.to_string())
    }
}
