//! CLI error types with exit code handling
//!
//! Library errors are folded into a handful of categories, each with its own
//! exit code.

use depot_acl::AclError;
use depot_core::CoreError;
use depot_repo::RepoError;
use depot_store::StoreError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Invalid user input
    #[error("Invalid input: {message}")]
    #[diagnostic(code(depot::cli::input))]
    Input {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Repository, item or Acl does not exist (or is not visible)
    #[error("Not found: {message}")]
    #[diagnostic(code(depot::cli::not_found))]
    NotFound { message: String },

    /// Permission denied
    #[error("Forbidden: {message}")]
    #[diagnostic(code(depot::cli::forbidden))]
    Forbidden {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Concurrent modification or busy resource
    #[error("Conflict: {message}")]
    #[diagnostic(code(depot::cli::conflict), help("Retry the operation"))]
    Conflict { message: String },

    /// Broken configuration file
    #[error("Configuration error: {message}")]
    #[diagnostic(code(depot::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(depot::cli::io))]
    Io { message: String },

    /// Internal error (store failure, unexpected state)
    #[error("Internal error: {message}")]
    #[diagnostic(code(depot::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Input { .. } => exit_codes::INPUT_ERROR,
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Forbidden { .. } => exit_codes::FORBIDDEN,
            CliError::Conflict { .. } => exit_codes::CONFLICT,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: None,
        }
    }

    pub fn input_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            help: None,
        }
    }

    pub fn forbidden_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::InvalidRepoPath { .. }
            | CoreError::GlobPattern { .. }
            | CoreError::UnknownPermission { .. } => CliError::input(message),
            CoreError::InvalidConfig { .. } | CoreError::Yaml(_) => CliError::Config {
                message,
                help: Some("Check repositories.yaml, engine.yaml and users.yaml".to_string()),
            },
            CoreError::Io(_) => CliError::Io { message },
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        if err.is_conflict() || err.is_timeout() {
            return CliError::conflict(err.to_string());
        }
        match err {
            StoreError::NotAFolder { .. } | StoreError::RootNotAllowed { .. } => {
                CliError::input(err.to_string())
            }
            StoreError::Core(core) => core.into(),
            other => CliError::internal(other.to_string()),
        }
    }
}

impl From<AclError> for CliError {
    fn from(err: AclError) -> Self {
        match err {
            AclError::AlreadyExists { .. } => CliError::conflict(err.to_string()),
            AclError::NotFound { .. } => CliError::not_found(err.to_string()),
            AclError::InvalidTarget { .. } => CliError::input(err.to_string()),
            AclError::Core(core) => core.into(),
            other => CliError::internal(other.to_string()),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::DuplicateKey { .. } | RepoError::UnknownMember { .. } => {
                CliError::config(err.to_string())
            }
            RepoError::NotPhysical { .. } | RepoError::NotDeployable { .. } => {
                CliError::input(err.to_string())
            }
            RepoError::Store(store) => store.into(),
            RepoError::Acl(acl) => acl.into(),
            RepoError::Core(core) => core.into(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::internal(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::input(err.to_string())
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
