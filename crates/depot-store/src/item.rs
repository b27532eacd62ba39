//! Stored items and the mutations that change them

use chrono::{DateTime, Utc};
use depot_core::RepoPath;
use sha2::{Digest, Sha256};

/// A file or folder as seen by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfo {
    pub repo_path: RepoPath,
    pub folder: bool,
    /// Content length in bytes, 0 for folders
    pub size: u64,
    /// Hex encoded SHA-256 of the content, `None` for folders
    pub sha256: Option<String>,
    pub created: DateTime<Utc>,
}

impl ItemInfo {
    pub fn folder(repo_path: RepoPath, created: DateTime<Utc>) -> Self {
        Self {
            repo_path,
            folder: true,
            size: 0,
            sha256: None,
            created,
        }
    }

    pub fn file(repo_path: RepoPath, size: u64, sha256: String, created: DateTime<Utc>) -> Self {
        Self {
            repo_path,
            folder: false,
            size,
            sha256: Some(sha256),
            created,
        }
    }

    /// Every repository root exists as an empty folder
    pub fn repo_root(repo_key: &str) -> Self {
        Self::folder(RepoPath::root(repo_key), DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn name(&self) -> &str {
        self.repo_path.name()
    }
}

/// A staged change, applied to the store on commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Create a folder; missing parents are created as well
    CreateFolder(RepoPath),

    /// Create or overwrite a file; missing parents are created as well
    PutFile {
        path: RepoPath,
        size: u64,
        sha256: String,
    },

    /// Remove a file or a whole folder tree
    Delete(RepoPath),
}

impl Mutation {
    /// Stage a file write with the checksum computed from `content`
    pub fn put_bytes(path: RepoPath, content: &[u8]) -> Self {
        Mutation::PutFile {
            path,
            size: content.len() as u64,
            sha256: sha256_hex(content),
        }
    }

    pub fn path(&self) -> &RepoPath {
        match self {
            Mutation::CreateFolder(p) | Mutation::Delete(p) => p,
            Mutation::PutFile { path, .. } => path,
        }
    }
}

/// Hex encoded SHA-256 digest
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}
