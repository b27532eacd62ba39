//! Depot Store - transactional access to repository trees
//!
//! This crate provides:
//! - `TreeStore` backends (in-memory and SQLite) holding committed items
//! - `ContentSession`: staged writes, overlay reads and a resource registry
//! - `SessionPool`: bounded reuse of sessions across concurrent requests
//! - `LockCoordinator`: hierarchical, reentrant path locks
//! - `TransactionManager`: commit hooks binding a session to a unit of work
//! - `delete_tree`: recursive folder deletion

pub mod delete;
pub mod error;
pub mod item;
pub mod lock;
pub mod pool;
pub mod registry;
pub mod session;
pub mod store;
pub mod transaction;

pub use delete::{DeleteMode, DeleteReport, delete_tree};
pub use error::{Result, StoreError};
pub use item::{ItemInfo, Mutation, sha256_hex};
pub use lock::{LockCoordinator, LockHandle};
pub use pool::{PoolStats, SessionPool};
pub use registry::{DeferredAction, ResourceRegistry};
pub use session::{ContentSession, SessionId};
pub use store::{MemoryTreeStore, OperationCounts, SqliteTreeStore, StoreConnection, TreeStore};
pub use transaction::{Transaction, TransactionManager, TxMode};
