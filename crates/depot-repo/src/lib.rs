//! Depot Repo - repository topology and request resolution
//!
//! - `RepositoryTopology`: classified, reloadable map of configured repositories
//! - `VirtualResolver`: member-graph flattening with cycle guard and merged listings
//! - `ResolutionService`: classify, resolve, access-check and mutate in one session

pub mod error;
pub mod resolver;
pub mod service;
pub mod topology;

pub use error::{RepoError, Result};
pub use resolver::{AggregatedItem, FlattenedVirtual, VirtualResolver, aggregate, flatten};
pub use service::{MutationOutcome, ResolutionService, ResolvedItem};
pub use topology::{RepositoryHandle, RepositoryTopology, TopologySnapshot};
