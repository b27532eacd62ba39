//! Wiring of configuration, stores and services for one CLI invocation

use depot_acl::{
    AccessControlEngine, AclCache, AclManager, AclStore, Principal, PrincipalResolver,
    SqliteAclStore, UserDirectory,
};
use depot_core::{EngineConfig, RepositoryConfig};
use depot_repo::{RepositoryTopology, ResolutionService};
use depot_store::{DeleteMode, LockCoordinator, SessionPool, SqliteTreeStore, TransactionManager};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CliError, Result};

const DATABASE_FILE: &str = "depot.db";

/// Where configuration and state live
#[derive(Debug, Clone)]
pub struct Locations {
    pub config_dir: PathBuf,
    pub database: PathBuf,
}

impl Locations {
    /// An explicit config directory also holds the database
    pub fn resolve(config_dir: Option<&Path>) -> Result<Self> {
        match config_dir {
            Some(dir) => Ok(Self {
                config_dir: dir.to_path_buf(),
                database: dir.join(DATABASE_FILE),
            }),
            None => {
                let data_dir = dirs::data_dir()
                    .ok_or_else(|| CliError::config("Could not determine data directory"))?;
                Ok(Self {
                    config_dir: depot_core::config::config_dir()?,
                    database: data_dir.join("depot").join(DATABASE_FILE),
                })
            }
        }
    }

    pub fn repositories_file(&self) -> PathBuf {
        self.config_dir.join("repositories.yaml")
    }

    pub fn engine_file(&self) -> PathBuf {
        self.config_dir.join("engine.yaml")
    }

    pub fn users_file(&self) -> PathBuf {
        self.config_dir.join("users.yaml")
    }
}

fn load_or_default<T: Default>(
    path: &Path,
    load: impl FnOnce(&Path) -> depot_core::Result<T>,
) -> Result<T> {
    if path.exists() {
        Ok(load(path)?)
    } else {
        Ok(T::default())
    }
}

/// Everything a command needs
pub struct Depot {
    pub locations: Locations,
    pub service: ResolutionService,
    pub acls: AclManager,
    pub principal: Principal,
}

impl Depot {
    pub fn open(locations: Locations, username: &str) -> Result<Self> {
        let repositories =
            load_or_default(&locations.repositories_file(), RepositoryConfig::load_from)?;
        let engine = load_or_default(&locations.engine_file(), EngineConfig::load_from)?;
        let users = UserDirectory::load_or_default(&locations.users_file())?;
        let principal = users.resolve_or_anonymous(username);

        tracing::debug!(
            database = %locations.database.display(),
            repositories = repositories.repositories.len(),
            user = %principal.username,
            "opening depot"
        );

        let topology = Arc::new(RepositoryTopology::new(repositories.repositories)?);

        let store = Arc::new(SqliteTreeStore::open(&locations.database)?);
        let pool = SessionPool::new(store, Arc::new(LockCoordinator::new()), &engine);

        let acl_store: Arc<dyn AclStore> = Arc::new(SqliteAclStore::open(&locations.database)?);
        let cache = Arc::new(AclCache::new());
        let acls = AclManager::new(Arc::clone(&acl_store), Arc::clone(&cache));
        let engine_acl = AccessControlEngine::new(acl_store, cache, topology.clone());

        let service = ResolutionService::new(
            topology,
            TransactionManager::new(Arc::new(pool)),
            engine_acl,
            DeleteMode::from(&engine.delete),
        );

        Ok(Self {
            locations,
            service,
            acls,
            principal,
        })
    }

    /// Fail unless the current user is an administrator
    pub fn require_admin(&self, action: &str) -> Result<()> {
        if self.principal.admin {
            return Ok(());
        }
        Err(CliError::forbidden_with_help(
            format!("'{}' may not {}", self.principal.username, action),
            format!(
                "Mark the user as admin in {}",
                self.locations.users_file().display()
            ),
        ))
    }
}
