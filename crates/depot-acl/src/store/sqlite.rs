//! SQLite Acl store
//!
//! Each Acl is one row holding its JSON body, keyed by target name.

use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension, params};
use std::path::Path;
use std::time::Duration;

use super::AclStore;
use crate::error::{AclError, Result};
use crate::model::Acl;

pub struct SqliteAclStore {
    conn: Mutex<Connection>,
}

impl SqliteAclStore {
    /// Open or create the store; may share a file with the tree store
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(depot_core::CoreError::from)?;
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn)
    }

    /// Open in-memory store (for testing)
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS acls (
                name TEXT PRIMARY KEY NOT NULL,
                body TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl AclStore for SqliteAclStore {
    fn load_all(&self) -> Result<Vec<Acl>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT body FROM acls ORDER BY name")?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(AclError::from))
            .collect()
    }

    fn get(&self, name: &str) -> Result<Option<Acl>> {
        let conn = self.conn.lock();
        let body: Option<String> = conn
            .query_row("SELECT body FROM acls WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    fn insert(&self, acl: &Acl) -> Result<()> {
        let body = serde_json::to_string(acl)?;
        let conn = self.conn.lock();
        match conn.execute(
            "INSERT INTO acls (name, body) VALUES (?1, ?2)",
            params![acl.name(), body],
        ) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(AclError::AlreadyExists {
                    name: acl.name().to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM acls WHERE name = ?1", [name])?;
        Ok(removed > 0)
    }
}
