//! SQLite-backed tree store
//!
//! Features:
//! - WAL mode so readers never block the single writer
//! - One connection per session, writes under `BEGIN IMMEDIATE`
//! - Auto-recovery when the database file is corrupted

use chrono::{DateTime, Utc};
use depot_core::RepoPath;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{NodeTable, StoreConnection, TreeStore, apply_mutations, parent_of};
use crate::error::Result;
use crate::item::{ItemInfo, Mutation};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS nodes (
        repo_key TEXT NOT NULL,
        path TEXT NOT NULL,
        parent TEXT NOT NULL,
        name TEXT NOT NULL,
        folder INTEGER NOT NULL,
        size INTEGER NOT NULL DEFAULT 0,
        sha256 TEXT,
        created INTEGER NOT NULL,
        PRIMARY KEY (repo_key, path)
    );

    CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(repo_key, parent, name);
"#;

/// SQLite tree store shared by every pooled session
pub struct SqliteTreeStore {
    path: PathBuf,
}

impl SqliteTreeStore {
    /// Open or create the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(depot_core::CoreError::from)?;
        }

        if let Err(e) = Self::init(path) {
            // If corrupted, delete and recreate
            tracing::warn!("Tree store corrupted, recreating: {}", e);
            if path.exists() {
                std::fs::remove_file(path).map_err(depot_core::CoreError::from)?;
            }
            Self::init(path)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init(path: &Path) -> Result<()> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }
}

impl TreeStore for SqliteTreeStore {
    fn connect(&self) -> Result<Box<dyn StoreConnection>> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Box::new(SqliteConnection { conn }))
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

struct SqliteConnection {
    conn: Connection,
}

fn row_to_item(repo_key: &str, row: &Row<'_>) -> rusqlite::Result<ItemInfo> {
    let path: String = row.get(0)?;
    let folder: bool = row.get(1)?;
    let size: i64 = row.get(2)?;
    let sha256: Option<String> = row.get(3)?;
    let created: i64 = row.get(4)?;

    let repo_path = RepoPath::new(repo_key, &path).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ItemInfo {
        repo_path,
        folder,
        size: size.max(0) as u64,
        sha256,
        created: DateTime::<Utc>::from_timestamp_millis(created).unwrap_or_default(),
    })
}

fn get_node(conn: &Connection, path: &RepoPath) -> Result<Option<ItemInfo>> {
    let mut stmt = conn.prepare_cached(
        "SELECT path, folder, size, sha256, created FROM nodes WHERE repo_key = ?1 AND path = ?2",
    )?;
    let item = stmt
        .query_row(params![path.repo_key(), path.path()], |row| {
            row_to_item(path.repo_key(), row)
        })
        .optional()?;
    Ok(item)
}

struct SqlTable<'a> {
    conn: &'a Connection,
}

impl NodeTable for SqlTable<'_> {
    fn get(&self, path: &RepoPath) -> Result<Option<ItemInfo>> {
        get_node(self.conn, path)
    }

    fn put(&mut self, item: ItemInfo) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO nodes (repo_key, path, parent, name, folder, size, sha256, created)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                item.repo_path.repo_key(),
                item.repo_path.path(),
                parent_of(&item.repo_path),
                item.repo_path.name(),
                item.folder,
                item.size as i64,
                item.sha256,
                item.created.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn remove_tree(&mut self, path: &RepoPath) -> Result<usize> {
        let removed = if path.is_root() {
            self.conn
                .execute("DELETE FROM nodes WHERE repo_key = ?1", [path.repo_key()])?
        } else {
            self.conn.execute(
                r#"
                DELETE FROM nodes
                WHERE repo_key = ?1
                  AND (path = ?2 OR substr(path, 1, length(?2) + 1) = ?2 || '/')
                "#,
                params![path.repo_key(), path.path()],
            )?
        };
        Ok(removed)
    }
}

impl StoreConnection for SqliteConnection {
    fn item(&self, path: &RepoPath) -> Result<Option<ItemInfo>> {
        if path.is_root() {
            return Ok(Some(ItemInfo::repo_root(path.repo_key())));
        }
        get_node(&self.conn, path)
    }

    fn children(&self, folder: &RepoPath) -> Result<Vec<ItemInfo>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT path, folder, size, sha256, created FROM nodes
            WHERE repo_key = ?1 AND parent = ?2
            ORDER BY name
            "#,
        )?;
        let items = stmt
            .query_map(params![folder.repo_key(), folder.path()], |row| {
                row_to_item(folder.repo_key(), row)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn commit(&mut self, mutations: &[Mutation]) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        apply_mutations(&mut SqlTable { conn: &tx }, mutations, Utc::now())?;
        tx.commit()?;
        Ok(())
    }
}
