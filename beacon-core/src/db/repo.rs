//! Database repository layer
//!
//! SQLite implementation of [`PreferenceBackend`]: one row per
//! `(namespace, key)` in the `preferences` table.

use super::backend::{PreferenceBackend, PreferenceWrite};
use super::schema::{self, SCHEMA_VERSION};
use crate::error::{Error, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Database handle (single shared connection)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;

        // Queue writes must be on disk once commit returns
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        schema::run_migrations(&conn)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// List every key stored in a namespace, sorted
    pub fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT key FROM preferences WHERE namespace = ? ORDER BY key")?;
        let keys = stmt
            .query_map([namespace], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }
}

impl PreferenceBackend for Database {
    fn ensure_ready(&self) -> Result<()> {
        let conn = self.conn();
        let version = schema::get_schema_version(&conn)?;
        if version != SCHEMA_VERSION {
            return Err(Error::Storage(format!(
                "database schema is at version {} but {} is required; run migrate() first",
                version, SCHEMA_VERSION
            )));
        }
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT value FROM preferences WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    fn commit(&self, namespace: &str, writes: &[PreferenceWrite]) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        for write in writes {
            match write {
                PreferenceWrite::Put { key, value } => {
                    tx.execute(
                        r#"
                        INSERT INTO preferences (namespace, key, value, updated_at)
                        VALUES (?1, ?2, ?3, ?4)
                        ON CONFLICT(namespace, key) DO UPDATE SET
                            value = excluded.value,
                            updated_at = excluded.updated_at
                        "#,
                        params![namespace, key, value, now],
                    )?;
                }
                PreferenceWrite::Remove { key } => {
                    tx.execute(
                        "DELETE FROM preferences WHERE namespace = ?1 AND key = ?2",
                        params![namespace, key],
                    )?;
                }
            }
        }

        tx.commit()?;
        tracing::trace!(namespace, writes = writes.len(), "Committed preference writes");
        Ok(())
    }
}
