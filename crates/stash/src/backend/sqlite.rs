//! SQLite engine: one `(key BLOB PRIMARY KEY, value BLOB)` table per dbname

use super::Backend;
use crate::config::Engine;
use rusqlite::{params, Connection, OptionalExtension};
use stash_core::{Error, Result};
use std::path::Path;
use std::time::Duration;

fn sqlite_error(operation: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| Error::backend("sqlite", operation, e)
}

pub struct SqliteBackend {
    conn: Connection,
    table: String,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open or create the database; `dbname` is validated as an identifier
    pub fn open(path: &Path, dbname: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(sqlite_error("open"))?;
        conn.busy_timeout(Duration::from_secs(10))
            .map_err(sqlite_error("configure"))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(sqlite_error("configure"))?;

        let table = format!("\"{dbname}\"");
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (key BLOB PRIMARY KEY, value BLOB NOT NULL)"
        ))
        .map_err(sqlite_error("create table"))?;

        Ok(Self { conn, table })
    }
}

impl Backend for SqliteBackend {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT value FROM {} WHERE key = ?1", self.table))
            .map_err(sqlite_error("get"))?;
        stmt.query_row(params![key], |row| row.get(0))
            .optional()
            .map_err(sqlite_error("get"))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!(
                "INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)",
                self.table
            ))
            .map_err(sqlite_error("set"))?;
        stmt.execute(params![key, value])
            .map_err(sqlite_error("set"))?;
        Ok(())
    }

    fn contains(&mut self, key: &[u8]) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT 1 FROM {} WHERE key = ?1", self.table))
            .map_err(sqlite_error("contains"))?;
        stmt.exists(params![key]).map_err(sqlite_error("contains"))
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                &format!("DELETE FROM {} WHERE key = ?1", self.table),
                params![key],
            )
            .map_err(sqlite_error("delete"))?;
        Ok(changed > 0)
    }

    fn len(&mut self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                row.get(0)
            })
            .map_err(sqlite_error("len"))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn keys(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT key FROM {}", self.table))
            .map_err(sqlite_error("keys"))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(sqlite_error("keys"))?;
        rows.collect::<rusqlite::Result<Vec<Vec<u8>>>>()
            .map_err(sqlite_error("keys"))
    }

    fn items(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT key, value FROM {}", self.table))
            .map_err(sqlite_error("items"))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(sqlite_error("items"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sqlite_error("items"))
    }

    fn clear(&mut self) -> Result<()> {
        self.conn
            .execute(&format!("DELETE FROM {}", self.table), [])
            .map_err(sqlite_error("clear"))?;
        Ok(())
    }
}
