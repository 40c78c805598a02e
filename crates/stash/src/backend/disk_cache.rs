//! Embedded disk cache engine on redb, one table per dbname

use super::Backend;
use crate::config::Engine;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition, TableError};
use stash_core::{Error, Result};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

// redb holds an exclusive lock on the file, so handles are shared per path.
// Entries are weak so the lock is released with the last backend.
static DATABASES: Lazy<DashMap<PathBuf, Weak<Database>>> = Lazy::new(DashMap::new);

fn redb_error<E: Display>(operation: &'static str) -> impl Fn(E) -> Error {
    move |e| Error::backend("disk-cache", operation, e)
}

fn database(path: &Path) -> Result<Arc<Database>> {
    DATABASES.retain(|_, db| db.strong_count() > 0);

    let mut entry = DATABASES.entry(path.to_path_buf()).or_default();
    if let Some(db) = entry.upgrade() {
        return Ok(db);
    }
    let db = Arc::new(Database::create(path).map_err(redb_error("open"))?);
    *entry = Arc::downgrade(&db);
    Ok(db)
}

pub struct DiskCacheBackend {
    db: Arc<Database>,
    table: String,
}

impl std::fmt::Debug for DiskCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCacheBackend")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl DiskCacheBackend {
    pub fn open(path: &Path, dbname: &str) -> Result<Self> {
        Ok(Self {
            db: database(path)?,
            table: dbname.to_string(),
        })
    }

    fn definition(&self) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
        TableDefinition::new(&self.table)
    }

    /// Run a read against the table; a table never written to reads as empty
    fn read<T>(
        &self,
        operation: &'static str,
        empty: T,
        f: impl FnOnce(&redb::ReadOnlyTable<&'static [u8], &'static [u8]>) -> Result<T>,
    ) -> Result<T> {
        let rtxn = self.db.begin_read().map_err(redb_error(operation))?;
        match rtxn.open_table(self.definition()) {
            Ok(table) => f(&table),
            Err(TableError::TableDoesNotExist(_)) => Ok(empty),
            Err(e) => Err(redb_error(operation)(e)),
        }
    }
}

impl Backend for DiskCacheBackend {
    fn engine(&self) -> Engine {
        Engine::DiskCache
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.read("get", None, |table| {
            let value = table.get(key).map_err(redb_error("get"))?;
            Ok(value.map(|guard| guard.value().to_vec()))
        })
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let wtxn = self.db.begin_write().map_err(redb_error("set"))?;
        {
            let mut table = wtxn
                .open_table(self.definition())
                .map_err(redb_error("set"))?;
            table.insert(key, value).map_err(redb_error("set"))?;
        }
        wtxn.commit().map_err(redb_error("set"))
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let wtxn = self.db.begin_write().map_err(redb_error("delete"))?;
        let existed = {
            let mut table = wtxn
                .open_table(self.definition())
                .map_err(redb_error("delete"))?;
            let removed = table.remove(key).map_err(redb_error("delete"))?;
            removed.is_some()
        };
        wtxn.commit().map_err(redb_error("delete"))?;
        Ok(existed)
    }

    fn len(&mut self) -> Result<usize> {
        self.read("len", 0, |table| {
            let len = table.len().map_err(redb_error("len"))?;
            Ok(usize::try_from(len).unwrap_or(usize::MAX))
        })
    }

    fn keys(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(self.items()?.into_iter().map(|(k, _)| k).collect())
    }

    fn items(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.read("iterate", Vec::new(), |table| {
            let mut items = Vec::new();
            for entry in table.iter().map_err(redb_error("iterate"))? {
                let (key, value) = entry.map_err(redb_error("iterate"))?;
                items.push((key.value().to_vec(), value.value().to_vec()));
            }
            Ok(items)
        })
    }

    fn clear(&mut self) -> Result<()> {
        let wtxn = self.db.begin_write().map_err(redb_error("clear"))?;
        wtxn.delete_table(self.definition())
            .map_err(redb_error("clear"))?;
        wtxn.commit().map_err(redb_error("clear"))
    }
}
