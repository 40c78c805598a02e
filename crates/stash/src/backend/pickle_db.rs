//! Single-file JSON key-value store on pickledb
//!
//! The file is dumped explicitly after each change, so a bulk change such as
//! `clear` rewrites it once.

use super::{frame_str, Backend};
use crate::config::Engine;
use pickledb::{PickleDb, PickleDbDumpPolicy, SerializationMethod};
use stash_core::{Error, Result};
use std::path::Path;

fn pickle_error(operation: &'static str) -> impl Fn(pickledb::error::Error) -> Error {
    move |e| Error::backend("pickle-db", operation, e)
}

pub struct PickleDbBackend {
    db: PickleDb,
}

impl std::fmt::Debug for PickleDbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickleDbBackend")
            .field("entries", &self.db.total_keys())
            .finish()
    }
}

impl PickleDbBackend {
    pub fn open(path: &Path) -> Result<Self> {
        let policy = PickleDbDumpPolicy::DumpUponRequest;
        let db = if path.exists() {
            PickleDb::load(path, policy, SerializationMethod::Json)
                .map_err(pickle_error("open"))?
        } else {
            PickleDb::new(path, policy, SerializationMethod::Json)
        };
        Ok(Self { db })
    }
}

impl Backend for PickleDbBackend {
    fn engine(&self) -> Engine {
        Engine::PickleDb
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let key = frame_str(Engine::PickleDb, key)?;
        Ok(self.db.get::<String>(key).map(String::into_bytes))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let key = frame_str(Engine::PickleDb, key)?;
        let value = frame_str(Engine::PickleDb, value)?;
        self.db.set(key, &value).map_err(pickle_error("set"))?;
        self.flush()
    }

    fn contains(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.db.exists(frame_str(Engine::PickleDb, key)?))
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let key = frame_str(Engine::PickleDb, key)?;
        let existed = self.db.rem(key).map_err(pickle_error("delete"))?;
        if existed {
            self.flush()?;
        }
        Ok(existed)
    }

    fn len(&mut self) -> Result<usize> {
        Ok(self.db.total_keys())
    }

    fn keys(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .db
            .get_all()
            .into_iter()
            .map(String::into_bytes)
            .collect())
    }

    fn clear(&mut self) -> Result<()> {
        for key in self.db.get_all() {
            self.db.rem(&key).map_err(pickle_error("clear"))?;
        }
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        self.db.dump().map_err(pickle_error("dump"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_entries_persist_across_loads() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stash.pickledb");
        {
            let mut backend = PickleDbBackend::open(&path).unwrap();
            backend.set(b"a2V5", b"dmFsdWU=").unwrap();
            backend.set(b"b3RoZXI=", b"eA==").unwrap();
            assert!(backend.delete(b"b3RoZXI=").unwrap());
        }
        let mut backend = PickleDbBackend::open(&path).unwrap();
        assert_eq!(backend.len().unwrap(), 1);
        assert_eq!(backend.get(b"a2V5").unwrap(), Some(b"dmFsdWU=".to_vec()));
    }

    #[test]
    fn test_clear_persists_an_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stash.pickledb");
        let mut backend = PickleDbBackend::open(&path).unwrap();
        for i in 0..20 {
            backend.set(format!("a2V5{i}").as_bytes(), b"eA==").unwrap();
        }
        backend.clear().unwrap();

        // A second handle only sees what reached the file
        let mut reloaded = PickleDbBackend::open(&path).unwrap();
        assert_eq!(reloaded.len().unwrap(), 0);
        assert!(reloaded.keys().unwrap().is_empty());
    }
}
