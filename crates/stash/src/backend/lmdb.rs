//! LMDB engine: a named database inside an environment directory
//!
//! LMDB caps keys at 511 bytes, so entries are keyed by the frame's MD5 and
//! each record carries the full key frame: `key_len (u32 LE) || key || value`.

use super::Backend;
use crate::config::Engine;
use dashmap::DashMap;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RwTxn};
use once_cell::sync::Lazy;
use stash_codec::frame_hash;
use stash_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

const MAP_SIZE: usize = 1 << 30;
const MAX_DBS: u32 = 64;
const LEN_PREFIX: usize = 4;

// LMDB forbids opening one environment twice in a process. Entries are weak
// so the environment closes once the last backend on it is dropped.
static ENVIRONMENTS: Lazy<DashMap<PathBuf, Weak<Env>>> = Lazy::new(DashMap::new);

fn lmdb_error(operation: &'static str) -> impl Fn(heed::Error) -> Error {
    move |e| Error::backend("lmdb", operation, e)
}

fn environment(dir: &Path) -> Result<Arc<Env>> {
    ENVIRONMENTS.retain(|_, env| env.strong_count() > 0);

    let mut entry = ENVIRONMENTS.entry(dir.to_path_buf()).or_default();
    if let Some(env) = entry.upgrade() {
        return Ok(env);
    }
    // SAFETY: environments are opened once per path and shared through the
    // registry, and the directory is not modified outside LMDB.
    let env = unsafe {
        EnvOpenOptions::new()
            .map_size(MAP_SIZE)
            .max_dbs(MAX_DBS)
            .open(dir)
    }
    .map_err(lmdb_error("open"))?;
    let env = Arc::new(env);
    *entry = Arc::downgrade(&env);
    Ok(env)
}

fn encode_record(key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(key.len())
        .map_err(|_| Error::backend("lmdb", "set", "key frame exceeds 4 GiB"))?;
    let mut record = Vec::with_capacity(LEN_PREFIX + key.len() + value.len());
    record.extend_from_slice(&len.to_le_bytes());
    record.extend_from_slice(key);
    record.extend_from_slice(value);
    Ok(record)
}

/// Split a record into `(key, value)`; `None` for a malformed record
fn decode_record(record: &[u8]) -> Option<(&[u8], &[u8])> {
    let prefix: [u8; LEN_PREFIX] = record.get(..LEN_PREFIX)?.try_into().ok()?;
    let len = usize::try_from(u32::from_le_bytes(prefix)).ok()?;
    let rest = &record[LEN_PREFIX..];
    (rest.len() >= len).then(|| rest.split_at(len))
}

pub struct LmdbBackend {
    env: Arc<Env>,
    db: Database<Bytes, Bytes>,
}

impl std::fmt::Debug for LmdbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbBackend")
            .field("path", &self.env.path())
            .finish_non_exhaustive()
    }
}

impl LmdbBackend {
    pub fn open(dir: &Path, dbname: &str) -> Result<Self> {
        let env = environment(dir)?;
        let mut wtxn = env.write_txn().map_err(lmdb_error("open"))?;
        let db = env
            .create_database(&mut wtxn, Some(dbname))
            .map_err(lmdb_error("create database"))?;
        wtxn.commit().map_err(lmdb_error("open"))?;
        Ok(Self { env, db })
    }

    /// Whether the record under `slot` belongs to `key`
    fn owns_slot(&self, wtxn: &RwTxn<'_>, slot: &[u8], key: &[u8]) -> Result<bool> {
        let record = self.db.get(wtxn, slot).map_err(lmdb_error("delete"))?;
        Ok(record
            .and_then(decode_record)
            .is_some_and(|(stored, _)| stored == key))
    }
}

impl Backend for LmdbBackend {
    fn engine(&self) -> Engine {
        Engine::Lmdb
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let slot = frame_hash(key);
        let rtxn = self.env.read_txn().map_err(lmdb_error("get"))?;
        let record = self
            .db
            .get(&rtxn, slot.as_bytes())
            .map_err(lmdb_error("get"))?;
        Ok(record
            .and_then(decode_record)
            .filter(|(stored, _)| *stored == key)
            .map(|(_, value)| value.to_vec()))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let slot = frame_hash(key);
        let record = encode_record(key, value)?;
        let mut wtxn = self.env.write_txn().map_err(lmdb_error("set"))?;
        self.db
            .put(&mut wtxn, slot.as_bytes(), &record)
            .map_err(lmdb_error("set"))?;
        wtxn.commit().map_err(lmdb_error("set"))
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let slot = frame_hash(key);
        let mut wtxn = self.env.write_txn().map_err(lmdb_error("delete"))?;
        if !self.owns_slot(&wtxn, slot.as_bytes(), key)? {
            return Ok(false);
        }
        let existed = self
            .db
            .delete(&mut wtxn, slot.as_bytes())
            .map_err(lmdb_error("delete"))?;
        wtxn.commit().map_err(lmdb_error("delete"))?;
        Ok(existed)
    }

    fn len(&mut self) -> Result<usize> {
        let rtxn = self.env.read_txn().map_err(lmdb_error("len"))?;
        let len = self.db.len(&rtxn).map_err(lmdb_error("len"))?;
        Ok(usize::try_from(len).unwrap_or(usize::MAX))
    }

    fn keys(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(self.items()?.into_iter().map(|(k, _)| k).collect())
    }

    fn items(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let rtxn = self.env.read_txn().map_err(lmdb_error("iterate"))?;
        let mut items = Vec::new();
        for entry in self.db.iter(&rtxn).map_err(lmdb_error("iterate"))? {
            let (_, record) = entry.map_err(lmdb_error("iterate"))?;
            match decode_record(record) {
                Some((key, value)) => items.push((key.to_vec(), value.to_vec())),
                None => tracing::warn!(
                    path = %self.env.path().display(),
                    "skipping malformed lmdb record"
                ),
            }
        }
        Ok(items)
    }

    fn clear(&mut self) -> Result<()> {
        let mut wtxn = self.env.write_txn().map_err(lmdb_error("clear"))?;
        self.db.clear(&mut wtxn).map_err(lmdb_error("clear"))?;
        wtxn.commit().map_err(lmdb_error("clear"))
    }

    fn flush(&mut self) -> Result<()> {
        self.env.force_sync().map_err(lmdb_error("sync"))
    }
}
