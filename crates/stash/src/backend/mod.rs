//! Storage engines
//!
//! Every engine implements the same byte mapping, [`Backend`]. A stash never
//! talks to an engine directly; it goes through [`LazyBackend`], which opens
//! the engine on first use (with retries) and tracks its lifecycle.

pub mod disk_cache;
pub mod file;
pub mod lmdb;
pub mod memory;
#[cfg(feature = "mongo")]
pub mod mongo;
pub mod pickle_db;
#[cfg(feature = "redis")]
pub mod redis;
pub mod shelve;
pub mod sqlite;

use crate::config::{Engine, StashConfig};
use stash_core::{Error, Result};
use stash_utils::{ensure_dir, retry_blocking, RetryConfig};
use std::fmt;
use tracing::debug;

/// Byte-keyed storage behind a stash
///
/// Keys and values arrive already encoded. Engines that need strings are only
/// ever handed base64 frames, so they can convert with `from_utf8` safely.
pub trait Backend: Send {
    fn engine(&self) -> Engine;

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    fn contains(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Remove an entry, returning whether it existed
    fn delete(&mut self, key: &[u8]) -> Result<bool>;

    fn len(&mut self) -> Result<usize>;

    fn keys(&mut self) -> Result<Vec<Vec<u8>>>;

    fn items(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut items = Vec::new();
        for key in self.keys()? {
            // Skip entries removed between listing and reading
            if let Some(value) = self.get(&key)? {
                items.push((key, value));
            }
        }
        Ok(items)
    }

    fn clear(&mut self) -> Result<()>;

    /// Push buffered writes to durable storage
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

/// Lifecycle of an engine connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Closed,
    Opening,
    Open,
    Closing,
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendState::Closed => "closed",
            BackendState::Opening => "opening",
            BackendState::Open => "open",
            BackendState::Closing => "closing",
        };
        f.write_str(s)
    }
}

/// An engine that is opened on first access and can be closed and reopened
pub struct LazyBackend {
    config: StashConfig,
    state: BackendState,
    backend: Option<Box<dyn Backend>>,
}

impl fmt::Debug for LazyBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyBackend")
            .field("engine", &self.config.engine)
            .field("path", &self.config.path())
            .field("state", &self.state)
            .finish()
    }
}

impl LazyBackend {
    #[must_use]
    pub fn new(config: StashConfig) -> Self {
        Self {
            config,
            state: BackendState::Closed,
            backend: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> BackendState {
        self.state
    }

    /// The open engine, opening it first if needed
    ///
    /// Opening races with other processes creating the same files, so the
    /// open step is retried with exponential backoff.
    pub fn open(&mut self) -> Result<&mut dyn Backend> {
        if self.backend.is_none() {
            self.state = BackendState::Opening;
            let config = &self.config;
            match retry_blocking(&RetryConfig::backend_open(), || create_backend(config)) {
                Ok(backend) => {
                    debug!(
                        engine = %self.config.engine,
                        path = %self.config.path().display(),
                        "opened backend"
                    );
                    self.backend = Some(backend);
                    self.state = BackendState::Open;
                }
                Err(e) => {
                    self.state = BackendState::Closed;
                    return Err(e);
                }
            }
        }

        match self.backend.as_deref_mut() {
            Some(backend) => Ok(backend),
            None => Err(Error::backend(
                self.config.engine.as_str(),
                "open",
                "engine missing after open",
            )),
        }
    }

    /// Flush and release the engine; the next access reopens it
    pub fn close(&mut self) -> Result<()> {
        let Some(mut backend) = self.backend.take() else {
            return Ok(());
        };
        self.state = BackendState::Closing;
        let result = backend.close();
        drop(backend);
        self.state = BackendState::Closed;
        debug!(engine = %self.config.engine, "closed backend");
        result
    }
}

impl Drop for LazyBackend {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(engine = %self.config.engine, error = %e, "failed to close backend");
        }
    }
}

/// Open the engine a configuration selects
pub fn create_backend(config: &StashConfig) -> Result<Box<dyn Backend>> {
    if config.engine.uses_filesystem() {
        ensure_dir(&config.directory())?;
    }

    let path = config.path();
    let backend: Box<dyn Backend> = match config.engine {
        Engine::Memory => Box::new(memory::MemoryBackend::open(&path)),
        Engine::File => Box::new(file::FileBackend::open(&path, file::Layout::Flat)?),
        Engine::PairTree => Box::new(file::FileBackend::open(&path, file::Layout::PairTree)?),
        Engine::Sqlite => Box::new(sqlite::SqliteBackend::open(&path, &config.dbname)?),
        Engine::Lmdb => Box::new(lmdb::LmdbBackend::open(&path, &config.dbname)?),
        Engine::Shelve => Box::new(shelve::ShelveBackend::open(&path)?),
        Engine::DiskCache => Box::new(disk_cache::DiskCacheBackend::open(&path, &config.dbname)?),
        Engine::PickleDb => Box::new(pickle_db::PickleDbBackend::open(&path)?),
        #[cfg(feature = "redis")]
        Engine::Redis => Box::new(redis::RedisBackend::open(
            config.url().unwrap_or_default(),
            &config.dbname,
            &config.name,
        )?),
        #[cfg(feature = "mongo")]
        Engine::Mongo => Box::new(mongo::MongoBackend::open(
            config.url().unwrap_or_default(),
            &config.dbname,
            &config.name,
        )?),
        #[allow(unreachable_patterns)]
        engine => {
            return Err(Error::configuration(format!(
                "engine '{engine}' requires the `{}` cargo feature",
                engine.as_str()
            )))
        }
    };
    Ok(backend)
}

/// Convert a frame handed to a string-only engine
pub(crate) fn frame_str<'a>(engine: Engine, frame: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(frame).map_err(|e| {
        Error::encoding(format!(
            "{engine} stores strings but received a non UTF-8 frame: {e}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_open_and_reopen() {
        let config = StashConfig::builder()
            .with_engine(Engine::Memory)
            .with_name("lazy-open")
            .build()
            .unwrap();
        let mut lazy = LazyBackend::new(config);
        assert_eq!(lazy.state(), BackendState::Closed);

        lazy.open().unwrap().set(b"k", b"v").unwrap();
        assert_eq!(lazy.state(), BackendState::Open);

        lazy.close().unwrap();
        assert_eq!(lazy.state(), BackendState::Closed);

        assert_eq!(lazy.open().unwrap().get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(lazy.state(), BackendState::Open);
    }

    #[test]
    fn test_close_without_open_is_a_no_op() {
        let config = StashConfig::builder().with_name("never-opened").build().unwrap();
        let mut lazy = LazyBackend::new(config);
        lazy.close().unwrap();
        assert_eq!(lazy.state(), BackendState::Closed);
    }

    #[test]
    fn test_open_creates_the_directory() {
        let temp = tempfile::tempdir().unwrap();
        let config = StashConfig::builder()
            .with_engine(Engine::Sqlite)
            .with_root_dir(temp.path())
            .with_name("nested/name")
            .build()
            .unwrap();
        let mut backend = create_backend(&config).unwrap();
        assert!(temp.path().join("nested/name").is_dir());
        assert_eq!(backend.len().unwrap(), 0);
    }
}
