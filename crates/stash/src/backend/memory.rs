//! In-process engine
//!
//! Stores live in a process-wide registry keyed by stash path, so two stashes
//! opened on the same path see the same entries.

use super::Backend;
use crate::config::Engine;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use stash_core::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type Store = Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>;

static REGISTRY: Lazy<DashMap<PathBuf, Store>> = Lazy::new(DashMap::new);

/// Drop every in-memory store
pub fn reset_registry() {
    REGISTRY.clear();
}

#[derive(Debug)]
pub struct MemoryBackend {
    store: Store,
}

impl MemoryBackend {
    #[must_use]
    pub fn open(path: &Path) -> Self {
        let store = Arc::clone(&REGISTRY.entry(path.to_path_buf()).or_default());
        Self { store }
    }
}

impl Backend for MemoryBackend {
    fn engine(&self) -> Engine {
        Engine::Memory
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.store.read().get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.store.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn contains(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.store.read().contains_key(key))
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.store.write().remove(key).is_some())
    }

    fn len(&mut self) -> Result<usize> {
        Ok(self.store.read().len())
    }

    fn keys(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(self.store.read().keys().cloned().collect())
    }

    fn items(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .store
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn clear(&mut self) -> Result<()> {
        self.store.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_path_shares_entries() {
        let path = Path::new("/memory-test/shared");
        let mut a = MemoryBackend::open(path);
        let mut b = MemoryBackend::open(path);
        a.set(b"k", b"v").unwrap();
        assert_eq!(b.get(b"k").unwrap(), Some(b"v".to_vec()));

        let mut other = MemoryBackend::open(Path::new("/memory-test/other"));
        assert!(!other.contains(b"k").unwrap());
    }

    #[test]
    fn test_delete_reports_presence() {
        let mut backend = MemoryBackend::open(Path::new("/memory-test/delete"));
        backend.set(b"k", b"v").unwrap();
        assert!(backend.delete(b"k").unwrap());
        assert!(!backend.delete(b"k").unwrap());
        assert_eq!(backend.len().unwrap(), 0);
    }
}
