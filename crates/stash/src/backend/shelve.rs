//! On-disk dictionary of strings with write-back on close
//!
//! The whole mapping is held in memory and written as one JSON document on
//! flush, close or drop.

use super::{frame_str, Backend};
use crate::config::Engine;
use stash_core::Result;
use stash_utils::{read_if_exists, write_atomic};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct ShelveBackend {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl ShelveBackend {
    pub fn open(path: &Path) -> Result<Self> {
        let entries = match read_if_exists(path)? {
            Some(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes)?,
            _ => BTreeMap::new(),
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
    }

    fn key(&self, key: &[u8]) -> Result<String> {
        frame_str(Engine::Shelve, key).map(str::to_string)
    }
}

impl Backend for ShelveBackend {
    fn engine(&self) -> Engine {
        Engine::Shelve
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let key = frame_str(Engine::Shelve, key)?;
        Ok(self.entries.get(key).map(|v| v.clone().into_bytes()))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let key = self.key(key)?;
        let value = frame_str(Engine::Shelve, value)?.to_string();
        self.entries.insert(key, value);
        self.dirty = true;
        Ok(())
    }

    fn contains(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.entries.contains_key(frame_str(Engine::Shelve, key)?))
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let existed = self
            .entries
            .remove(frame_str(Engine::Shelve, key)?)
            .is_some();
        self.dirty |= existed;
        Ok(existed)
    }

    fn len(&mut self) -> Result<usize> {
        Ok(self.entries.len())
    }

    fn keys(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .entries
            .keys()
            .map(|k| k.clone().into_bytes())
            .collect())
    }

    fn items(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .entries
            .iter()
            .map(|(k, v)| (k.clone().into_bytes(), v.clone().into_bytes()))
            .collect())
    }

    fn clear(&mut self) -> Result<()> {
        self.dirty |= !self.entries.is_empty();
        self.entries.clear();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.dirty {
            write_atomic(&self.path, &serde_json::to_vec(&self.entries)?)?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl Drop for ShelveBackend {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write back shelve");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_back_on_close() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("stash.shelve");
        {
            let mut shelve = ShelveBackend::open(&path).unwrap();
            shelve.set(b"a2V5", b"dmFsdWU=").unwrap();
            assert!(!path.exists());
            shelve.close().unwrap();
        }
        let mut shelve = ShelveBackend::open(&path).unwrap();
        assert_eq!(shelve.get(b"a2V5").unwrap(), Some(b"dmFsdWU=".to_vec()));
    }

    #[test]
    fn test_rejects_binary_frames() {
        let temp = TempDir::new().unwrap();
        let mut shelve = ShelveBackend::open(&temp.path().join("s.shelve")).unwrap();
        assert!(shelve.set(&[0xff, 0xfe], b"v").is_err());
    }
}
