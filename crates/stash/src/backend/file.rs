//! Hash-sharded directory engine
//!
//! Each entry is one file named after the MD5 of its encoded key, split into
//! directory levels. The file holds `<key>\n<value>`; reads compare the stored
//! key line so a hash collision reads as absent rather than as the wrong
//! entry.

use super::Backend;
use crate::config::Engine;
use stash_codec::frame_hash;
use stash_core::{Error, Result};
use stash_utils::{ensure_dir, prune_empty_dirs, read_if_exists, walk_files, write_atomic};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// How a hash maps onto directories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `ab/cdef...`
    Flat,
    /// `ab/cd/ef/gh...`
    PairTree,
}

impl Layout {
    fn relative_path(self, hash: &str) -> PathBuf {
        match self {
            Layout::Flat => Path::new(&hash[..2]).join(&hash[2..]),
            Layout::PairTree => Path::new(&hash[..2])
                .join(&hash[2..4])
                .join(&hash[4..6])
                .join(&hash[6..]),
        }
    }

    fn engine(self) -> Engine {
        match self {
            Layout::Flat => Engine::File,
            Layout::PairTree => Engine::PairTree,
        }
    }
}

#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    layout: Layout,
}

struct Entry {
    key: Vec<u8>,
    value: Vec<u8>,
}

fn parse_entry(path: &Path, content: Vec<u8>) -> Result<Entry> {
    let Some(split) = content.iter().position(|b| *b == b'\n') else {
        return Err(Error::backend(
            "file",
            "read",
            format!("{} has no key line", path.display()),
        ));
    };
    let mut key = content;
    let value = key.split_off(split + 1);
    key.truncate(split);
    Ok(Entry { key, value })
}

impl FileBackend {
    pub fn open(root: &Path, layout: Layout) -> Result<Self> {
        ensure_dir(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            layout,
        })
    }

    fn entry_path(&self, key: &[u8]) -> PathBuf {
        self.root.join(self.layout.relative_path(&frame_hash(key)))
    }

    fn read_entry(&self, path: &Path) -> Result<Option<Entry>> {
        match read_if_exists(path)? {
            Some(content) => parse_entry(path, content).map(Some),
            None => Ok(None),
        }
    }

    fn read_matching(&self, key: &[u8]) -> Result<Option<(PathBuf, Entry)>> {
        let path = self.entry_path(key);
        match self.read_entry(&path)? {
            Some(entry) if entry.key == key => Ok(Some((path, entry))),
            _ => Ok(None),
        }
    }

    fn entries(&self) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for path in walk_files(&self.root)? {
            // Deleted by someone else since the walk
            if let Some(entry) = self.read_entry(&path)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

impl Backend for FileBackend {
    fn engine(&self) -> Engine {
        self.layout.engine()
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.read_matching(key)?.map(|(_, entry)| entry.value))
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut content = Vec::with_capacity(key.len() + 1 + value.len());
        content.extend_from_slice(key);
        content.push(b'\n');
        content.extend_from_slice(value);
        write_atomic(&self.entry_path(key), &content)
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let Some((path, _)) = self.read_matching(key)? else {
            return Ok(false);
        };
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::file_system(&path, "remove entry", e)),
        }
        if let Some(parent) = path.parent() {
            prune_empty_dirs(parent, &self.root)?;
        }
        Ok(true)
    }

    fn len(&mut self) -> Result<usize> {
        Ok(walk_files(&self.root)?.len())
    }

    fn keys(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(self.entries()?.into_iter().map(|e| e.key).collect())
    }

    fn items(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|e| (e.key, e.value))
            .collect())
    }

    fn clear(&mut self) -> Result<()> {
        let children = match fs::read_dir(&self.root) {
            Ok(children) => children,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::file_system(&self.root, "list", e)),
        };
        for child in children {
            let path = child
                .map_err(|e| Error::file_system(&self.root, "list", e))?
                .path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match removed {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::file_system(&path, "remove", e)),
            }
        }
        Ok(())
    }
}
