//! File system helpers for directory-backed stashes

use stash_core::{Error, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Create a directory and all of its parents
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::file_system(path, "create directory", e))
}

/// Write data to a file atomically
///
/// The content goes to a temporary file in the destination directory which
/// is then renamed over `path`, so readers never observe a partial write.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::configuration(format!("{} has no parent directory", path.display())))?;
    ensure_dir(parent)?;

    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|e| Error::file_system(parent, "create temporary file", e))?;
    temp.write_all(content)
        .map_err(|e| Error::file_system(temp.path(), "write temporary file", e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| Error::file_system(temp.path(), "sync temporary file", e))?;
    temp.persist(path)
        .map_err(|e| Error::file_system(path, "atomic rename", e.error))?;
    Ok(())
}

/// Read a whole file, mapping "not found" to `None`
pub fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::file_system(path, "read", e)),
    }
}

/// Remove empty directories from `start` upwards, stopping at `root`
///
/// `root` itself is never removed. Returns the number of directories removed.
pub fn prune_empty_dirs(start: &Path, root: &Path) -> Result<usize> {
    let mut removed = 0;
    let mut current = start;
    while current != root && current.starts_with(root) {
        match fs::remove_dir(current) {
            Ok(()) => removed += 1,
            // Not empty, or already gone because of a concurrent delete
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(_) if dir_has_entries(current) => break,
            Err(e) => return Err(Error::file_system(current, "remove empty directory", e)),
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    Ok(removed)
}

fn dir_has_entries(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// All regular files below `root`, in sorted path order
///
/// Hidden files (temporary files of in-flight atomic writes) are skipped. A
/// missing root yields no files.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(ErrorKind::Other, "walk failed"));
            Error::file_system(path, "walk directory", source)
        })?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.file_type().is_file() && !hidden {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("ab").join("cdef");

        write_atomic(&file_path, b"key\nvalue").unwrap();

        assert_eq!(fs::read(&file_path).unwrap(), b"key\nvalue");
    }

    #[test]
    fn test_atomic_write_overwrites_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("entry");

        fs::write(&file_path, "old").unwrap();
        write_atomic(&file_path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new");
        // No temporary files left behind
        assert_eq!(walk_files(temp_dir.path()).unwrap(), vec![file_path]);
    }

    #[test]
    fn test_read_if_exists() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("entry");

        assert_eq!(read_if_exists(&file_path).unwrap(), None);
        fs::write(&file_path, [0u8, 1]).unwrap();
        assert_eq!(read_if_exists(&file_path).unwrap(), Some(vec![0, 1]));
    }

    #[test]
    fn test_prune_stops_at_root_and_non_empty_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let deep = root.join("ab").join("cd").join("ef");
        fs::create_dir_all(&deep).unwrap();
        fs::write(root.join("ab").join("keep"), "x").unwrap();

        let removed = prune_empty_dirs(&deep, root).unwrap();

        assert_eq!(removed, 2);
        assert!(!root.join("ab").join("cd").exists());
        assert!(root.join("ab").exists());
        assert!(root.exists());
    }

    #[test]
    fn test_walk_files_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        assert!(walk_files(&temp_dir.path().join("absent")).unwrap().is_empty());
    }
}
