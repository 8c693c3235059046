//! Line-oriented tracked-file registry.
//!
//! # Storage layout
//!
//! ```text
//! ~/.filemirror/
//!   files.txt   one tab-separated record per entry, insertion order
//!   files.lock  sidecar lock file, never holds data
//! ```
//!
//! # Concurrency
//!
//! Every operation runs under one lock acquisition: an in-process mutex plus an
//! exclusive `flock` on `files.lock`. The mutex serialises threads sharing one
//! `Registry` (foreground commands and the background sync loop); the file
//! lock serialises separate processes (the CLI and the daemon).
//!
//! Read-only operations on a home without `~/.filemirror/` take only the
//! mutex and create nothing.
//!
//! Mutations are read-all → modify → tmp-file + rename: the store is
//! either fully replaced or left untouched, never half-written.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use fs4::FileExt;

use crate::error::{io_err, RegistryError};
use crate::paths;
use crate::types::{RemoteFile, TrackedEntry};

/// Handle to one registry file. Cheap to construct; performs no I/O until
/// an operation is called. Share it behind an `Arc` between threads.
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    lock_path: PathBuf,
    guard: Mutex<()>,
}

/// Held for the duration of one registry operation.
struct RegistryLock<'a> {
    _guard: MutexGuard<'a, ()>,
    file: Option<File>,
}

impl Drop for RegistryLock<'_> {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = file.unlock();
        }
    }
}

impl Registry {
    /// Registry rooted at `<home>/.filemirror/files.txt`.
    pub fn open_at(home: &Path) -> Self {
        Self::with_paths(paths::registry_path_at(home), paths::registry_lock_path_at(home))
    }

    /// `open_at` convenience wrapper.
    pub fn open() -> Result<Self, RegistryError> {
        Ok(Self::open_at(&paths::home_dir()?))
    }

    pub fn with_paths(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_path: lock_path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Path of the backing store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Append `entry` to the end of the store, creating it if absent.
    ///
    /// Fails with [`RegistryError::AlreadyTracked`] if an entry with the same
    /// key exists; the store is left unchanged.
    pub fn add_entry(&self, entry: &TrackedEntry) -> Result<(), RegistryError> {
        entry.to_record()?;
        let _lock = self.lock()?;
        let mut entries = self.read_entries()?;
        if entries.iter().any(|e| e.file == entry.file) {
            return Err(RegistryError::AlreadyTracked {
                key: entry.file.clone(),
            });
        }
        entries.push(entry.clone());
        self.commit(&entries)
    }

    /// All entries in stored order.
    ///
    /// Fails with [`RegistryError::EmptyRegistry`] when the store is missing
    /// or has no entries.
    pub fn list_entries(&self) -> Result<Vec<TrackedEntry>, RegistryError> {
        let _lock = self.lock_existing()?;
        let entries = self.read_entries()?;
        if entries.is_empty() {
            return Err(RegistryError::EmptyRegistry);
        }
        Ok(entries)
    }

    /// Remove the first entry whose key equals `key`.
    ///
    /// Returns `Some(index)` with the entry's original position, or `None`
    /// when nothing matched (the store is not rewritten). Fails with
    /// [`RegistryError::NothingTracked`] when the store is missing or empty.
    pub fn remove_entry(&self, key: &RemoteFile) -> Result<Option<usize>, RegistryError> {
        let _lock = self.lock_existing()?;
        let mut entries = self.read_entries()?;
        if entries.is_empty() {
            return Err(RegistryError::NothingTracked);
        }
        let Some(index) = entries.iter().position(|e| &e.file == key) else {
            return Ok(None);
        };
        entries.remove(index);
        self.commit(&entries)?;
        Ok(Some(index))
    }

    /// Delete the whole backing store.
    ///
    /// Fails with [`RegistryError::NothingTracked`] if it did not exist.
    pub fn remove_all(&self) -> Result<(), RegistryError> {
        let _lock = self.lock_existing()?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RegistryError::NothingTracked),
            Err(e) => Err(io_err(&self.path, e)),
        }
    }

    /// Stored location of the entry keyed by `key`.
    pub fn find_location(&self, key: &RemoteFile) -> Result<PathBuf, RegistryError> {
        let _lock = self.lock_existing()?;
        let entries = self.read_entries()?;
        if entries.is_empty() {
            return Err(RegistryError::NothingTracked);
        }
        entries
            .into_iter()
            .find(|e| &e.file == key)
            .map(|e| e.location)
            .ok_or_else(|| RegistryError::NotFound { key: key.clone() })
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn lock(&self) -> Result<RegistryLock<'_>, RegistryError> {
        let guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dir) = self.lock_path.parent() {
            paths::ensure_private_dir(dir)?;
        }
        self.lock_file(guard)
    }

    /// Like [`lock`](Self::lock), but without creating the storage directory.
    ///
    /// Without that directory there is no store and no other process can be
    /// mid-write, so the mutex alone is enough.
    fn lock_existing(&self) -> Result<RegistryLock<'_>, RegistryError> {
        let guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        match self.lock_path.parent() {
            Some(dir) if !dir.is_dir() => Ok(RegistryLock {
                _guard: guard,
                file: None,
            }),
            _ => self.lock_file(guard),
        }
    }

    fn lock_file<'a>(&self, guard: MutexGuard<'a, ()>) -> Result<RegistryLock<'a>, RegistryError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| io_err(&self.lock_path, e))?;
        file.lock_exclusive().map_err(|e| io_err(&self.lock_path, e))?;
        Ok(RegistryLock {
            _guard: guard,
            file: Some(file),
        })
    }

    /// Read every record. A missing store reads as empty; blank lines are skipped.
    fn read_entries(&self) -> Result<Vec<TrackedEntry>, RegistryError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(io_err(&self.path, e)),
        };
        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                TrackedEntry::from_record(line).map_err(|reason| RegistryError::Parse {
                    path: self.path.clone(),
                    line: idx + 1,
                    reason,
                })
            })
            .collect()
    }

    fn commit(&self, entries: &[TrackedEntry]) -> Result<(), RegistryError> {
        if let Some(dir) = self.path.parent() {
            paths::ensure_private_dir(dir)?;
        }
        let mut contents = String::new();
        for entry in entries {
            contents.push_str(&entry.to_record()?);
            contents.push('\n');
        }
        paths::atomic_write(&self.path, contents.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(path: &str) -> TrackedEntry {
        TrackedEntry::new(RemoteFile::new("o", "r", "main", path), "/tmp/x")
    }

    #[test]
    fn add_creates_store_and_directory() {
        let home = TempDir::new().expect("tempdir");
        let registry = Registry::open_at(home.path());
        registry.add_entry(&entry("a/b.txt")).expect("add");
        assert!(registry.path().exists());
        let contents = std::fs::read_to_string(registry.path()).unwrap();
        assert_eq!(contents, "o\tr\tmain\ta/b.txt\t/tmp/x\n");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let home = TempDir::new().expect("tempdir");
        let registry = Registry::open_at(home.path());
        std::fs::create_dir_all(paths::root_at(home.path())).unwrap();
        std::fs::write(registry.path(), "\no r main a.txt /tmp/x\n\n").unwrap();
        assert_eq!(registry.list_entries().unwrap(), vec![entry("a.txt")]);
    }

    #[test]
    fn invalid_entry_is_rejected_before_touching_store() {
        let home = TempDir::new().expect("tempdir");
        let registry = Registry::open_at(home.path());
        let bad = TrackedEntry::new(RemoteFile::new("o", "r", "", "p"), "/tmp");
        let err = registry.add_entry(&bad).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidField { field: "branch", .. }));
        assert!(!registry.path().exists());
    }

    #[test]
    fn lock_is_released_after_each_operation() {
        let home = TempDir::new().expect("tempdir");
        let first = Registry::open_at(home.path());
        let second = Registry::open_at(home.path());
        first.add_entry(&entry("a.txt")).expect("first add");
        second.add_entry(&entry("b.txt")).expect("second add");
        assert_eq!(first.list_entries().unwrap().len(), 2);
    }
}
