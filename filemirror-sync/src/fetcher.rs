//! Whole-file fetch and atomic local write.
//!
//! ## Target resolution
//!
//! The fetched file is named after the last segment of the remote path and
//! written into `location` when that is an existing directory. Otherwise it
//! lands in the fallback directory and the outcome says so.
//!
//! ## Write protocol
//!
//! 1. Download the blob and decode it as UTF-8.
//! 2. Write to `<target>.<pid>.<n>.filemirror.tmp` next to the target, so
//!    concurrent writers (CLI and daemon) never share a temp file.
//! 3. Rename over the target (atomic on POSIX).
//!
//! An interrupted fetch leaves the previous copy intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use filemirror_core::RemoteFile;
use filemirror_remote::RemoteProvider;

use crate::error::{write_err, SyncError};

/// Where a fetched file ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WriteOutcome {
    WrittenAtRequestedLocation { path: PathBuf },
    /// `requested` was not an existing directory.
    WrittenAtFallbackLocation { path: PathBuf, requested: PathBuf },
}

impl WriteOutcome {
    pub fn path(&self) -> &Path {
        match self {
            WriteOutcome::WrittenAtRequestedLocation { path }
            | WriteOutcome::WrittenAtFallbackLocation { path, .. } => path,
        }
    }

    pub fn used_fallback(&self) -> bool {
        matches!(self, WriteOutcome::WrittenAtFallbackLocation { .. })
    }
}

/// Resolve the file a fetch of `file` into `location` would write.
///
/// Returns the target path and whether the fallback directory was chosen.
pub fn resolve_target(file: &RemoteFile, location: &Path, fallback_dir: &Path) -> (PathBuf, bool) {
    if location.is_dir() {
        (location.join(file.file_name()), false)
    } else {
        (fallback_dir.join(file.file_name()), true)
    }
}

pub struct Fetcher {
    provider: Arc<dyn RemoteProvider>,
    fallback_dir: PathBuf,
}

impl Fetcher {
    pub fn new(provider: Arc<dyn RemoteProvider>, fallback_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            fallback_dir: fallback_dir.into(),
        }
    }

    pub fn fallback_dir(&self) -> &Path {
        &self.fallback_dir
    }

    /// Download `file` and store it under `location`, overwriting any
    /// existing copy of the same name.
    ///
    /// Remote failures are returned as [`SyncError::Remote`] with their
    /// classification intact; nothing is written in that case.
    pub fn fetch(&self, file: &RemoteFile, location: &Path) -> Result<WriteOutcome, SyncError> {
        let bytes = self.provider.fetch_blob(file)?;

        let (target, fallback) = resolve_target(file, location, &self.fallback_dir);
        let name = file.file_name();
        if name.is_empty() || name == "." || name == ".." {
            return Err(write_err(
                &target,
                std::io::Error::new(ErrorKind::InvalidInput, "remote path has no file name"),
            ));
        }

        let content = String::from_utf8(bytes)
            .map_err(|e| write_err(&target, std::io::Error::new(ErrorKind::InvalidData, e)))?;

        if fallback {
            tracing::info!(
                "{} is not a directory; saving {} to {}",
                location.display(),
                file,
                self.fallback_dir.display()
            );
            std::fs::create_dir_all(&self.fallback_dir)
                .map_err(|e| write_err(&self.fallback_dir, e))?;
        }

        write_atomic(&target, &content)?;
        tracing::info!("wrote: {}", target.display());

        Ok(if fallback {
            WriteOutcome::WrittenAtFallbackLocation {
                path: target,
                requested: location.to_path_buf(),
            }
        } else {
            WriteOutcome::WrittenAtRequestedLocation { path: target }
        })
    }
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

fn tmp_path(path: &Path) -> PathBuf {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}.{seq}.filemirror.tmp", std::process::id()));
    PathBuf::from(name)
}

fn write_atomic(path: &Path, content: &str) -> Result<(), SyncError> {
    let tmp = tmp_path(path);
    std::fs::write(&tmp, content).map_err(|e| write_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(write_err(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use filemirror_remote::{MemoryProvider, RemoteError};
    use tempfile::TempDir;

    use super::*;

    fn setup(content: &[u8]) -> (Arc<MemoryProvider>, RemoteFile) {
        let provider = Arc::new(MemoryProvider::new());
        let file = RemoteFile::new("o", "r", "main", "docs/readme.md");
        provider.put_file(&file, content, Utc::now());
        (provider, file)
    }

    #[test]
    fn writes_into_existing_directory() {
        let (provider, file) = setup(b"hello\n");
        let dir = TempDir::new().expect("dir");
        let fetcher = Fetcher::new(provider, dir.path().join("fallback"));

        let outcome = fetcher.fetch(&file, dir.path()).expect("fetch");
        assert_eq!(
            outcome,
            WriteOutcome::WrittenAtRequestedLocation {
                path: dir.path().join("readme.md")
            }
        );
        assert_eq!(std::fs::read_to_string(outcome.path()).unwrap(), "hello\n");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, ["readme.md"]);
    }

    #[test]
    fn overwrites_previous_copy() {
        let (provider, file) = setup(b"new");
        let dir = TempDir::new().expect("dir");
        std::fs::write(dir.path().join("readme.md"), "old local edit").unwrap();

        Fetcher::new(provider, dir.path().join("fb"))
            .fetch(&file, dir.path())
            .expect("fetch");
        assert_eq!(std::fs::read_to_string(dir.path().join("readme.md")).unwrap(), "new");
    }

    #[test]
    fn non_utf8_content_is_a_local_write_error() {
        let (provider, file) = setup(&[0xff, 0xfe, 0x00]);
        let dir = TempDir::new().expect("dir");
        let err = Fetcher::new(provider, dir.path().join("fb"))
            .fetch(&file, dir.path())
            .unwrap_err();
        assert!(matches!(err, SyncError::LocalWrite { .. }), "got: {err}");
        assert!(!dir.path().join("readme.md").exists());
    }

    #[test]
    fn remote_failure_writes_nothing() {
        let (provider, file) = setup(b"x");
        provider.set_offline(true);
        let dir = TempDir::new().expect("dir");
        let err = Fetcher::new(provider, dir.path().join("fb"))
            .fetch(&file, dir.path())
            .unwrap_err();
        assert!(matches!(err, SyncError::Remote(RemoteError::Unavailable(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn concurrent_writes_to_one_target_all_succeed() {
        let dir = TempDir::new().expect("dir");
        let target = dir.path().join("shared.txt");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let target = target.clone();
                std::thread::spawn(move || write_atomic(&target, &format!("writer {i}\n")))
            })
            .collect();
        for handle in handles {
            handle.join().expect("join").expect("write");
        }

        assert!(std::fs::read_to_string(&target)
            .expect("read")
            .starts_with("writer "));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
