//! Storage layout under the user's home directory.
//!
//! ```text
//! ~/.filemirror/
//!   config.yaml      optional settings
//!   files.txt        tracked-file registry (one record per line)
//!   files.lock       sidecar lock guarding registry read-modify-write
//!   credentials      access token (mode 0600)
//!   downloaded/      fallback location for fetched files
//!   daemon.sock      background daemon control socket
//! ```
//!
//! Every helper takes an explicit `home` so tests can root everything in a
//! `TempDir`; [`home_dir`] resolves the real one.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::RegistryError;

pub const ROOT_DIR: &str = ".filemirror";
pub const REGISTRY_FILE: &str = "files.txt";
pub const REGISTRY_LOCK_FILE: &str = "files.lock";
pub const CREDENTIALS_FILE: &str = "credentials";
pub const CONFIG_FILE: &str = "config.yaml";
pub const DOWNLOADED_DIR: &str = "downloaded";
pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn root_at(home: &Path) -> PathBuf {
    home.join(ROOT_DIR)
}

pub fn registry_path_at(home: &Path) -> PathBuf {
    root_at(home).join(REGISTRY_FILE)
}

pub fn registry_lock_path_at(home: &Path) -> PathBuf {
    root_at(home).join(REGISTRY_LOCK_FILE)
}

pub fn credentials_path_at(home: &Path) -> PathBuf {
    root_at(home).join(CREDENTIALS_FILE)
}

pub fn config_path_at(home: &Path) -> PathBuf {
    root_at(home).join(CONFIG_FILE)
}

/// Default fallback location; `config.yaml` may override it.
pub fn downloaded_dir_at(home: &Path) -> PathBuf {
    root_at(home).join(DOWNLOADED_DIR)
}

pub fn socket_path_at(home: &Path) -> PathBuf {
    root_at(home).join(DAEMON_SOCKET)
}

pub fn home_dir() -> Result<PathBuf, RegistryError> {
    dirs::home_dir().ok_or(RegistryError::HomeNotFound)
}

/// Create `dir` (and parents) with mode `0700` if it does not exist yet.
pub(crate) fn ensure_private_dir(dir: &Path) -> Result<(), RegistryError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| crate::error::io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| crate::error::io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

/// Create `path` for writing, readable by the owner only from the first byte.
///
/// Any leftover file at `path` is replaced, never reused.
fn create_private(path: &Path) -> std::io::Result<File> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Write `contents` to a `0600` `<path>.tmp`, then rename over `path`.
///
/// `.tmp` is always a sibling of the target so the rename never crosses
/// filesystems. On failure the original file is left untouched.
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), RegistryError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    create_private(&tmp)
        .and_then(|mut file| file.write_all(contents).and_then(|()| file.sync_all()))
        .map_err(|e| crate::error::io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(crate::error::io_err(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn layout_is_rooted_in_home() {
        let home = TempDir::new().expect("tempdir");
        assert!(registry_path_at(home.path()).ends_with(".filemirror/files.txt"));
        assert!(downloaded_dir_at(home.path()).ends_with(".filemirror/downloaded"));
        assert!(socket_path_at(home.path()).ends_with(".filemirror/daemon.sock"));
    }

    #[test]
    fn private_dir_created_with_perms() {
        let home = TempDir::new().expect("tempdir");
        let dir = root_at(home.path());
        ensure_private_dir(&dir).expect("ensure");
        assert!(dir.is_dir());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
        }
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let home = TempDir::new().expect("tempdir");
        let path = home.path().join("files.txt");
        atomic_write(&path, b"hello\n").expect("write");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
        assert!(!home.path().join("files.txt.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn tmp_file_is_private_from_creation() {
        use std::os::unix::fs::PermissionsExt;
        let home = TempDir::new().expect("tempdir");
        let tmp = home.path().join("credentials.tmp");
        std::fs::write(&tmp, "stale").unwrap();
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

        let file = create_private(&tmp).expect("create");
        let mode = file.metadata().unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "expected 0600, got {mode:o}");
        assert_eq!(std::fs::read_to_string(&tmp).unwrap(), "");
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(RegistryError::HomeNotFound.to_string().contains("home directory"));
    }
}
