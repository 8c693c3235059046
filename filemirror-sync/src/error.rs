//! Error types for filemirror-sync.

use std::path::PathBuf;

use thiserror::Error;

use filemirror_core::{LinkError, Notice, RegistryError};
use filemirror_remote::RemoteError;

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Link(#[from] LinkError),

    /// The fetched content could not be written at its target.
    #[error("failed to write {path}: {source}")]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// The remote address (user, repository, branch, or path) does not exist.
    pub fn is_remote_not_found(&self) -> bool {
        matches!(self, SyncError::Remote(e) if e.is_not_found())
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, SyncError::Remote(e) if e.is_unavailable())
    }

    /// One user-facing outcome for this failure.
    ///
    /// Connectivity problems are transient and reported as warnings; an empty
    /// registry is informational; everything else is an error.
    pub fn to_notice(&self) -> Notice {
        match self {
            SyncError::Remote(e) if e.is_unavailable() => Notice::warning(self.to_string()),
            SyncError::Registry(RegistryError::EmptyRegistry | RegistryError::NothingTracked) => {
                Notice::info(self.to_string())
            }
            _ => Notice::error(self.to_string()),
        }
    }
}

/// Convenience constructor for [`SyncError::LocalWrite`].
pub(crate) fn write_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::LocalWrite {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use filemirror_core::Severity;

    use super::*;

    #[test]
    fn notice_severity_follows_error_class() {
        let offline = SyncError::from(RemoteError::Unavailable("timed out".into()));
        assert_eq!(offline.to_notice().severity, Severity::Warning);

        let missing = SyncError::from(RemoteError::BranchNotFound {
            repo: "o/r".into(),
            branch: "dev".into(),
        });
        assert!(missing.is_remote_not_found());
        assert_eq!(missing.to_notice().severity, Severity::Error);
        assert!(missing.to_notice().message.contains("\"dev\""));

        let empty = SyncError::from(RegistryError::EmptyRegistry);
        assert_eq!(empty.to_notice().severity, Severity::Info);
    }
}
