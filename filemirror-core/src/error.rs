//! Error types for filemirror-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::RemoteFile;

/// All errors that can arise from registry, config, and credential storage.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A registry line could not be parsed into an entry.
    #[error("failed to parse registry at {path}, line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// `config.yaml` exists but is not valid.
    #[error("failed to parse config at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The registry has no entries (file missing or empty) on a listing.
    #[error("no files are currently being tracked")]
    EmptyRegistry,

    /// A mutation or lookup found no backing store, or an empty one.
    #[error("no files were being tracked")]
    NothingTracked,

    /// No entry matches the requested key.
    #[error("file \"{key}\" is not tracked")]
    NotFound { key: RemoteFile },

    /// An entry with the same key is already registered.
    #[error("file \"{key}\" is already tracked")]
    AlreadyTracked { key: RemoteFile },

    /// A field cannot be stored in a registry record.
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.filemirror/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Failure to parse a web link into a remote file address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("wrong link format: {link:?} (expected https://<host>/<owner>/<repo>/blob/<branch>/<path>)")]
    Malformed { link: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}
