//! Domain types for the tracked-file registry.
//!
//! All path fields use `PathBuf`; remote addresses are plain strings because
//! they are never touched by the local filesystem.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

// ---------------------------------------------------------------------------
// RemoteFile
// ---------------------------------------------------------------------------

/// Address of one file inside a remote repository.
///
/// The four fields together form the logical key of a tracked entry.
/// Equality is structural, so `("ab", "c", ..)` and `("a", "bc", ..)` are
/// distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteFile {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Slash-separated path inside the repository.
    pub path: String,
}

impl RemoteFile {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
            path: path.into(),
        }
    }

    /// `owner/repo`
    pub fn full_repo_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Last segment of the remote path; the name the file is stored under.
    pub fn file_name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.path)
    }
}

/// Registry lookups and removals match on the remote address alone.
pub type EntryKey = RemoteFile;

impl fmt::Display for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}:{}", self.owner, self.repo, self.branch, self.path)
    }
}

// ---------------------------------------------------------------------------
// TrackedEntry
// ---------------------------------------------------------------------------

/// One registry row: a remote file and where its local copy is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntry {
    pub file: RemoteFile,
    /// Directory the fetched content is written into. May be missing at
    /// lookup time, in which case the fallback location is used.
    pub location: PathBuf,
}

impl TrackedEntry {
    pub fn new(file: RemoteFile, location: impl Into<PathBuf>) -> Self {
        Self {
            file,
            location: location.into(),
        }
    }

    pub fn key(&self) -> &RemoteFile {
        &self.file
    }

    /// Serialize to one registry record (no trailing newline).
    ///
    /// Fields are tab-separated in the order `owner repo branch path location`.
    pub fn to_record(&self) -> Result<String, RegistryError> {
        let location = self.location.to_str().ok_or_else(|| RegistryError::InvalidField {
            field: "location",
            value: self.location.display().to_string(),
            reason: "path is not valid UTF-8",
        })?;
        check_field("owner", &self.file.owner)?;
        check_field("repo", &self.file.repo)?;
        check_field("branch", &self.file.branch)?;
        check_field("path", &self.file.path)?;
        check_field("location", location)?;
        Ok(format!(
            "{}\t{}\t{}\t{}\t{}",
            self.file.owner, self.file.repo, self.file.branch, self.file.path, location
        ))
    }

    /// Parse one registry record.
    ///
    /// Tab-separated records are the current format. Lines without a tab are
    /// read as whitespace-separated, which is how older stores were written.
    pub fn from_record(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = if line.contains('\t') {
            line.split('\t').collect()
        } else {
            line.split_whitespace().collect()
        };
        match fields.as_slice() {
            [owner, repo, branch, path, location]
                if fields.iter().all(|f| !f.is_empty()) =>
            {
                Ok(Self::new(
                    RemoteFile::new(*owner, *repo, *branch, *path),
                    Path::new(location),
                ))
            }
            _ => Err(format!("expected 5 fields, found {}", fields.len())),
        }
    }
}

fn check_field(field: &'static str, value: &str) -> Result<(), RegistryError> {
    let reason = if value.is_empty() {
        "must not be empty"
    } else if value.contains(['\t', '\n', '\r']) {
        "must not contain tabs or line breaks"
    } else {
        return Ok(());
    };
    Err(RegistryError::InvalidField {
        field,
        value: value.to_owned(),
        reason,
    })
}
