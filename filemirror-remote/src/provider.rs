//! Provider capability set.

use chrono::{DateTime, Utc};
use serde::Serialize;

use filemirror_core::RemoteFile;

use crate::error::RemoteError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoHandle {
    pub owner: String,
    pub name: String,
}

impl RepoHandle {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHandle {
    pub name: String,
    pub head_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserHandle {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub sha: String,
    pub authored_at: DateTime<Utc>,
}

/// Everything the sync engine asks of a remote repository provider.
///
/// Implementations must be blocking and bounded: every call either returns
/// or fails within the client's own timeout, surfacing connectivity
/// problems as [`RemoteError::Unavailable`].
pub trait RemoteProvider: Send + Sync {
    fn repository(&self, owner: &str, repo: &str) -> Result<RepoHandle, RemoteError>;

    /// Commits touching `path` on `branch`, newest first.
    fn commits_touching(
        &self,
        repo: &RepoHandle,
        path: &str,
        branch: &str,
    ) -> Result<Vec<CommitInfo>, RemoteError>;

    fn blob_content(
        &self,
        repo: &RepoHandle,
        path: &str,
        branch: &str,
    ) -> Result<Vec<u8>, RemoteError>;

    fn branch(&self, repo: &RepoHandle, branch: &str) -> Result<BranchHandle, RemoteError>;

    fn user(&self, name: &str) -> Result<UserHandle, RemoteError>;

    /// The account the client is authenticated as.
    fn authenticated_user(&self) -> Result<UserHandle, RemoteError>;

    /// Most recent commit touching `file`.
    ///
    /// A path with no commits on the branch does not exist there.
    fn latest_commit(&self, file: &RemoteFile) -> Result<CommitInfo, RemoteError> {
        let repo = self.repository(&file.owner, &file.repo)?;
        self.commits_touching(&repo, &file.path, &file.branch)?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::PathNotFound {
                path: file.path.clone(),
                branch: file.branch.clone(),
            })
    }

    /// Raw content of `file` at the head of its branch.
    fn fetch_blob(&self, file: &RemoteFile) -> Result<Vec<u8>, RemoteError> {
        let repo = self.repository(&file.owner, &file.repo)?;
        self.blob_content(&repo, &file.path, &file.branch)
    }
}
