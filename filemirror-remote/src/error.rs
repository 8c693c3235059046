//! Error types for filemirror-remote.

use thiserror::Error;

/// Classified remote failure. Not-found variants name the exact address
/// component that was wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("user \"{name}\" does not exist")]
    UserNotFound { name: String },

    #[error("repository \"{owner}/{repo}\" does not exist")]
    RepoNotFound { owner: String, repo: String },

    #[error("branch \"{branch}\" does not exist in repository \"{repo}\"")]
    BranchNotFound { repo: String, branch: String },

    #[error("file \"{path}\" does not exist in branch \"{branch}\"")]
    PathNotFound { path: String, branch: String },

    /// Network or connectivity failure, including timeouts.
    #[error("no connection with the remote provider: {0}")]
    Unavailable(String),

    #[error("invalid access token")]
    BadCredentials,

    #[error("remote provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response from remote provider: {0}")]
    Decode(String),
}

impl RemoteError {
    /// The address (user, repository, branch, or path) resolves to nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RemoteError::UserNotFound { .. }
                | RemoteError::RepoNotFound { .. }
                | RemoteError::BranchNotFound { .. }
                | RemoteError::PathNotFound { .. }
        )
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }
}
