//! In-process provider.
//!
//! Holds users, repositories, branches, and per-file commit histories in
//! memory. Used by the test suites of every crate, and usable as an offline
//! stand-in anywhere a [`RemoteProvider`] is expected.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use filemirror_core::RemoteFile;

use crate::error::RemoteError;
use crate::provider::{BranchHandle, CommitInfo, RemoteProvider, RepoHandle, UserHandle};

#[derive(Debug, Default)]
pub struct MemoryProvider {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    login: Option<String>,
    users: BTreeSet<String>,
    repos: HashMap<(String, String), HashMap<String, BranchState>>,
    offline: bool,
    unreachable: BTreeSet<(String, String)>,
    next_sha: u64,
    commit_queries: usize,
    blob_fetches: usize,
}

#[derive(Debug, Default)]
struct BranchState {
    files: HashMap<String, FileState>,
}

#[derive(Debug, Default)]
struct FileState {
    content: Vec<u8>,
    /// Newest first.
    commits: Vec<CommitInfo>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider authenticated as `login`.
    pub fn with_login(login: impl Into<String>) -> Self {
        let provider = Self::default();
        {
            let mut state = provider.state();
            let login = login.into();
            state.users.insert(login.clone());
            state.login = Some(login);
        }
        provider
    }

    /// Commit new `content` for `file`, authored at `authored_at`.
    ///
    /// Creates the owner, repository, and branch as needed.
    pub fn put_file(&self, file: &RemoteFile, content: impl Into<Vec<u8>>, authored_at: DateTime<Utc>) {
        let mut state = self.state();
        state.next_sha += 1;
        let sha = format!("{:040x}", state.next_sha);
        state.users.insert(file.owner.clone());
        let entry = state
            .repos
            .entry((file.owner.clone(), file.repo.clone()))
            .or_default()
            .entry(file.branch.clone())
            .or_default()
            .files
            .entry(file.path.clone())
            .or_default();
        entry.content = content.into();
        entry.commits.insert(0, CommitInfo { sha, authored_at });
    }

    /// Create an empty branch.
    pub fn add_branch(&self, owner: &str, repo: &str, branch: &str) {
        let mut state = self.state();
        state.users.insert(owner.to_owned());
        state
            .repos
            .entry((owner.to_owned(), repo.to_owned()))
            .or_default()
            .entry(branch.to_owned())
            .or_default();
    }

    /// While offline every call fails with [`RemoteError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// While unreachable, calls scoped to `owner/repo` fail with
    /// [`RemoteError::Unavailable`]; other repositories keep answering.
    pub fn set_repo_unreachable(&self, owner: &str, repo: &str, unreachable: bool) {
        let key = (owner.to_owned(), repo.to_owned());
        let mut state = self.state();
        if unreachable {
            state.unreachable.insert(key);
        } else {
            state.unreachable.remove(&key);
        }
    }

    /// Number of commit-history queries served.
    pub fn commit_queries(&self) -> usize {
        self.state().commit_queries
    }

    /// Number of blob downloads served.
    pub fn blob_fetches(&self) -> usize {
        self.state().blob_fetches
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryState {
    fn online(&self) -> Result<(), RemoteError> {
        if self.offline {
            return Err(RemoteError::Unavailable("memory provider is offline".into()));
        }
        Ok(())
    }

    fn reachable(&self, owner: &str, repo: &str) -> Result<(), RemoteError> {
        self.online()?;
        if self.unreachable.contains(&(owner.to_owned(), repo.to_owned())) {
            return Err(RemoteError::Unavailable(format!("{owner}/{repo} is unreachable")));
        }
        Ok(())
    }

    fn branch(&self, repo: &RepoHandle, branch: &str) -> Result<&BranchState, RemoteError> {
        self.repos
            .get(&(repo.owner.clone(), repo.name.clone()))
            .ok_or_else(|| RemoteError::RepoNotFound {
                owner: repo.owner.clone(),
                repo: repo.name.clone(),
            })?
            .get(branch)
            .ok_or_else(|| RemoteError::BranchNotFound {
                repo: repo.full_name(),
                branch: branch.to_owned(),
            })
    }

    fn file(&self, repo: &RepoHandle, path: &str, branch: &str) -> Result<&FileState, RemoteError> {
        self.branch(repo, branch)?
            .files
            .get(path)
            .ok_or_else(|| RemoteError::PathNotFound {
                path: path.to_owned(),
                branch: branch.to_owned(),
            })
    }
}

impl RemoteProvider for MemoryProvider {
    fn repository(&self, owner: &str, repo: &str) -> Result<RepoHandle, RemoteError> {
        let state = self.state();
        state.reachable(owner, repo)?;
        if !state.repos.contains_key(&(owner.to_owned(), repo.to_owned())) {
            return Err(RemoteError::RepoNotFound {
                owner: owner.to_owned(),
                repo: repo.to_owned(),
            });
        }
        Ok(RepoHandle {
            owner: owner.to_owned(),
            name: repo.to_owned(),
        })
    }

    fn commits_touching(
        &self,
        repo: &RepoHandle,
        path: &str,
        branch: &str,
    ) -> Result<Vec<CommitInfo>, RemoteError> {
        let mut state = self.state();
        state.reachable(&repo.owner, &repo.name)?;
        state.commit_queries += 1;
        let branch_state = state.branch(repo, branch)?;
        Ok(branch_state
            .files
            .get(path)
            .map(|f| f.commits.clone())
            .unwrap_or_default())
    }

    fn blob_content(
        &self,
        repo: &RepoHandle,
        path: &str,
        branch: &str,
    ) -> Result<Vec<u8>, RemoteError> {
        let mut state = self.state();
        state.reachable(&repo.owner, &repo.name)?;
        let content = state.file(repo, path, branch)?.content.clone();
        state.blob_fetches += 1;
        Ok(content)
    }

    fn branch(&self, repo: &RepoHandle, branch: &str) -> Result<BranchHandle, RemoteError> {
        let state = self.state();
        state.reachable(&repo.owner, &repo.name)?;
        let head_sha = state
            .branch(repo, branch)?
            .files
            .values()
            .filter_map(|f| f.commits.first())
            .max_by_key(|c| c.authored_at)
            .map(|c| c.sha.clone())
            .unwrap_or_default();
        Ok(BranchHandle {
            name: branch.to_owned(),
            head_sha,
        })
    }

    fn user(&self, name: &str) -> Result<UserHandle, RemoteError> {
        let state = self.state();
        state.online()?;
        if !state.users.contains(name) {
            return Err(RemoteError::UserNotFound {
                name: name.to_owned(),
            });
        }
        Ok(UserHandle {
            login: name.to_owned(),
        })
    }

    fn authenticated_user(&self) -> Result<UserHandle, RemoteError> {
        let state = self.state();
        state.online()?;
        state
            .login
            .clone()
            .map(|login| UserHandle { login })
            .ok_or(RemoteError::BadCredentials)
    }
}
