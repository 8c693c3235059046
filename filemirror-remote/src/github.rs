//! Blocking GitHub REST client.
//!
//! One [`GithubClient`] is built per process from the stored token and handed
//! to every component that talks to the provider; nothing here is global.

use std::io::Read;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::RemoteError;
use crate::provider::{BranchHandle, CommitInfo, RemoteProvider, RepoHandle, UserHandle};

const API_VERSION: &str = "2022-11-28";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

/// Upper bound on a downloaded blob.
pub const MAX_BLOB_BYTES: u64 = 100 * 1024 * 1024;

pub struct GithubClient {
    agent: ureq::Agent,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    /// Client for `api_base` (e.g. `https://api.github.com`).
    ///
    /// `timeout` bounds every request end to end, including DNS and connect.
    pub fn new(api_base: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("filemirror/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            token,
        }
    }

    fn request(&self, path: &str, accept: &str) -> ureq::Request {
        let url = format!("{}{}", self.api_base, path);
        tracing::debug!("GET {url}");
        let request = self
            .agent
            .get(&url)
            .set("Accept", accept)
            .set("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        request: ureq::Request,
        not_found: impl FnOnce() -> RemoteError,
    ) -> Result<T, RemoteError> {
        call(request, not_found)?
            .into_json::<T>()
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// Send `request`, classifying failures.
///
/// 404 means the addressed object does not exist; `not_found` names which one.
fn call(
    request: ureq::Request,
    not_found: impl FnOnce() -> RemoteError,
) -> Result<ureq::Response, RemoteError> {
    match request.call() {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(404, _)) => Err(not_found()),
        Err(ureq::Error::Status(401, _)) => Err(RemoteError::BadCredentials),
        Err(ureq::Error::Status(status, response)) => Err(RemoteError::Api {
            status,
            message: api_message(response),
        }),
        Err(ureq::Error::Transport(transport)) => {
            Err(RemoteError::Unavailable(transport.to_string()))
        }
    }
}

fn api_message(response: ureq::Response) -> String {
    #[derive(Deserialize)]
    struct ApiErrorPayload {
        message: String,
    }
    let body = response.into_string().unwrap_or_default();
    serde_json::from_str::<ApiErrorPayload>(&body)
        .map(|p| p.message)
        .unwrap_or(body)
}

/// Percent-encode each segment of a repository path, keeping the slashes.
fn encode_path(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn repo_url(repo: &RepoHandle) -> String {
    format!(
        "/repos/{}/{}",
        urlencoding::encode(&repo.owner),
        urlencoding::encode(&repo.name)
    )
}

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RepoPayload {
    name: String,
    owner: LoginPayload,
}

#[derive(Deserialize)]
struct LoginPayload {
    login: String,
}

#[derive(Deserialize)]
struct CommitPayload {
    sha: String,
    commit: CommitDetailPayload,
}

#[derive(Deserialize)]
struct CommitDetailPayload {
    author: Option<SignaturePayload>,
    committer: Option<SignaturePayload>,
}

#[derive(Deserialize)]
struct SignaturePayload {
    date: DateTime<Utc>,
}

#[derive(Deserialize)]
struct BranchPayload {
    name: String,
    commit: BranchCommitPayload,
}

#[derive(Deserialize)]
struct BranchCommitPayload {
    sha: String,
}

impl TryFrom<CommitPayload> for CommitInfo {
    type Error = RemoteError;

    fn try_from(payload: CommitPayload) -> Result<Self, Self::Error> {
        let date = payload
            .commit
            .author
            .or(payload.commit.committer)
            .map(|s| s.date)
            .ok_or_else(|| RemoteError::Decode(format!("commit {} has no date", payload.sha)))?;
        Ok(CommitInfo {
            sha: payload.sha,
            authored_at: date,
        })
    }
}

// ---------------------------------------------------------------------------
// RemoteProvider
// ---------------------------------------------------------------------------

impl RemoteProvider for GithubClient {
    fn repository(&self, owner: &str, repo: &str) -> Result<RepoHandle, RemoteError> {
        let request = self.request(
            &format!("/repos/{}/{}", urlencoding::encode(owner), urlencoding::encode(repo)),
            JSON_MEDIA_TYPE,
        );
        let payload: RepoPayload = self.get_json(request, || RemoteError::RepoNotFound {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
        })?;
        Ok(RepoHandle {
            owner: payload.owner.login,
            name: payload.name,
        })
    }

    fn commits_touching(
        &self,
        repo: &RepoHandle,
        path: &str,
        branch: &str,
    ) -> Result<Vec<CommitInfo>, RemoteError> {
        let request = self
            .request(&format!("{}/commits", repo_url(repo)), JSON_MEDIA_TYPE)
            .query("path", path)
            .query("sha", branch)
            .query("per_page", "1");
        let branch_missing = || RemoteError::BranchNotFound {
            repo: repo.full_name(),
            branch: branch.to_owned(),
        };
        let payload: Vec<CommitPayload> = match self.get_json(request, branch_missing) {
            // An unknown `sha` is reported as 422 rather than 404.
            Err(RemoteError::Api { status: 422, .. }) => return Err(branch_missing()),
            other => other?,
        };
        payload.into_iter().map(CommitInfo::try_from).collect()
    }

    fn blob_content(
        &self,
        repo: &RepoHandle,
        path: &str,
        branch: &str,
    ) -> Result<Vec<u8>, RemoteError> {
        let request = self
            .request(
                &format!("{}/contents/{}", repo_url(repo), encode_path(path)),
                RAW_MEDIA_TYPE,
            )
            .query("ref", branch);
        let response = call(request, || RemoteError::PathNotFound {
            path: path.to_owned(),
            branch: branch.to_owned(),
        })?;
        read_bounded(response.into_reader(), MAX_BLOB_BYTES)
    }

    fn branch(&self, repo: &RepoHandle, branch: &str) -> Result<BranchHandle, RemoteError> {
        let request = self.request(
            &format!("{}/branches/{}", repo_url(repo), encode_path(branch)),
            JSON_MEDIA_TYPE,
        );
        let payload: BranchPayload = self.get_json(request, || RemoteError::BranchNotFound {
            repo: repo.full_name(),
            branch: branch.to_owned(),
        })?;
        Ok(BranchHandle {
            name: payload.name,
            head_sha: payload.commit.sha,
        })
    }

    fn user(&self, name: &str) -> Result<UserHandle, RemoteError> {
        let request = self.request(&format!("/users/{}", urlencoding::encode(name)), JSON_MEDIA_TYPE);
        let payload: LoginPayload = self.get_json(request, || RemoteError::UserNotFound {
            name: name.to_owned(),
        })?;
        Ok(UserHandle {
            login: payload.login,
        })
    }

    fn authenticated_user(&self) -> Result<UserHandle, RemoteError> {
        let request = self.request("/user", JSON_MEDIA_TYPE);
        let payload: LoginPayload = self.get_json(request, || RemoteError::BadCredentials)?;
        Ok(UserHandle {
            login: payload.login,
        })
    }
}

/// Read the whole body, failing instead of truncating past `limit` bytes.
fn read_bounded(reader: impl Read, limit: u64) -> Result<Vec<u8>, RemoteError> {
    let mut content = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut content)
        .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
    if content.len() as u64 > limit {
        return Err(RemoteError::Decode(format!(
            "blob is larger than the {limit} byte limit"
        )));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_blob_is_rejected_not_truncated() {
        let exact = read_bounded(std::io::repeat(b'a').take(16), 16).unwrap();
        assert_eq!(exact.len(), 16);

        let err = read_bounded(std::io::repeat(b'a').take(17), 16).unwrap_err();
        assert!(matches!(err, RemoteError::Decode(ref msg) if msg.contains("16 byte limit")));
    }

    #[test]
    fn path_segments_are_encoded_individually() {
        assert_eq!(encode_path("docs/my file.md"), "docs/my%20file.md");
        assert_eq!(encode_path("/src/main.rs"), "src/main.rs");
    }

    #[test]
    fn commit_date_prefers_author() {
        let payload: CommitPayload = serde_json::from_str(
            r#"{"sha":"abc","commit":{
                "author":{"date":"2024-03-01T10:00:00Z"},
                "committer":{"date":"2024-03-02T10:00:00Z"}}}"#,
        )
        .unwrap();
        let info = CommitInfo::try_from(payload).unwrap();
        assert_eq!(info.authored_at.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn unreachable_host_is_unavailable() {
        // Port 9 (discard) on localhost is closed in CI sandboxes.
        let client = GithubClient::new("http://127.0.0.1:9", None, Duration::from_secs(2));
        let err = client.user("anyone").unwrap_err();
        assert!(err.is_unavailable(), "got: {err}");
    }
}
