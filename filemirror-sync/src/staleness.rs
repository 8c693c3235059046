//! Per-entry staleness decision.
//!
//! Verdict precedence:
//! 1. `Missing` (the entry's location is gone, or no local copy at the
//!    resolved target); the remote is not consulted
//! 2. `Unverified` (remote lookup failed; treated as not stale)
//! 3. `Stale` (latest remote commit strictly newer than the local mtime)
//! 4. `Current`

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use filemirror_core::TrackedEntry;
use filemirror_remote::{RemoteError, RemoteProvider};

use crate::fetcher::resolve_target;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    Missing { path: PathBuf },
    Stale {
        remote: DateTime<Utc>,
        local: DateTime<Utc>,
    },
    Current {
        remote: DateTime<Utc>,
        local: DateTime<Utc>,
    },
    /// The remote side could not be consulted.
    Unverified(RemoteError),
}

impl Staleness {
    /// Whether the local copy must be refreshed.
    pub fn is_stale(&self) -> bool {
        matches!(self, Staleness::Missing { .. } | Staleness::Stale { .. })
    }
}

pub struct StalenessOracle {
    provider: Arc<dyn RemoteProvider>,
    fallback_dir: PathBuf,
}

impl StalenessOracle {
    /// `fallback_dir` must match the fetcher's so both look at the same file.
    pub fn new(provider: Arc<dyn RemoteProvider>, fallback_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            fallback_dir: fallback_dir.into(),
        }
    }

    /// Local file the entry's content is stored in.
    pub fn target_path(&self, entry: &TrackedEntry) -> PathBuf {
        resolve_target(&entry.file, &entry.location, &self.fallback_dir).0
    }

    pub fn check(&self, entry: &TrackedEntry) -> Staleness {
        if !entry.location.exists() {
            tracing::debug!("{}: location {} is gone", entry.file, entry.location.display());
            return Staleness::Missing {
                path: entry.location.clone(),
            };
        }

        let target = self.target_path(entry);
        let Some(local) = modified_at(&target) else {
            tracing::debug!("{}: no local copy at {}", entry.file, target.display());
            return Staleness::Missing { path: target };
        };

        let remote = match self.provider.latest_commit(&entry.file) {
            Ok(commit) => commit.authored_at,
            Err(e) => {
                tracing::warn!("{}: cannot check upstream: {e}", entry.file);
                return Staleness::Unverified(e);
            }
        };

        if remote > local {
            tracing::debug!("{}: stale (remote {remote}, local {local})", entry.file);
            Staleness::Stale { remote, local }
        } else {
            tracing::debug!("{}: current", entry.file);
            Staleness::Current { remote, local }
        }
    }

    pub fn is_stale(&self, entry: &TrackedEntry) -> bool {
        self.check(entry).is_stale()
    }
}

/// Last modification time, or `None` when there is nothing readable to compare.
fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(mtime) => Some(DateTime::<Utc>::from(mtime)),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            tracing::debug!("cannot stat {}: {e}", path.display());
            None
        }
    }
}
