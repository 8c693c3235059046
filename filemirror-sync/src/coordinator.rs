//! Registry + oracle + fetcher, driven together.
//!
//! Entries are processed one at a time in stored order, so at most one
//! provider request is in flight per coordinator.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use filemirror_core::link::format_link;
use filemirror_core::{Notice, Registry, RegistryError, RemoteFile, TrackedEntry};
use filemirror_remote::{validate_address, RemoteError, RemoteProvider};

use crate::error::SyncError;
use crate::fetcher::{Fetcher, WriteOutcome};
use crate::staleness::{Staleness, StalenessOracle};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of syncing one entry.
#[derive(Debug)]
pub enum FileOutcome {
    /// The local copy was stale (or missing) and has been re-fetched.
    Updated(WriteOutcome),
    UpToDate,
    /// Upstream could not be consulted; the local copy was left alone.
    Unverified(RemoteError),
    /// A fetch was needed and failed.
    Failed(SyncError),
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, FileOutcome::Unverified(_) | FileOutcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct FileReport {
    pub entry: TrackedEntry,
    pub outcome: FileOutcome,
}

impl FileReport {
    /// One user-facing line for this entry; `host` is used to print its link.
    pub fn notice(&self, host: &str) -> Notice {
        let link = format_link(host, &self.entry.file);
        match &self.outcome {
            FileOutcome::Updated(write) => write_notice(&link, write),
            FileOutcome::UpToDate => Notice::info(format!("{link} is already up to date")),
            FileOutcome::Unverified(e) if e.is_unavailable() => {
                Notice::warning(format!("could not check {link}: {e}"))
            }
            FileOutcome::Unverified(e) => Notice::error(format!("could not check {link}: {e}")),
            FileOutcome::Failed(e) => {
                let notice = e.to_notice();
                Notice::new(notice.severity, format!("{link}: {}", notice.message))
            }
        }
    }
}

/// Notice for a completed write of the file behind `link`.
pub fn write_notice(link: &str, write: &WriteOutcome) -> Notice {
    match write {
        WriteOutcome::WrittenAtRequestedLocation { path } => {
            Notice::success(format!("{link} updated at {}", path.display()))
        }
        WriteOutcome::WrittenAtFallbackLocation { path, requested } => Notice::info(format!(
            "{} is not a directory; {link} saved to {}",
            requested.display(),
            path.display()
        )),
    }
}

/// Per-pass counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub updated: usize,
    pub up_to_date: usize,
    pub unverified: usize,
    pub failed: usize,
}

impl SyncSummary {
    pub fn from_reports(reports: &[FileReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            match report.outcome {
                FileOutcome::Updated(_) => summary.updated += 1,
                FileOutcome::UpToDate => summary.up_to_date += 1,
                FileOutcome::Unverified(_) => summary.unverified += 1,
                FileOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.updated + self.up_to_date + self.unverified + self.failed
    }
}

/// Result of [`SyncCoordinator::track`]: the registration always stands once
/// returned, the initial fetch may still have failed.
#[derive(Debug)]
pub struct TrackOutcome {
    pub entry: TrackedEntry,
    pub fetch: Result<WriteOutcome, SyncError>,
}

// ---------------------------------------------------------------------------
// SyncCoordinator
// ---------------------------------------------------------------------------

pub struct SyncCoordinator {
    registry: Arc<Registry>,
    provider: Arc<dyn RemoteProvider>,
    oracle: StalenessOracle,
    fetcher: Fetcher,
}

impl SyncCoordinator {
    pub fn new(
        registry: Arc<Registry>,
        provider: Arc<dyn RemoteProvider>,
        fallback_dir: impl Into<PathBuf>,
    ) -> Self {
        let fallback_dir = fallback_dir.into();
        Self {
            oracle: StalenessOracle::new(Arc::clone(&provider), fallback_dir.clone()),
            fetcher: Fetcher::new(Arc::clone(&provider), fallback_dir),
            registry,
            provider,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn provider(&self) -> &dyn RemoteProvider {
        self.provider.as_ref()
    }

    pub fn oracle(&self) -> &StalenessOracle {
        &self.oracle
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    // -----------------------------------------------------------------------
    // Sync
    // -----------------------------------------------------------------------

    /// Re-fetch `entry` if the oracle says it is stale.
    pub fn sync_one(&self, entry: &TrackedEntry) -> FileOutcome {
        match self.oracle.check(entry) {
            Staleness::Current { .. } => FileOutcome::UpToDate,
            Staleness::Unverified(e) => FileOutcome::Unverified(e),
            Staleness::Missing { .. } | Staleness::Stale { .. } => {
                match self.fetcher.fetch(&entry.file, &entry.location) {
                    Ok(write) => FileOutcome::Updated(write),
                    Err(e) => {
                        tracing::warn!("{}: fetch failed: {e}", entry.file);
                        FileOutcome::Failed(e)
                    }
                }
            }
        }
    }

    /// [`sync_one`](Self::sync_one) on the tracked entry keyed by `key`.
    pub fn sync_key(&self, key: &RemoteFile) -> Result<FileReport, SyncError> {
        let entry = self.lookup(key)?;
        let outcome = self.sync_one(&entry);
        Ok(FileReport { entry, outcome })
    }

    /// Sync every tracked entry in stored order.
    ///
    /// Per-entry failures are collected, never short-circuited. Fails only
    /// when the registry itself cannot be listed.
    pub fn sync_all(&self) -> Result<Vec<FileReport>, SyncError> {
        self.sync_all_until(&AtomicBool::new(false))
    }

    /// Like [`sync_all`](Self::sync_all), but stops at the next entry
    /// boundary once `stop` is set. Entries not reached are not reported.
    pub fn sync_all_until(&self, stop: &AtomicBool) -> Result<Vec<FileReport>, SyncError> {
        let entries = self.registry.list_entries()?;
        let mut reports = Vec::with_capacity(entries.len());
        for entry in entries {
            if stop.load(Ordering::SeqCst) {
                tracing::info!("sync pass cancelled after {} entries", reports.len());
                break;
            }
            let outcome = self.sync_one(&entry);
            reports.push(FileReport { entry, outcome });
        }
        Ok(reports)
    }

    /// Fetch the tracked entry keyed by `key` unconditionally.
    pub fn update(&self, key: &RemoteFile) -> Result<WriteOutcome, SyncError> {
        let location = self.registry.find_location(key)?;
        self.fetcher.fetch(key, &location)
    }

    /// Verdict for every tracked entry, without fetching anything.
    pub fn status(&self) -> Result<Vec<(TrackedEntry, Staleness)>, SyncError> {
        Ok(self
            .registry
            .list_entries()?
            .into_iter()
            .map(|entry| {
                let verdict = self.oracle.check(&entry);
                (entry, verdict)
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Validate `file`, register it, then fetch it once.
    pub fn track(&self, file: RemoteFile, location: &Path) -> Result<TrackOutcome, SyncError> {
        validate_address(self.provider.as_ref(), &file)?;
        let entry = TrackedEntry::new(file, location);
        self.registry.add_entry(&entry)?;
        tracing::info!("tracking {} at {}", entry.file, location.display());
        let fetch = self.fetcher.fetch(&entry.file, &entry.location);
        Ok(TrackOutcome { entry, fetch })
    }

    /// Validate and fetch `file` without touching the registry.
    pub fn download(&self, file: &RemoteFile, location: &Path) -> Result<WriteOutcome, SyncError> {
        validate_address(self.provider.as_ref(), file)?;
        self.fetcher.fetch(file, location)
    }

    /// Stop tracking `key`. Returns the entry's former position.
    pub fn untrack(&self, key: &RemoteFile) -> Result<usize, SyncError> {
        self.registry
            .remove_entry(key)?
            .ok_or_else(|| RegistryError::NotFound { key: key.clone() }.into())
    }

    pub fn untrack_all(&self) -> Result<(), SyncError> {
        Ok(self.registry.remove_all()?)
    }

    fn lookup(&self, key: &RemoteFile) -> Result<TrackedEntry, SyncError> {
        let location = self.registry.find_location(key)?;
        Ok(TrackedEntry::new(key.clone(), location))
    }
}
