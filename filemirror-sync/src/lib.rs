//! # filemirror-sync
//!
//! Staleness decisions, atomic fetches, and the coordinator that drives them
//! over the registry.
//!
//! Build one [`SyncCoordinator`] per process from a shared [`Registry`] and
//! provider handle; both the CLI and the daemon go through it.
//!
//! [`Registry`]: filemirror_core::Registry

pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod staleness;

pub use coordinator::{FileOutcome, FileReport, SyncCoordinator, SyncSummary, TrackOutcome};
pub use error::SyncError;
pub use fetcher::{Fetcher, WriteOutcome};
pub use staleness::{Staleness, StalenessOracle};
