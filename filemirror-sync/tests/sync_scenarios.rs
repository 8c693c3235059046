use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use filemirror_core::{Registry, RegistryError, RemoteFile, TrackedEntry};
use filemirror_remote::{MemoryProvider, RemoteError};
use filemirror_sync::{
    FileOutcome, Staleness, SyncCoordinator, SyncError, SyncSummary, WriteOutcome,
};
use filetime::{set_file_mtime, FileTime};
use tempfile::TempDir;

struct Fixture {
    home: TempDir,
    provider: Arc<MemoryProvider>,
    coordinator: SyncCoordinator,
}

fn fixture() -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let home = TempDir::new().expect("home");
    let provider = Arc::new(MemoryProvider::with_login("me"));
    let registry = Arc::new(Registry::open_at(home.path()));
    let coordinator = SyncCoordinator::new(registry, provider.clone(), home.path().join("downloaded"));
    Fixture {
        home,
        provider,
        coordinator,
    }
}

fn hours_ago(hours: u64) -> SystemTime {
    SystemTime::now() - Duration::from_secs(hours * 60 * 60)
}

fn set_mtime(path: &Path, at: SystemTime) {
    set_file_mtime(path, FileTime::from_system_time(at)).expect("set mtime");
}

// ---------------------------------------------------------------------------
// Staleness
// ---------------------------------------------------------------------------

#[test]
fn newer_remote_commit_is_stale_and_gets_fetched() {
    let fx = fixture();
    let location = fx.home.path().join("x");
    fs::create_dir_all(&location).expect("mkdir");

    let file = RemoteFile::new("o", "r", "main", "a/b.txt");
    fx.provider
        .put_file(&file, "upstream v2\n", DateTime::<Utc>::from(hours_ago(1)));
    let local = location.join("b.txt");
    fs::write(&local, "local v1\n").expect("write");
    set_mtime(&local, hours_ago(5));

    let entry = TrackedEntry::new(file, &location);
    fx.coordinator.registry().add_entry(&entry).expect("add");

    assert!(fx.coordinator.oracle().is_stale(&entry));
    let outcome = fx.coordinator.sync_one(&entry);
    match outcome {
        FileOutcome::Updated(WriteOutcome::WrittenAtRequestedLocation { path }) => {
            assert_eq!(path, local)
        }
        other => panic!("expected updated, got {other:?}"),
    }
    assert_eq!(fx.provider.blob_fetches(), 1);
    assert_eq!(fs::read_to_string(&local).expect("read"), "upstream v2\n");

    // The fresh write is newer than the commit, so the next pass is a no-op.
    assert!(matches!(fx.coordinator.sync_one(&entry), FileOutcome::UpToDate));
    assert_eq!(fx.provider.blob_fetches(), 1);
}

#[test]
fn equal_timestamps_are_not_stale() {
    let fx = fixture();
    let file = RemoteFile::new("o", "r", "main", "eq.txt");
    let at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    fx.provider.put_file(&file, "x", DateTime::<Utc>::from(at));
    fs::write(fx.home.path().join("eq.txt"), "x").expect("write");
    set_mtime(&fx.home.path().join("eq.txt"), at);

    let verdict = fx
        .coordinator
        .oracle()
        .check(&TrackedEntry::new(file, fx.home.path()));
    assert!(matches!(verdict, Staleness::Current { .. }), "got {verdict:?}");
}

#[test]
fn remote_failure_is_unverified_not_stale() {
    let fx = fixture();
    let file = RemoteFile::new("o", "r", "main", "a.txt");
    fx.provider.put_file(&file, "x", Utc::now());
    fs::write(fx.home.path().join("a.txt"), "x").expect("write");
    set_mtime(&fx.home.path().join("a.txt"), hours_ago(10));
    fx.provider.set_offline(true);

    let entry = TrackedEntry::new(file, fx.home.path());
    let verdict = fx.coordinator.oracle().check(&entry);
    assert!(matches!(verdict, Staleness::Unverified(RemoteError::Unavailable(_))));
    assert!(!verdict.is_stale());

    let gone = TrackedEntry::new(RemoteFile::new("o", "r", "main", "missing.txt"), fx.home.path());
    fs::write(fx.home.path().join("missing.txt"), "x").expect("write");
    fx.provider.set_offline(false);
    assert!(matches!(
        fx.coordinator.oracle().check(&gone),
        Staleness::Unverified(RemoteError::PathNotFound { .. })
    ));
}

#[test]
fn gone_location_is_stale_even_with_fresh_fallback_copy() {
    let fx = fixture();
    let file = RemoteFile::new("o", "r", "main", "a/b.txt");
    fx.provider
        .put_file(&file, "upstream\n", DateTime::<Utc>::from(hours_ago(2)));

    let fallback = fx.home.path().join("downloaded");
    fs::create_dir_all(&fallback).expect("mkdir");
    fs::write(fallback.join("b.txt"), "older fetch\n").expect("write");

    let location = fx.home.path().join("no/such/dir");
    let entry = TrackedEntry::new(file, &location);
    assert_eq!(
        fx.coordinator.oracle().check(&entry),
        Staleness::Missing {
            path: location.clone()
        }
    );
    assert_eq!(fx.provider.commit_queries(), 0);

    match fx.coordinator.sync_one(&entry) {
        FileOutcome::Updated(WriteOutcome::WrittenAtFallbackLocation { path, .. }) => {
            assert_eq!(path, fallback.join("b.txt"))
        }
        other => panic!("expected fallback update, got {other:?}"),
    }
    assert_eq!(fx.provider.blob_fetches(), 1);
    assert_eq!(
        fs::read_to_string(fallback.join("b.txt")).expect("read"),
        "upstream\n"
    );
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

#[test]
fn nonexistent_location_falls_back_to_download_dir() {
    let fx = fixture();
    let file = RemoteFile::new("o", "r", "main", "deep/nested/notes.md");
    fx.provider.put_file(&file, "# notes\n", Utc::now());

    let requested = fx.home.path().join("does/not/exist");
    let outcome = fx.coordinator.fetcher().fetch(&file, &requested).expect("fetch");

    let expected = fx.home.path().join("downloaded").join("notes.md");
    assert_eq!(
        outcome,
        WriteOutcome::WrittenAtFallbackLocation {
            path: expected.clone(),
            requested: requested.clone(),
        }
    );
    assert_eq!(fs::read_to_string(expected).expect("read"), "# notes\n");
    assert!(!requested.exists());
}

#[test]
fn update_fetches_even_when_current() {
    let fx = fixture();
    let file = RemoteFile::new("o", "r", "main", "a.txt");
    fx.provider
        .put_file(&file, "remote", DateTime::<Utc>::from(hours_ago(48)));
    fs::write(fx.home.path().join("a.txt"), "edited locally").expect("write");
    fx.coordinator
        .registry()
        .add_entry(&TrackedEntry::new(file.clone(), fx.home.path()))
        .expect("add");

    fx.coordinator.update(&file).expect("update");
    assert_eq!(
        fs::read_to_string(fx.home.path().join("a.txt")).expect("read"),
        "remote"
    );

    let err = fx
        .coordinator
        .update(&RemoteFile::new("o", "r", "main", "other.txt"))
        .unwrap_err();
    assert!(matches!(err, SyncError::Registry(RegistryError::NotFound { .. })));
}

// ---------------------------------------------------------------------------
// Bulk
// ---------------------------------------------------------------------------

#[test]
fn sync_all_reports_each_entry_independently() {
    let fx = fixture();
    let ok_a = RemoteFile::new("o", "r", "main", "one.txt");
    let ok_c = RemoteFile::new("o", "r", "main", "three.txt");
    fx.provider.put_file(&ok_a, "1", Utc::now());
    fx.provider.put_file(&ok_c, "3", Utc::now());
    let unreachable = RemoteFile::new("o", "gone", "main", "two.txt");

    let registry = fx.coordinator.registry();
    for file in [&ok_a, &unreachable, &ok_c] {
        registry
            .add_entry(&TrackedEntry::new(file.clone(), fx.home.path()))
            .expect("add");
    }

    let reports = fx.coordinator.sync_all().expect("sync all");
    assert_eq!(reports.len(), 3);
    assert!(matches!(reports[0].outcome, FileOutcome::Updated(_)));
    assert!(matches!(
        &reports[1].outcome,
        FileOutcome::Failed(e) if e.is_remote_not_found()
    ));
    assert!(matches!(reports[2].outcome, FileOutcome::Updated(_)));
    assert_eq!(reports[2].entry.file, ok_c);

    let summary = SyncSummary::from_reports(&reports);
    assert_eq!((summary.updated, summary.failed), (2, 1));
}

#[test]
fn unreachable_entry_mid_batch_is_unverified_and_neighbours_update() {
    let fx = fixture();
    let ok_a = RemoteFile::new("o", "r", "main", "one.txt");
    let down = RemoteFile::new("o", "mirror", "main", "two.txt");
    let ok_c = RemoteFile::new("o", "r", "main", "three.txt");
    fx.provider.put_file(&ok_a, "1", Utc::now());
    fx.provider.put_file(&down, "2", Utc::now());
    fx.provider.put_file(&ok_c, "3", Utc::now());

    let local_two = fx.home.path().join("two.txt");
    fs::write(&local_two, "local 2").expect("write");
    set_mtime(&local_two, hours_ago(24));
    fx.provider.set_repo_unreachable("o", "mirror", true);

    let registry = fx.coordinator.registry();
    for file in [&ok_a, &down, &ok_c] {
        registry
            .add_entry(&TrackedEntry::new(file.clone(), fx.home.path()))
            .expect("add");
    }

    let reports = fx.coordinator.sync_all().expect("sync all");
    assert_eq!(reports.len(), 3);
    assert!(matches!(reports[0].outcome, FileOutcome::Updated(_)));
    assert!(matches!(
        reports[1].outcome,
        FileOutcome::Unverified(RemoteError::Unavailable(_))
    ));
    assert!(matches!(reports[2].outcome, FileOutcome::Updated(_)));
    assert_eq!(fs::read_to_string(&local_two).expect("read"), "local 2");

    let summary = SyncSummary::from_reports(&reports);
    assert_eq!((summary.updated, summary.unverified, summary.failed), (2, 1, 0));
}

#[test]
fn sync_all_on_empty_registry_is_empty_registry_error() {
    let fx = fixture();
    let err = fx.coordinator.sync_all().unwrap_err();
    assert!(matches!(err, SyncError::Registry(RegistryError::EmptyRegistry)));
}

#[test]
fn preset_stop_flag_skips_every_entry() {
    let fx = fixture();
    let file = RemoteFile::new("o", "r", "main", "a.txt");
    fx.provider.put_file(&file, "x", Utc::now());
    fx.coordinator
        .registry()
        .add_entry(&TrackedEntry::new(file, fx.home.path()))
        .expect("add");

    let reports = fx
        .coordinator
        .sync_all_until(&AtomicBool::new(true))
        .expect("sync");
    assert!(reports.is_empty());
    assert_eq!(fx.provider.commit_queries(), 0);
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[test]
fn track_validates_registers_and_fetches() {
    let fx = fixture();
    let file = RemoteFile::new("o", "r", "main", "src/lib.rs");
    fx.provider.put_file(&file, "pub fn f() {}\n", Utc::now());

    let tracked = fx.coordinator.track(file.clone(), fx.home.path()).expect("track");
    assert!(tracked.fetch.is_ok());
    assert!(fx.home.path().join("lib.rs").exists());
    assert_eq!(
        fx.coordinator.registry().list_entries().expect("list"),
        vec![TrackedEntry::new(file.clone(), fx.home.path())]
    );

    let dup = fx.coordinator.track(file, fx.home.path()).unwrap_err();
    assert!(matches!(dup, SyncError::Registry(RegistryError::AlreadyTracked { .. })));
}

#[test]
fn track_rejects_bad_branch_without_registering() {
    let fx = fixture();
    fx.provider
        .put_file(&RemoteFile::new("o", "r", "main", "a.txt"), "x", Utc::now());

    let err = fx
        .coordinator
        .track(RemoteFile::new("o", "r", "dev", "a.txt"), fx.home.path())
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Remote(RemoteError::BranchNotFound { ref branch, .. }) if branch == "dev"
    ));
    assert!(!fx.coordinator.registry().path().exists());
}

#[test]
fn download_leaves_registry_untouched() {
    let fx = fixture();
    let file = RemoteFile::new("o", "r", "main", "a.txt");
    fx.provider.put_file(&file, "x", Utc::now());

    fx.coordinator.download(&file, fx.home.path()).expect("download");
    assert!(fx.home.path().join("a.txt").exists());
    assert!(!fx.coordinator.registry().path().exists());
}

#[test]
fn untrack_unknown_key_is_not_found() {
    let fx = fixture();
    let file = RemoteFile::new("o", "r", "main", "a.txt");
    fx.coordinator
        .registry()
        .add_entry(&TrackedEntry::new(file.clone(), fx.home.path()))
        .expect("add");

    let err = fx
        .coordinator
        .untrack(&RemoteFile::new("o", "r", "main", "b.txt"))
        .unwrap_err();
    assert!(matches!(err, SyncError::Registry(RegistryError::NotFound { .. })));
    assert_eq!(fx.coordinator.untrack(&file).expect("untrack"), 0);
}

#[test]
fn status_reports_verdicts_without_fetching() {
    let fx = fixture();
    let file = RemoteFile::new("o", "r", "main", "a.txt");
    fx.provider.put_file(&file, "x", Utc::now());
    fx.coordinator
        .registry()
        .add_entry(&TrackedEntry::new(file, fx.home.path()))
        .expect("add");

    let status = fx.coordinator.status().expect("status");
    assert_eq!(status.len(), 1);
    assert!(matches!(status[0].1, Staleness::Missing { .. }));
    assert_eq!(fx.provider.blob_fetches(), 0);
}
