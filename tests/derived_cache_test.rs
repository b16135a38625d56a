mod common;

use std::fs;

use buildfarm::domain::errors::DomainError;
use buildfarm::domain::models::{BuildStatus, OtherFailure};
use buildfarm::services::{DerivedCache, DerivedKind};

use common::{build_log, set_mtime, TestFarm};

// Far enough ahead that no write during the test can be newer.
const FUTURE: i64 = 4_000_000_000;

#[tokio::test]
async fn test_status_is_read_through_and_cached() {
    let t = TestFarm::new().await;
    let upload = t.upload("tdb", "charis", "cc", &build_log("42", &[("CONFIGURE", 0), ("BUILD", 1)]), None);
    let cache = t.farm.cache();

    let status = cache.status(&upload).unwrap();
    assert_eq!(status, BuildStatus::from_pairs([("CONFIGURE", 0), ("BUILD", 1)]));

    let entry = cache.cache_path(&upload, DerivedKind::Status);
    assert!(entry.is_file());
    assert!(entry.to_string_lossy().ends_with("build.tdb.charis.cc.status"));

    // A fresh entry is served without looking at the log again.
    let planted = BuildStatus::from_pairs([("PLANTED", 7)]);
    fs::write(&entry, serde_json::to_string(&planted).unwrap()).unwrap();
    set_mtime(&entry, FUTURE);
    assert_eq!(cache.status(&upload).unwrap(), planted);
    assert_eq!(cache.status(&upload).unwrap(), planted);

    // Once the log changed after the entry was written, it is recomputed.
    set_mtime(&entry, 0);
    assert_eq!(cache.status(&upload).unwrap(), status);
}

#[tokio::test]
async fn test_rewritten_log_invalidates_entry() {
    let t = TestFarm::new().await;
    let upload = t.upload("tdb", "charis", "cc", &build_log("42", &[("CONFIGURE", 0)]), None);
    let cache = t.farm.cache();
    cache.status(&upload).unwrap();
    set_mtime(&cache.cache_path(&upload, DerivedKind::Status), 1_000);

    // Mirroring tools may keep the old mtime; the change time still moves.
    fs::write(upload.log_path(), build_log("42", &[("CONFIGURE", 2)])).unwrap();
    set_mtime(&upload.log_path(), 500);

    assert_eq!(cache.status(&upload).unwrap(), BuildStatus::from_pairs([("CONFIGURE", 2)]));
}

#[tokio::test]
async fn test_err_log_feeds_status() {
    let t = TestFarm::new().await;
    let upload = t.upload(
        "tdb",
        "charis",
        "cc",
        &build_log("42", &[("CONFIGURE", 0)]),
        Some("cp: write error: No space left on device\n"),
    );

    let status = t.farm.status(&upload).unwrap();
    assert!(status.has(OtherFailure::DiskFull));
    assert!(status.broken_host());
}

#[tokio::test]
async fn test_readonly_cache_never_writes() {
    let t = TestFarm::new().await;
    let upload = t.upload("tdb", "charis", "cc", &build_log("42", &[("CONFIGURE", 0)]), Some("e\n"));
    let cache = DerivedCache::new(t.dir.path().join("ro-cache"), true);

    assert_eq!(cache.status(&upload).unwrap(), BuildStatus::from_pairs([("CONFIGURE", 0)]));
    assert_eq!(cache.revision(&upload).unwrap().effective(), "42");
    assert_eq!(cache.err_count(&upload).unwrap(), 1);
    assert!(!cache.dir().exists());
}

#[tokio::test]
async fn test_err_count() {
    let t = TestFarm::new().await;
    let with_err = t.upload("tdb", "charis", "cc", &build_log("42", &[]), Some("one\ntwo\nthree\n"));
    assert_eq!(t.farm.err_count(&with_err).unwrap(), 3);
    assert!(t.farm.cache().cache_path(&with_err, DerivedKind::ErrCount).is_file());

    let without_err = t.upload("tdb", "athena", "cc", &build_log("42", &[]), None);
    assert_eq!(t.farm.err_count(&without_err).unwrap(), 0);
    assert!(!t.farm.cache().cache_path(&without_err, DerivedKind::ErrCount).exists());
}

#[tokio::test]
async fn test_missing_revision_is_cached_and_reported() {
    let t = TestFarm::new().await;
    let upload = t.upload("tdb", "charis", "cc", "CONFIGURE STATUS: 0\n", None);

    for _ in 0..2 {
        let err = t.farm.revision_details(&upload).unwrap_err();
        assert!(matches!(err, DomainError::MissingRevisionInfo { .. }));
    }
    let entry = t.farm.cache().cache_path(&upload, DerivedKind::Revision);
    assert_eq!(fs::read_to_string(entry).unwrap().trim(), "null");
}

#[tokio::test]
async fn test_revision_details() {
    let t = TestFarm::new().await;
    let log = "BUILD REVISION: 100\nBUILD COMMIT REVISION: abc\nBUILD COMMIT TIME: 2010-11-04\n\
               BUILD COMMIT REVISION: def\n";
    let upload = t.upload("tdb", "charis", "cc", log, None);

    let revision = t.farm.revision_details(&upload).unwrap();
    assert_eq!(revision.id, "100");
    assert_eq!(revision.commit_id.as_deref(), Some("def"));
    assert_eq!(revision.timestamp.as_deref(), Some("2010-11-04"));
    assert_eq!(revision.effective(), "def");
}

#[tokio::test]
async fn test_unreadable_entry_is_a_miss() {
    let t = TestFarm::new().await;
    let upload = t.upload("tdb", "charis", "cc", &build_log("42", &[("BUILD", 0)]), None);
    let entry = t.farm.cache().cache_path(&upload, DerivedKind::Status);
    fs::write(&entry, "{not json").unwrap();
    set_mtime(&entry, FUTURE);

    assert_eq!(t.farm.status(&upload).unwrap(), BuildStatus::from_pairs([("BUILD", 0)]));
}

#[tokio::test]
async fn test_missing_log_is_surfaced() {
    let t = TestFarm::new().await;
    let upload = t.upload("tdb", "charis", "cc", &build_log("42", &[]), None);
    fs::remove_file(upload.log_path()).unwrap();

    assert!(matches!(t.farm.status(&upload), Err(DomainError::LogFileMissing(_))));
}
