mod common;

use std::sync::{Arc, Mutex};

use buildfarm::domain::errors::DomainResult;
use buildfarm::domain::models::{BuildStatus, Tree};
use buildfarm::domain::ports::{BuildFilter, CommitEntry, VcsLogReader};
use buildfarm::services::{Ingestor, PlannedAction};

use common::{build_log, TestFarm};

const FULL: &[(&str, i64)] = &[("CONFIGURE", 0), ("BUILD", 0), ("INSTALL", 0)];

/// Serves a fixed history and records what it was asked for.
struct FixedHistory {
    commits: Vec<CommitEntry>,
    calls: Mutex<Vec<(String, String, Vec<String>)>>,
}

impl FixedHistory {
    fn new(commits: Vec<CommitEntry>) -> Self {
        Self {
            commits,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl VcsLogReader for FixedHistory {
    fn log<'a>(
        &'a self,
        tree: &Tree,
        from: &str,
        exclude: &[String],
    ) -> DomainResult<Box<dyn Iterator<Item = DomainResult<CommitEntry>> + 'a>> {
        self.calls
            .lock()
            .unwrap()
            .push((tree.name.clone(), from.to_string(), exclude.to_vec()));
        Ok(Box::new(self.commits.iter().cloned().map(Ok)))
    }
}

fn commit(revision: &str, author: &str) -> CommitEntry {
    CommitEntry {
        revision: revision.to_string(),
        author: author.to_string(),
        committer: "gatekeeper@example.com".to_string(),
        message: format!("Change {revision}"),
    }
}

#[tokio::test]
async fn test_regression_produces_notice_with_commits() {
    let t = TestFarm::new().await;
    let history = Arc::new(FixedHistory::new(vec![commit("2", "alice@example.com")]));
    let ingestor = Ingestor::new(Arc::clone(&t.farm)).with_vcs(history.clone());

    t.upload_at("tdb", "charis", "cc", &build_log("1", FULL), 1_000);
    let first = ingestor.run().await.unwrap();
    assert_eq!(first.promoted.len(), 1);
    assert!(first.regressions.is_empty());

    t.upload_at("tdb", "charis", "cc", &build_log("2", &[("CONFIGURE", 0)]), 2_000);
    let second = ingestor.run().await.unwrap();
    assert_eq!(second.promoted.len(), 1);
    assert_eq!(second.regressions.len(), 1);

    let notice = &second.regressions[0];
    assert_eq!(notice.revision, "2");
    assert_eq!(notice.previous_revision, "1");
    assert_eq!(notice.previous_status, BuildStatus::from_pairs(FULL.iter().copied()));
    assert_eq!(notice.subject(), "BUILD of tdb:master BROKEN on charis with cc AT REVISION 2");
    assert_eq!(notice.commits, vec![commit("2", "alice@example.com")]);
    assert!(notice.recipients().contains("alice@example.com"));

    let calls = history.calls.lock().unwrap();
    assert_eq!(*calls, vec![("tdb".to_string(), "2".to_string(), vec!["1".to_string()])]);
}

#[tokio::test]
async fn test_improvement_is_not_reported() {
    let t = TestFarm::new().await;
    let ingestor = Ingestor::new(Arc::clone(&t.farm));

    t.upload_at("tdb", "charis", "cc", &build_log("1", &[("CONFIGURE", 0), ("BUILD", 1)]), 1_000);
    ingestor.run().await.unwrap();
    t.upload_at("tdb", "charis", "cc", &build_log("2", &[("CONFIGURE", 0), ("BUILD", 0)]), 2_000);
    let report = ingestor.run().await.unwrap();

    assert_eq!(report.promoted.len(), 1);
    assert!(report.regressions.is_empty());
}

#[tokio::test]
async fn test_disk_full_is_not_reported() {
    let t = TestFarm::new().await;
    let ingestor = Ingestor::new(Arc::clone(&t.farm));

    t.upload_at("tdb", "charis", "cc", &build_log("1", FULL), 1_000);
    ingestor.run().await.unwrap();
    let log = format!("{}No space left on device\n", build_log("2", &[("CONFIGURE", 0)]));
    t.upload_at("tdb", "charis", "cc", &log, 2_000);

    assert!(ingestor.run().await.unwrap().regressions.is_empty());
}

#[tokio::test]
async fn test_missing_revision_is_skipped_and_kept() {
    let t = TestFarm::new().await;
    let ingestor = Ingestor::new(Arc::clone(&t.farm));
    let pending = t.upload("tdb", "charis", "cc", "CONFIGURE STATUS: 0\n", None);
    t.upload("samba", "athena", "gcc", &build_log("5", FULL), None);

    let report = ingestor.run().await.unwrap();

    assert_eq!(report.promoted.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].key, pending.key);
    assert!(pending.exists(), "upload must stay in the inbox for a later run");
}

#[tokio::test]
async fn test_identical_reupload_is_unchanged() {
    let t = TestFarm::new().await;
    let ingestor = Ingestor::new(Arc::clone(&t.farm));
    let log = build_log("1", FULL);

    t.upload("tdb", "charis", "cc", &log, None);
    ingestor.run().await.unwrap();
    t.reupload("tdb", "charis", "cc", &log, None);
    let report = ingestor.run().await.unwrap();

    assert!(report.promoted.is_empty());
    assert_eq!(report.unchanged.len(), 1);
    assert_eq!(t.farm.archive().index().list(&BuildFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_uploads_are_ignored() {
    let t = TestFarm::new().await;
    let ingestor = Ingestor::new(Arc::clone(&t.farm));
    let stray = t.upload("tdb", "intruder", "cc", &build_log("1", FULL), None);

    let report = ingestor.run().await.unwrap();

    assert!(report.promoted.is_empty());
    assert!(report.skipped.is_empty());
    assert!(stray.exists());
}

#[tokio::test]
async fn test_plan_does_not_touch_inbox() {
    let t = TestFarm::new().await;
    let ingestor = Ingestor::new(Arc::clone(&t.farm));
    t.archive("tdb", "charis", &build_log("1", FULL), 1_000).await;
    let again = t.reupload("tdb", "charis", "cc", &build_log("1", &[("CONFIGURE", 0)]), None);
    let fresh = t.upload("samba", "charis", "cc", &build_log("9", FULL), None);
    let unknown = t.upload("tdb", "athena", "gcc", "no revision here\n", None);

    let plan = ingestor.plan().await.unwrap();

    assert_eq!(plan.len(), 3);
    let by_tree = |tree: &str, host: &str| {
        plan.iter()
            .find(|p| p.key.tree == tree && p.key.host == host)
            .unwrap()
    };
    assert_eq!(by_tree("tdb", "charis").action, PlannedAction::Replace);
    assert_eq!(by_tree("tdb", "charis").revision.as_deref(), Some("1"));
    assert_eq!(by_tree("samba", "charis").action, PlannedAction::Promote);
    assert_eq!(by_tree("tdb", "athena").revision, None);
    assert_eq!(by_tree("tdb", "athena").action, PlannedAction::Skip);

    assert!(again.exists() && fresh.exists() && unknown.exists());
    assert_eq!(t.farm.archive().index().list(&BuildFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_plan_matches_run_for_identical_reupload() {
    let t = TestFarm::new().await;
    let ingestor = Ingestor::new(Arc::clone(&t.farm));
    let log = build_log("1", FULL);
    let archived = t.archive("tdb", "charis", &log, 1_000).await;
    let again = t.reupload("tdb", "charis", "cc", &log, None);

    let plan = ingestor.plan().await.unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].action, PlannedAction::Unchanged);

    let report = ingestor.run().await.unwrap();
    assert_eq!(report.unchanged, vec![again.key.clone()]);
    assert!(report.promoted.is_empty());
    assert!(archived.exists());
}

#[tokio::test]
async fn test_unusable_revision_is_skipped_and_kept() {
    let t = TestFarm::new().await;
    let ingestor = Ingestor::new(Arc::clone(&t.farm));
    let pending = t.upload("tdb", "charis", "cc", &build_log("../etc", FULL), None);

    let plan = ingestor.plan().await.unwrap();
    assert_eq!(plan[0].action, PlannedAction::Skip);

    let report = ingestor.run().await.unwrap();
    assert!(report.promoted.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("Unusable revision"));
    assert!(pending.exists());
}
