mod common;

use std::fs;

use buildfarm::domain::errors::DomainError;
use buildfarm::services::InboxStore;

use common::{build_log, TestFarm};

#[tokio::test]
async fn test_list_new_only_accepts_known_triples() {
    let t = TestFarm::new().await;
    let log = build_log("42", &[("CONFIGURE", 0)]);
    t.upload("tdb", "charis", "cc", &log, None);
    t.upload("samba", "athena", "gcc", &log, None);
    t.upload("nosuchtree", "charis", "cc", &log, None);
    t.upload("tdb", "intruder", "cc", &log, None);
    t.upload("tdb", "charis", "tcc", &log, None);

    let inbox = t.farm.config().inbox_dir();
    fs::write(inbox.join("README"), "not a build").unwrap();
    fs::write(inbox.join("build.tdb.charis.log"), "too few fields").unwrap();

    let keys: Vec<String> = t
        .farm
        .get_new_builds()
        .await
        .unwrap()
        .iter()
        .map(|b| b.key.to_string())
        .collect();
    assert_eq!(keys.len(), 2, "{keys:?}");

    let all = t.farm.inbox().list_all().unwrap();
    assert_eq!(all.len(), 5, "list_all ignores only malformed names");
}

#[tokio::test]
async fn test_new_builds_follow_host_registry() {
    let t = TestFarm::new().await;
    t.upload("tdb", "charis", "cc", &build_log("42", &[]), None);
    assert_eq!(t.farm.get_new_builds().await.unwrap().len(), 1);

    t.farm.hosts().delete_host("charis").await.unwrap();
    assert!(t.farm.get_new_builds().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_build_and_remove() {
    let t = TestFarm::new().await;
    let upload = t.upload("tdb", "charis", "cc", &build_log("42", &[]), Some("err\n"));

    let build = t.farm.inbox().get_build("tdb", "charis", "cc").unwrap();
    assert_eq!(build, upload);
    assert!(build.revision().is_none());

    t.farm.inbox().remove(&build).unwrap();
    assert!(!upload.log_path().exists());
    assert!(!upload.err_path().exists());

    let err = t.farm.inbox().get_build("tdb", "charis", "cc").unwrap_err();
    assert!(matches!(
        err,
        DomainError::NoSuchBuild { ref tree, revision: None, .. } if tree == "tdb"
    ));
}

#[tokio::test]
async fn test_has_host() {
    let t = TestFarm::new().await;
    t.upload("tdb", "athena", "gcc", &build_log("1", &[]), None);

    assert!(t.farm.inbox().has_host("athena").unwrap());
    assert!(!t.farm.inbox().has_host("charis").unwrap());
}

#[test]
fn test_missing_inbox_directory_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let inbox = InboxStore::new(dir.path().join("absent"), ["tdb".to_string()], ["cc".to_string()]);
    assert!(inbox.list_all().unwrap().is_empty());
    assert!(!inbox.has_host("charis").unwrap());
}
