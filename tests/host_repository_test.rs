use std::time::Duration;

use buildfarm::adapters::sqlite::{create_migrated_test_pool, SqliteBuildIndex, SqliteHostRepository};
use buildfarm::domain::models::{BuildKey, BuildStatus, Host, NewBuildRecord, Revision};
use buildfarm::domain::ports::{BuildIndex, HostRepository};
use chrono::{DateTime, Duration as ChronoDuration, Utc};

const DAY: Duration = Duration::from_secs(86_400);

async fn setup() -> (SqliteHostRepository, SqliteBuildIndex) {
    let pool = create_migrated_test_pool().await.unwrap();
    (SqliteHostRepository::new(pool.clone()), SqliteBuildIndex::new(pool))
}

fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - ChronoDuration::days(days)
}

fn joined(name: &str, when: DateTime<Utc>) -> Host {
    let mut host = Host::new(name);
    host.join_time = Some(when);
    host
}

async fn record_build(index: &SqliteBuildIndex, host: &str, when: DateTime<Utc>) {
    index
        .insert(&NewBuildRecord {
            key: BuildKey::archived("tdb", host, "cc", "1"),
            revision: Revision::new("1"),
            checksum: format!("{host}-{}", when.timestamp()),
            upload_time: when,
            status: BuildStatus::default(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_dead_hosts() {
    let (hosts, index) = setup().await;
    hosts.create_host(&joined("silent", days_ago(100))).await.unwrap();
    hosts.create_host(&joined("stalled", days_ago(100))).await.unwrap();
    hosts.create_host(&joined("busy", days_ago(100))).await.unwrap();
    hosts.create_host(&joined("newcomer", days_ago(1))).await.unwrap();
    record_build(&index, "stalled", days_ago(90)).await;
    record_build(&index, "busy", days_ago(90)).await;
    record_build(&index, "busy", days_ago(2)).await;

    let dead: Vec<_> = hosts
        .dead_hosts(DAY * 60)
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.name)
        .collect();
    assert_eq!(dead, vec!["silent", "stalled"]);

    hosts.sent_dead_mail("silent").await.unwrap();
    let dead: Vec<_> = hosts
        .dead_hosts(DAY * 60)
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.name)
        .collect();
    assert_eq!(dead, vec!["stalled"]);

    let silent = hosts.host("silent").await.unwrap().unwrap();
    assert!(silent.last_dead_mail.is_some());
}

#[tokio::test]
async fn test_host_ages() {
    let (hosts, index) = setup().await;
    for name in ["old", "recent", "never"] {
        hosts.create_host(&Host::new(name)).await.unwrap();
    }
    record_build(&index, "old", days_ago(30)).await;
    record_build(&index, "recent", days_ago(1)).await;

    let ages = hosts.host_ages().await.unwrap();
    let names: Vec<_> = ages.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["recent", "old", "never"]);
    assert!(ages[0].last_update.is_some());
    assert!(ages[2].last_update.is_none());
}

#[tokio::test]
async fn test_update_platform_and_owner() {
    let (hosts, _) = setup().await;
    hosts.create_host(&Host::new("charis")).await.unwrap();

    hosts.update_platform("charis", "debian sid").await.unwrap();
    hosts.update_owner("charis", "Jane Owner", "jane@example.com").await.unwrap();

    let host = hosts.host("charis").await.unwrap().unwrap();
    assert_eq!(host.platform.as_deref(), Some("debian sid"));
    assert_eq!(host.owner_contact(), Some(("Jane Owner", "jane@example.com")));
}

#[tokio::test]
async fn test_delete_host() {
    let (hosts, _) = setup().await;
    hosts.create_host(&Host::new("charis")).await.unwrap();
    hosts.delete_host("charis").await.unwrap();

    assert!(hosts.host("charis").await.unwrap().is_none());
    assert!(hosts.hosts().await.unwrap().is_empty());
}
