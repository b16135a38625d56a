//! SQLite implementation of the HostRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;

use super::{format_datetime, parse_optional_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Host;
use crate::domain::ports::HostRepository;

const HOST_COLUMNS: &str = "hosts.name, hosts.platform, hosts.owner, hosts.owner_email, hosts.password, \
     hosts.permission, hosts.ssh_access, hosts.fqdn, hosts.join_time, hosts.last_dead_mail";

pub struct SqliteHostRepository {
    pool: SqlitePool,
}

impl SqliteHostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn not_found_unless_changed(name: &str, rows_affected: u64) -> DomainResult<()> {
        if rows_affected == 0 {
            return Err(DomainError::NoSuchHost(name.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HostRepository for SqliteHostRepository {
    async fn create_host(&self, host: &Host) -> DomainResult<()> {
        let join_time = host.join_time.unwrap_or_else(Utc::now);
        let result = sqlx::query(
            r#"INSERT INTO hosts (name, platform, owner, owner_email, password, permission, ssh_access, fqdn, join_time, last_dead_mail)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(&host.name)
        .bind(&host.platform)
        .bind(&host.owner)
        .bind(&host.owner_email)
        .bind(&host.password)
        .bind(&host.permission)
        .bind(host.ssh_access)
        .bind(&host.fqdn)
        .bind(format_datetime(&join_time))
        .bind(host.last_dead_mail.as_ref().map(format_datetime))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(DomainError::HostAlreadyExists(host.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_host(&self, name: &str) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM hosts WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Self::not_found_unless_changed(name, result.rows_affected())
    }

    async fn hosts(&self) -> DomainResult<Vec<Host>> {
        let rows: Vec<HostRow> = sqlx::query_as(&format!(
            "SELECT {HOST_COLUMNS}, NULL AS last_update FROM hosts ORDER BY hosts.name"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn host(&self, name: &str) -> DomainResult<Option<Host>> {
        let row: Option<HostRow> = sqlx::query_as(&format!(
            "SELECT {HOST_COLUMNS}, NULL AS last_update FROM hosts WHERE hosts.name = ?"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update_platform(&self, name: &str, platform: &str) -> DomainResult<()> {
        let result = sqlx::query("UPDATE hosts SET platform = ? WHERE name = ?")
            .bind(platform)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Self::not_found_unless_changed(name, result.rows_affected())
    }

    async fn update_owner(&self, name: &str, owner: &str, owner_email: &str) -> DomainResult<()> {
        let result = sqlx::query("UPDATE hosts SET owner = ?, owner_email = ? WHERE name = ?")
            .bind(owner)
            .bind(owner_email)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Self::not_found_unless_changed(name, result.rows_affected())
    }

    async fn dead_hosts(&self, age: Duration) -> DomainResult<Vec<Host>> {
        let age = chrono::Duration::from_std(age)
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;
        let dead_time = format_datetime(&(Utc::now() - age));

        let rows: Vec<HostRow> = sqlx::query_as(&format!(
            r#"SELECT {HOST_COLUMNS}, MAX(builds.upload_time) AS last_update
               FROM hosts LEFT JOIN builds ON hosts.name = builds.host
               WHERE ifnull(hosts.last_dead_mail, '') < ?1 AND ifnull(hosts.join_time, '') < ?1
               GROUP BY hosts.name
               HAVING ifnull(MAX(builds.upload_time), '') < ?1
               ORDER BY hosts.name"#
        ))
        .bind(&dead_time)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn host_ages(&self) -> DomainResult<Vec<Host>> {
        let rows: Vec<HostRow> = sqlx::query_as(&format!(
            r#"SELECT {HOST_COLUMNS}, MAX(builds.upload_time) AS last_update
               FROM hosts LEFT JOIN builds ON hosts.name = builds.host
               GROUP BY hosts.name
               ORDER BY last_update DESC, hosts.name"#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn sent_dead_mail(&self, name: &str) -> DomainResult<()> {
        let result = sqlx::query("UPDATE hosts SET last_dead_mail = ? WHERE name = ?")
            .bind(format_datetime(&Utc::now()))
            .bind(name)
            .execute(&self.pool)
            .await?;
        Self::not_found_unless_changed(name, result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct HostRow {
    name: String,
    platform: Option<String>,
    owner: Option<String>,
    owner_email: Option<String>,
    password: Option<String>,
    permission: Option<String>,
    ssh_access: bool,
    fqdn: Option<String>,
    join_time: Option<String>,
    last_dead_mail: Option<String>,
    last_update: Option<String>,
}

impl TryFrom<HostRow> for Host {
    type Error = DomainError;

    fn try_from(row: HostRow) -> Result<Self, Self::Error> {
        Ok(Host {
            name: row.name,
            platform: row.platform,
            owner: row.owner,
            owner_email: row.owner_email,
            password: row.password,
            permission: row.permission,
            ssh_access: row.ssh_access,
            fqdn: row.fqdn,
            join_time: parse_optional_datetime(row.join_time)?,
            last_dead_mail: parse_optional_datetime(row.last_dead_mail)?,
            last_update: parse_optional_datetime(row.last_update)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup_test_repo() -> SqliteHostRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteHostRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_get_host() {
        let repo = setup_test_repo().await;
        let host = Host::new("charis").with_platform("linux").with_owner("Jelmer", "jelmer@example.com");
        repo.create_host(&host).await.unwrap();

        let found = repo.host("charis").await.unwrap().unwrap();
        assert_eq!(found.platform.as_deref(), Some("linux"));
        assert_eq!(found.owner_email.as_deref(), Some("jelmer@example.com"));
        assert!(found.join_time.is_some());
        assert!(repo.host_exists("charis").await.unwrap());
        assert!(!repo.host_exists("nohost").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_host() {
        let repo = setup_test_repo().await;
        repo.create_host(&Host::new("charis")).await.unwrap();
        let err = repo.create_host(&Host::new("charis")).await.unwrap_err();
        assert!(matches!(err, DomainError::HostAlreadyExists(name) if name == "charis"));
    }

    #[tokio::test]
    async fn test_missing_host_operations() {
        let repo = setup_test_repo().await;
        assert!(matches!(repo.delete_host("nohost").await, Err(DomainError::NoSuchHost(_))));
        assert!(matches!(repo.update_platform("nohost", "x").await, Err(DomainError::NoSuchHost(_))));
        assert!(matches!(repo.update_owner("nohost", "a", "b").await, Err(DomainError::NoSuchHost(_))));
        assert!(matches!(repo.sent_dead_mail("nohost").await, Err(DomainError::NoSuchHost(_))));
    }

    #[tokio::test]
    async fn test_hosts_sorted_by_name() {
        let repo = setup_test_repo().await;
        repo.create_host(&Host::new("zeus")).await.unwrap();
        repo.create_host(&Host::new("athena")).await.unwrap();
        let names: Vec<_> = repo.hosts().await.unwrap().into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["athena", "zeus"]);
    }

    #[test]
    fn test_password_not_serialized() {
        let host = Host::new("charis").with_password("secret");
        let json = serde_json::to_string(&host).unwrap();
        assert!(!json.contains("secret"));
    }
}
