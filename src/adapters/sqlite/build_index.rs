//! SQLite implementation of the BuildIndex.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::{format_datetime, parse_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BuildKey, BuildRecord, BuildStatus, NewBuildRecord};
use crate::domain::ports::{BuildFilter, BuildIndex};

const BUILD_COLUMNS: &str =
    "id, tree, host, compiler, revision, commit_revision, checksum, upload_time, status";

pub struct SqliteBuildIndex {
    pool: SqlitePool,
}

impl SqliteBuildIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BuildIndex for SqliteBuildIndex {
    async fn insert(&self, record: &NewBuildRecord) -> DomainResult<BuildRecord> {
        let revision = record.revision.effective().to_string();
        let status = serde_json::to_string(&record.status)?;

        let result = sqlx::query(
            r#"INSERT INTO builds (tree, host, compiler, revision, commit_revision, checksum, upload_time, status)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(&record.key.tree)
        .bind(&record.key.host)
        .bind(&record.key.compiler)
        .bind(&revision)
        .bind(&record.revision.commit_id)
        .bind(&record.checksum)
        .bind(format_datetime(&record.upload_time))
        .bind(&status)
        .execute(&self.pool)
        .await?;

        let row: BuildRow = sqlx::query_as(&format!("SELECT {BUILD_COLUMNS} FROM builds WHERE id = ?"))
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn find_by_checksum(&self, checksum: &str) -> DomainResult<Option<BuildRecord>> {
        let row: Option<BuildRow> =
            sqlx::query_as(&format!("SELECT {BUILD_COLUMNS} FROM builds WHERE checksum = ?"))
                .bind(checksum)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn remove_key(&self, key: &BuildKey) -> DomainResult<u64> {
        let Some(revision) = &key.revision else {
            return Ok(0);
        };
        let result = sqlx::query(
            "DELETE FROM builds WHERE tree = ? AND host = ? AND compiler = ? AND revision = ?"
        )
        .bind(&key.tree)
        .bind(&key.host)
        .bind(&key.compiler)
        .bind(revision)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn previous_revision(
        &self,
        tree: &str,
        host: &str,
        compiler: &str,
        revision: &str,
    ) -> DomainResult<Option<String>> {
        let current: Option<(i64,)> = sqlx::query_as(
            r#"SELECT id FROM builds
               WHERE tree = ? AND host = ? AND compiler = ? AND revision = ?
               ORDER BY id DESC LIMIT 1"#
        )
        .bind(tree)
        .bind(host)
        .bind(compiler)
        .bind(revision)
        .fetch_optional(&self.pool)
        .await?;

        let Some((current_id,)) = current else {
            return Ok(None);
        };

        let previous: Option<(String,)> = sqlx::query_as(
            r#"SELECT revision FROM builds
               WHERE tree = ? AND host = ? AND compiler = ? AND revision != ? AND id < ?
               ORDER BY id DESC LIMIT 1"#
        )
        .bind(tree)
        .bind(host)
        .bind(compiler)
        .bind(revision)
        .bind(current_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(previous.map(|(rev,)| rev))
    }

    async fn latest_revision(&self, tree: &str, host: &str, compiler: &str) -> DomainResult<Option<String>> {
        let latest: Option<(String,)> = sqlx::query_as(
            r#"SELECT revision FROM builds
               WHERE tree = ? AND host = ? AND compiler = ?
               ORDER BY id DESC LIMIT 1"#
        )
        .bind(tree)
        .bind(host)
        .bind(compiler)
        .fetch_optional(&self.pool)
        .await?;

        Ok(latest.map(|(rev,)| rev))
    }

    async fn list(&self, filter: &BuildFilter) -> DomainResult<Vec<BuildRecord>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {BUILD_COLUMNS} FROM builds WHERE 1 = 1"));
        if let Some(tree) = &filter.tree {
            query.push(" AND tree = ").push_bind(tree);
        }
        if let Some(host) = &filter.host {
            query.push(" AND host = ").push_bind(host);
        }
        if let Some(revision) = &filter.revision {
            query.push(" AND revision = ").push_bind(revision);
        }
        query.push(" ORDER BY upload_time DESC, id DESC");

        let rows: Vec<BuildRow> = query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct BuildRow {
    id: i64,
    tree: String,
    host: String,
    compiler: String,
    revision: String,
    commit_revision: Option<String>,
    checksum: String,
    upload_time: String,
    status: String,
}

impl TryFrom<BuildRow> for BuildRecord {
    type Error = DomainError;

    fn try_from(row: BuildRow) -> Result<Self, Self::Error> {
        let status: BuildStatus = serde_json::from_str(&row.status)?;
        Ok(BuildRecord {
            id: row.id,
            tree: row.tree,
            host: row.host,
            compiler: row.compiler,
            revision: row.revision,
            commit_revision: row.commit_revision,
            checksum: row.checksum,
            upload_time: parse_datetime(&row.upload_time)?,
            status,
        })
    }
}
