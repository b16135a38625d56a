//! Build farm query layer.
//!
//! [`BuildFarm`] wires the inbox, the archive, the derived-data cache and the
//! metadata database together from one [`Config`], and answers the questions
//! front ends ask about builds.

use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::adapters::sqlite::{initialize_database, PoolConfig, SqliteBuildIndex, SqliteHostRepository};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Build, BuildRecord, BuildStatus, BuildSummary, Config, Revision};
use crate::domain::ports::{BuildFilter, BuildIndex, HostRepository};
use crate::services::archive_store::{ArchiveStore, Promotion};
use crate::services::derived_cache::DerivedCache;
use crate::services::inbox_store::InboxStore;

/// Keep the first record of every (tree, host, compiler) triple.
///
/// Fed newest-first, this yields the latest build of each triple.
pub fn distinct_builds(records: impl IntoIterator<Item = BuildRecord>) -> Vec<BuildRecord> {
    let mut seen = BTreeSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert((r.tree.clone(), r.host.clone(), r.compiler.clone())))
        .collect()
}

fn record_revision(record: &BuildRecord) -> Revision {
    Revision {
        id: record.revision.clone(),
        commit_id: record.commit_revision.clone(),
        timestamp: None,
    }
}

pub struct BuildFarm {
    config: Config,
    inbox: InboxStore,
    archive: ArchiveStore,
    cache: Arc<DerivedCache>,
    hosts: Arc<dyn HostRepository>,
    index: Arc<dyn BuildIndex>,
}

impl BuildFarm {
    /// Assemble a build farm around already-open metadata adapters.
    pub fn new(config: Config, hosts: Arc<dyn HostRepository>, index: Arc<dyn BuildIndex>) -> Self {
        let cache = Arc::new(DerivedCache::new(config.cache_dir(), config.cache.readonly));
        let inbox = InboxStore::from_config(&config);
        let archive = ArchiveStore::new(config.archive_dir(), Arc::clone(&index), Arc::clone(&cache));
        Self {
            config,
            inbox,
            archive,
            cache,
            hosts,
            index,
        }
    }

    /// Open the metadata database named by `config` and assemble the farm.
    pub async fn open(config: Config) -> anyhow::Result<Self> {
        let pool = initialize_database(&config.database_url(), PoolConfig::from(&config.database))
            .await
            .with_context(|| format!("Failed to open database {}", config.database_path().display()))?;
        let hosts = Arc::new(SqliteHostRepository::new(pool.clone()));
        let index = Arc::new(SqliteBuildIndex::new(pool));
        Ok(Self::new(config, hosts, index))
    }

    /// Create the inbox, archive, cache and coverage directories.
    pub fn create_layout(&self) -> DomainResult<Vec<PathBuf>> {
        let dirs = vec![
            self.config.inbox_dir(),
            self.config.archive_dir(),
            self.config.cache_dir(),
            self.config.lcov_dir(),
        ];
        for dir in &dirs {
            fs::create_dir_all(dir)?;
        }
        Ok(dirs)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn inbox(&self) -> &InboxStore {
        &self.inbox
    }

    pub fn archive(&self) -> &ArchiveStore {
        &self.archive
    }

    pub fn cache(&self) -> &DerivedCache {
        &self.cache
    }

    pub fn hosts(&self) -> &Arc<dyn HostRepository> {
        &self.hosts
    }

    /// A build by key: from the inbox without a revision, else from the archive.
    pub fn get_build(&self, tree: &str, host: &str, compiler: &str, revision: Option<&str>) -> DomainResult<Build> {
        match revision {
            Some(rev) => self.archive.get_build(tree, host, compiler, rev),
            None => self.inbox.get_build(tree, host, compiler),
        }
    }

    /// Uploads from registered hosts for configured trees and compilers.
    pub async fn get_new_builds(&self) -> DomainResult<Vec<Build>> {
        self.inbox.list_new(self.hosts.as_ref()).await
    }

    /// Archived history of a triple, oldest first.
    pub async fn get_old_builds(&self, tree: &str, host: &str, compiler: &str) -> DomainResult<Vec<Build>> {
        self.archive.history(tree, host, compiler).await
    }

    /// Latest archived build of every triple, newest first.
    pub async fn get_last_builds(&self) -> DomainResult<Vec<BuildRecord>> {
        Ok(distinct_builds(self.index.list(&BuildFilter::default()).await?))
    }

    /// Latest archived build of every host and compiler for one tree.
    pub async fn get_tree_builds(&self, tree: &str) -> DomainResult<Vec<BuildRecord>> {
        Ok(distinct_builds(self.index.list(&BuildFilter::tree(tree)).await?))
    }

    /// Latest archived build of every tree and compiler on one host.
    pub async fn get_host_builds(&self, host: &str) -> DomainResult<Vec<BuildRecord>> {
        Ok(distinct_builds(self.index.list(&BuildFilter::host(host)).await?))
    }

    /// Every archived build of a tree at one revision, newest first.
    pub async fn get_revision_builds(&self, tree: &str, revision: &str) -> DomainResult<Vec<BuildRecord>> {
        let filter = BuildFilter {
            tree: Some(tree.to_string()),
            host: None,
            revision: Some(revision.to_string()),
        };
        self.index.list(&filter).await
    }

    /// Key, revision and status of the latest build of every triple.
    pub async fn get_summary_builds(&self) -> DomainResult<Vec<BuildSummary>> {
        Ok(self
            .get_last_builds()
            .await?
            .into_iter()
            .map(|record| BuildSummary {
                key: record.key(),
                revision: record_revision(&record),
                status: record.status,
            })
            .collect())
    }

    /// Upload time of the newest archived build from `host`.
    pub async fn host_last_build(&self, host: &str) -> DomainResult<Option<DateTime<Utc>>> {
        Ok(self
            .get_host_builds(host)
            .await?
            .into_iter()
            .map(|record| record.upload_time)
            .max())
    }

    /// Archived build for an index row.
    pub fn build_for(&self, record: &BuildRecord) -> Build {
        self.archive.build_for(record)
    }

    pub fn status(&self, build: &Build) -> DomainResult<BuildStatus> {
        self.cache.status(build)
    }

    pub fn revision_details(&self, build: &Build) -> DomainResult<Revision> {
        self.cache.revision(build)
    }

    pub fn err_count(&self, build: &Build) -> DomainResult<usize> {
        self.cache.err_count(build)
    }

    /// Key, revision and status of a build read through the cache.
    pub fn summary(&self, build: &Build) -> DomainResult<BuildSummary> {
        Ok(BuildSummary {
            key: build.key.clone(),
            revision: self.cache.revision(build)?,
            status: self.cache.status(build)?,
        })
    }

    /// Headline coverage percentage for a tree.
    ///
    /// # Errors
    ///
    /// `NoSuchBuild` (on the coverage host, compiler `lcov`) when the tree
    /// has no coverage report.
    #[instrument(skip(self))]
    pub fn lcov_status(&self, tree: &str) -> DomainResult<Option<String>> {
        let lcov_host = &self.config.lcov.host;
        let report = self.config.lcov_dir().join(lcov_host).join(tree).join("index.html");
        let cache_name = format!("lcov.{lcov_host}.{tree}.status");
        match self.cache.lcov_percentage(&report, &cache_name) {
            Err(DomainError::LogFileMissing(_)) => {
                debug!(report = %report.display(), "No coverage report");
                Err(DomainError::no_such_build(tree, lcov_host, "lcov", None))
            }
            other => other,
        }
    }

    /// Promote an upload into the archive.
    pub async fn upload_build(&self, build: &Build) -> DomainResult<Build> {
        self.archive.promote(build).await
    }

    pub(crate) async fn archive_build(&self, build: &Build) -> DomainResult<Promotion> {
        self.archive.archive(build).await
    }

    pub async fn get_previous_revision(
        &self,
        tree: &str,
        host: &str,
        compiler: &str,
        revision: &str,
    ) -> DomainResult<String> {
        self.archive.get_previous_revision(tree, host, compiler, revision).await
    }

    pub async fn get_latest_revision(&self, tree: &str, host: &str, compiler: &str) -> DomainResult<String> {
        self.archive.get_latest_revision(tree, host, compiler).await
    }
}
