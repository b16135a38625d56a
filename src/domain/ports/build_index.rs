//! Archive index port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BuildKey, BuildRecord, NewBuildRecord};

/// Index of archived builds, ordered by insertion.
#[async_trait]
pub trait BuildIndex: Send + Sync {
    /// Record a freshly archived build and return its row.
    async fn insert(&self, record: &NewBuildRecord) -> DomainResult<BuildRecord>;

    async fn find_by_checksum(&self, checksum: &str) -> DomainResult<Option<BuildRecord>>;

    /// Drop every row for an exact (tree, host, compiler, revision) key.
    async fn remove_key(&self, key: &BuildKey) -> DomainResult<u64>;

    /// Revision of the newest build of the triple inserted before `revision`
    /// and carrying a different revision.
    async fn previous_revision(
        &self,
        tree: &str,
        host: &str,
        compiler: &str,
        revision: &str,
    ) -> DomainResult<Option<String>>;

    /// Revision of the newest build of the triple.
    async fn latest_revision(&self, tree: &str, host: &str, compiler: &str) -> DomainResult<Option<String>>;

    /// Rows matching the optional filters, newest upload first.
    async fn list(&self, filter: &BuildFilter) -> DomainResult<Vec<BuildRecord>>;
}

/// Filters for [`BuildIndex::list`].
#[derive(Debug, Clone, Default)]
pub struct BuildFilter {
    pub tree: Option<String>,
    pub host: Option<String>,
    pub revision: Option<String>,
}

impl BuildFilter {
    pub fn tree(tree: &str) -> Self {
        Self {
            tree: Some(tree.to_string()),
            ..Self::default()
        }
    }

    pub fn host(host: &str) -> Self {
        Self {
            host: Some(host.to_string()),
            ..Self::default()
        }
    }
}
