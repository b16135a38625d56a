//! Archive Store
//!
//! Revision-keyed, immutable home of promoted builds. Files live in the
//! archive directory as `build.<tree>.<host>.<compiler>-<revision>.{log,err}`;
//! insertion order, checksums and statuses live in a [`BuildIndex`].
//!
//! Promotion orders its steps so that an interruption at any point can be
//! finished by promoting the same upload again:
//!
//! 1. hard-link the upload into the archive,
//! 2. record it in the index,
//! 3. unlink the upload from the inbox.
//!
//! A crash after step 1 leaves unindexed archive files that the next attempt
//! replaces. A crash after step 2 leaves the upload linked twice; the next
//! attempt matches its checksum and only unlinks the inbox copy.

use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Build, BuildKey, BuildRecord, NewBuildRecord};
use crate::domain::ports::{BuildFilter, BuildIndex};
use crate::services::derived_cache::DerivedCache;
use crate::services::revision_extractor;

fn metadata_if_exists(path: &Path) -> DomainResult<Option<fs::Metadata>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Whether two paths name the same inode.
fn same_file(a: &Path, b: &Path) -> DomainResult<bool> {
    match (metadata_if_exists(a)?, metadata_if_exists(b)?) {
        (Some(ma), Some(mb)) => Ok(ma.dev() == mb.dev() && ma.ino() == mb.ino()),
        _ => Ok(false),
    }
}

fn link_replacing(src: &Path, dst: &Path) -> DomainResult<()> {
    match fs::remove_file(dst) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::hard_link(src, dst)?;
    Ok(())
}

/// Result of archiving an upload.
#[derive(Debug, Clone)]
pub struct Promotion {
    pub build: Build,
    /// False when the content was already archived by an earlier, completed
    /// promotion.
    pub newly_archived: bool,
}

pub struct ArchiveStore {
    dir: PathBuf,
    index: Arc<dyn BuildIndex>,
    cache: Arc<DerivedCache>,
}

impl ArchiveStore {
    pub fn new(dir: impl Into<PathBuf>, index: Arc<dyn BuildIndex>, cache: Arc<DerivedCache>) -> Self {
        Self {
            dir: dir.into(),
            index,
            cache,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index(&self) -> &Arc<dyn BuildIndex> {
        &self.index
    }

    fn build_at(&self, key: BuildKey) -> Build {
        Build::new(key, &self.dir)
    }

    /// Archived build for an index row.
    pub fn build_for(&self, record: &BuildRecord) -> Build {
        self.build_at(record.key())
    }

    /// Look up an archived build by its full key.
    ///
    /// # Errors
    ///
    /// `NoSuchBuild` when nothing is archived under that revision.
    pub fn get_build(&self, tree: &str, host: &str, compiler: &str, revision: &str) -> DomainResult<Build> {
        let build = self.build_at(BuildKey::archived(tree, host, compiler, revision));
        if !build.exists() {
            return Err(build.key.not_found());
        }
        Ok(build)
    }

    /// Whether an upload's revision is already archived for its triple.
    pub fn contains(&self, build: &Build) -> DomainResult<bool> {
        let revision = match build.revision() {
            Some(rev) => rev.to_string(),
            None => match self.cache.revision(build) {
                Ok(rev) => rev.effective().to_string(),
                Err(DomainError::MissingRevisionInfo { .. }) => return Ok(false),
                Err(e) => return Err(e),
            },
        };
        match self.get_build(build.tree(), build.host(), build.compiler(), &revision) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Archived build whose stdout log has this checksum.
    pub async fn find_by_checksum(&self, checksum: &str) -> DomainResult<Option<Build>> {
        Ok(self
            .index
            .find_by_checksum(checksum)
            .await?
            .map(|record| self.build_for(&record)))
    }

    /// Move an upload from the inbox into the archive.
    ///
    /// Uploading content that is already archived is a no-op that returns
    /// the archived build.
    ///
    /// # Errors
    ///
    /// `MissingRevisionInfo` when the log names no revision, and
    /// `InvalidRevision` when it names one that cannot be archived; the
    /// upload is left in the inbox untouched either way.
    pub async fn promote(&self, upload: &Build) -> DomainResult<Build> {
        Ok(self.archive(upload).await?.build)
    }

    /// Like [`promote`](Self::promote), also reporting whether anything
    /// was archived.
    #[instrument(skip(self, upload), fields(build = %upload.key))]
    pub async fn archive(&self, upload: &Build) -> DomainResult<Promotion> {
        let checksum = upload.checksum()?;

        if let Some(record) = self.index.find_by_checksum(&checksum).await? {
            let archived = self.build_for(&record);
            if archived.exists() {
                if !record.key().same_triple(&upload.key) {
                    warn!(archived = %record.key(), "Identical log already archived for another build");
                }
                // Still linked from the inbox: the last attempt stopped
                // before unlinking the upload.
                let interrupted = same_file(&upload.log_path(), &archived.log_path())?;
                if interrupted {
                    info!(archived = %archived.key, "Finishing interrupted promotion");
                    upload.remove()?;
                } else {
                    debug!(archived = %archived.key, "Log already archived");
                }
                return Ok(Promotion {
                    build: archived,
                    newly_archived: interrupted,
                });
            }
            warn!(archived = %archived.key, "Index row without archived log, re-archiving");
            self.index.remove_key(&archived.key).await?;
        }

        let revision = self.cache.revision(upload)?;
        if !revision_extractor::is_valid_revision(revision.effective()) {
            return Err(DomainError::InvalidRevision {
                tree: upload.tree().to_string(),
                host: upload.host().to_string(),
                compiler: upload.compiler().to_string(),
                revision: revision.effective().to_string(),
            });
        }
        let status = self.cache.status(upload)?;
        let uploaded: DateTime<Utc> = upload.upload_time()?.into();

        let key = BuildKey::archived(upload.tree(), upload.host(), upload.compiler(), revision.effective());
        let archived = self.build_at(key.clone());

        let superseded = self.index.remove_key(&key).await?;
        if superseded > 0 || archived.exists() {
            info!(archived = %key, "Superseding archived build at the same revision");
        }
        archived.remove()?;

        fs::create_dir_all(&self.dir)?;
        link_replacing(&upload.log_path(), &archived.log_path())?;
        if upload.err_path().is_file() {
            link_replacing(&upload.err_path(), &archived.err_path())?;
        }

        self.index
            .insert(&NewBuildRecord {
                key,
                revision,
                checksum,
                upload_time: uploaded,
                status,
            })
            .await?;

        upload.remove()?;
        info!(archived = %archived.key, "Promoted build");
        Ok(Promotion {
            build: archived,
            newly_archived: true,
        })
    }

    /// Revision archived for the triple before `revision`.
    ///
    /// # Errors
    ///
    /// `NoSuchBuild` when `revision` is not archived for the triple or has
    /// no predecessor with a different revision.
    pub async fn get_previous_revision(
        &self,
        tree: &str,
        host: &str,
        compiler: &str,
        revision: &str,
    ) -> DomainResult<String> {
        self.index
            .previous_revision(tree, host, compiler, revision)
            .await?
            .ok_or_else(|| DomainError::no_such_build(tree, host, compiler, Some(revision)))
    }

    /// Most recently archived revision for the triple.
    pub async fn get_latest_revision(&self, tree: &str, host: &str, compiler: &str) -> DomainResult<String> {
        self.index
            .latest_revision(tree, host, compiler)
            .await?
            .ok_or_else(|| DomainError::no_such_build(tree, host, compiler, None))
    }

    /// Archived builds of a triple, oldest upload first.
    ///
    /// Builds whose log is still linked from elsewhere (a promotion in
    /// progress) are left out.
    pub async fn history(&self, tree: &str, host: &str, compiler: &str) -> DomainResult<Vec<Build>> {
        let filter = BuildFilter {
            tree: Some(tree.to_string()),
            host: Some(host.to_string()),
            revision: None,
        };

        let mut builds = Vec::new();
        for record in self.index.list(&filter).await? {
            if record.compiler != compiler {
                continue;
            }
            let build = self.build_for(&record);
            let Some(meta) = metadata_if_exists(&build.log_path())? else {
                warn!(build = %build.key, "Indexed build has no log");
                continue;
            };
            if meta.nlink() > 1 {
                debug!(build = %build.key, "Skipping build still linked from the inbox");
                continue;
            }
            builds.push((meta.modified()?, build));
        }
        builds.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(builds.into_iter().map(|(_, build)| build).collect())
    }
}
