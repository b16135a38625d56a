//! Ingestion job
//!
//! Promotes every acceptable upload into the archive and compares each newly
//! archived build against the previous revision of the same triple. One bad
//! build never stops the run: failures are logged and the build is skipped.

use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Build, BuildKey, BuildStatus, RetryConfig, Tree};
use crate::domain::ports::{CommitEntry, VcsLogReader};
use crate::services::build_farm::BuildFarm;
use crate::services::revision_extractor;

/// A newly archived build that is worse than its predecessor.
#[derive(Debug, Clone, Serialize)]
pub struct RegressionNotice {
    pub tree: String,
    pub host: String,
    pub compiler: String,
    /// Branch of the tree, when the tree is configured.
    pub branch: Option<String>,
    pub scm: Option<String>,
    pub revision: String,
    pub status: BuildStatus,
    pub previous_revision: String,
    pub previous_status: BuildStatus,
    /// Commits between the two revisions, newest first.
    pub commits: Vec<CommitEntry>,
}

impl RegressionNotice {
    pub fn subject(&self) -> String {
        let branch = self.branch.as_deref().unwrap_or("unknown");
        format!(
            "BUILD of {}:{} BROKEN on {} with {} AT REVISION {}",
            self.tree, branch, self.host, self.compiler, self.revision
        )
    }

    /// Authors and committers of the candidate commits.
    pub fn recipients(&self) -> BTreeSet<&str> {
        self.commits
            .iter()
            .flat_map(|c| [c.author.as_str(), c.committer.as_str()])
            .filter(|who| !who.is_empty())
            .collect()
    }

    pub fn body(&self) -> String {
        let mut body = format!(
            "Broken build for tree {} on host {} with compiler {}\n\n",
            self.tree, self.host, self.compiler
        );
        if let (Some(scm), Some(branch)) = (&self.scm, &self.branch) {
            let _ = writeln!(body, "Tree {} is {} branch {}.\n", self.tree, scm, branch);
        }
        let _ = writeln!(body, "Build status for new revision {} is {}", self.revision, self.status);
        let _ = writeln!(
            body,
            "Build status for old revision {} was {}",
            self.previous_revision, self.previous_status
        );
        if !self.commits.is_empty() {
            body.push_str("\nThe build may have been broken by one of the following commits:\n\n");
            for commit in &self.commits {
                let _ = writeln!(body, "commit {}", commit.revision);
                let _ = writeln!(body, "Author: {}", commit.author);
                let _ = writeln!(body, "Commit: {}\n", commit.committer);
                let _ = writeln!(body, "    {}\n", commit.message.trim());
            }
        }
        body
    }
}

/// A build left in the inbox, and why.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedBuild {
    pub key: BuildKey,
    pub reason: String,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub promoted: Vec<BuildKey>,
    pub unchanged: Vec<BuildKey>,
    pub skipped: Vec<SkippedBuild>,
    pub regressions: Vec<RegressionNotice>,
}

/// What a real run would do with one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedAction {
    Promote,
    /// Supersede the archived build at the same revision.
    Replace,
    /// Byte-identical to an archived log.
    Unchanged,
    /// No usable revision in the log yet.
    Skip,
}

impl PlannedAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Promote => "promote",
            Self::Replace => "replace archived build",
            Self::Unchanged => "unchanged",
            Self::Skip => "skip (no usable revision)",
        }
    }
}

/// What a dry run found for one upload.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedImport {
    pub key: BuildKey,
    /// Archive revision, or `None` when the log names no revision yet.
    pub revision: Option<String>,
    pub action: PlannedAction,
}

pub struct Ingestor {
    farm: Arc<BuildFarm>,
    vcs: Option<Arc<dyn VcsLogReader>>,
    retry: RetryConfig,
}

impl Ingestor {
    pub fn new(farm: Arc<BuildFarm>) -> Self {
        let retry = farm.config().retry.clone();
        Self {
            farm,
            vcs: None,
            retry,
        }
    }

    /// Attach a commit log reader so notices name candidate commits.
    #[must_use]
    pub fn with_vcs(mut self, vcs: Arc<dyn VcsLogReader>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// List what a run would do without touching the inbox or archive.
    pub async fn plan(&self) -> DomainResult<Vec<PlannedImport>> {
        let mut planned = Vec::new();
        for build in self.farm.get_new_builds().await? {
            let revision = match self.farm.revision_details(&build) {
                Ok(rev) => Some(rev.effective().to_string()),
                Err(DomainError::MissingRevisionInfo { .. }) => None,
                Err(e) => return Err(e),
            };
            let archivable = revision.as_deref().is_some_and(revision_extractor::is_valid_revision);
            // Same order of checks as promotion: content first, then key.
            let duplicate = self.farm.archive().find_by_checksum(&build.checksum()?).await?;
            let action = if duplicate.is_some_and(|archived| archived.exists()) {
                PlannedAction::Unchanged
            } else if !archivable {
                PlannedAction::Skip
            } else if self.farm.archive().contains(&build)? {
                PlannedAction::Replace
            } else {
                PlannedAction::Promote
            };
            planned.push(PlannedImport {
                key: build.key.clone(),
                revision,
                action,
            });
        }
        Ok(planned)
    }

    /// Promote every new upload and collect regressions.
    #[instrument(skip(self))]
    pub async fn run(&self) -> DomainResult<IngestReport> {
        let mut report = IngestReport::default();
        let builds = self.farm.get_new_builds().await?;
        info!(count = builds.len(), "Ingesting uploads");

        for build in builds {
            match self.ingest(&build).await {
                Ok(Ingested::Promoted(notice)) => {
                    report.promoted.push(build.key.clone());
                    if let Some(notice) = notice {
                        info!(build = %build.key, subject = %notice.subject(), "Regression detected");
                        report.regressions.push(*notice);
                    }
                }
                Ok(Ingested::Unchanged) => report.unchanged.push(build.key.clone()),
                Err(e @ (DomainError::MissingRevisionInfo { .. } | DomainError::InvalidRevision { .. })) => {
                    warn!(build = %build.key, error = %e, "No usable revision in log, leaving upload in inbox");
                    report.skipped.push(SkippedBuild {
                        key: build.key.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    error!(build = %build.key, error = %e, "Failed to ingest build");
                    report.skipped.push(SkippedBuild {
                        key: build.key.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            promoted = report.promoted.len(),
            unchanged = report.unchanged.len(),
            skipped = report.skipped.len(),
            regressions = report.regressions.len(),
            "Ingestion finished"
        );
        Ok(report)
    }

    async fn ingest(&self, build: &Build) -> DomainResult<Ingested> {
        let promotion = self.retrying(|| self.farm.archive_build(build)).await?;
        if !promotion.newly_archived {
            return Ok(Ingested::Unchanged);
        }

        let archived = promotion.build;
        let Some(revision) = archived.revision().map(ToString::to_string) else {
            return Ok(Ingested::Promoted(None));
        };

        let previous = match self
            .retrying(|| {
                self.farm
                    .get_previous_revision(archived.tree(), archived.host(), archived.compiler(), &revision)
            })
            .await
        {
            Ok(previous) => previous,
            Err(DomainError::NoSuchBuild { .. }) => {
                debug!(build = %archived.key, "No earlier revision to compare against");
                return Ok(Ingested::Promoted(None));
            }
            Err(e) => return Err(e),
        };

        let previous_build = self
            .farm
            .get_build(archived.tree(), archived.host(), archived.compiler(), Some(&previous))?;
        let status = self.farm.status(&archived)?;
        let previous_status = self.farm.status(&previous_build)?;

        if !status.regressed_since(&previous_status) {
            debug!(build = %archived.key, %previous, "No regression");
            return Ok(Ingested::Promoted(None));
        }

        let tree = self.farm.config().tree(archived.tree());
        let commits = match &tree {
            Some(tree) => self.candidate_commits(tree, &revision, &previous),
            None => Vec::new(),
        };

        Ok(Ingested::Promoted(Some(Box::new(RegressionNotice {
            tree: archived.tree().to_string(),
            host: archived.host().to_string(),
            compiler: archived.compiler().to_string(),
            branch: tree.as_ref().map(|t| t.branch.clone()),
            scm: tree.as_ref().map(|t| t.scm.clone()),
            revision,
            status,
            previous_revision: previous,
            previous_status,
            commits,
        }))))
    }

    /// Commits reachable from `revision` but not from `previous`.
    ///
    /// Reader failures only cost the notice its commit list.
    fn candidate_commits(&self, tree: &Tree, revision: &str, previous: &str) -> Vec<CommitEntry> {
        let Some(vcs) = &self.vcs else {
            return Vec::new();
        };
        let exclude = [previous.to_string()];
        let entries = match vcs.log(tree, revision, &exclude) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(tree = %tree.name, error = %e, "Failed to read commit log");
                return Vec::new();
            }
        };
        let mut commits = Vec::new();
        for entry in entries {
            match entry {
                Ok(commit) => commits.push(commit),
                Err(e) => {
                    warn!(tree = %tree.name, error = %e, "Commit log ended early");
                    break;
                }
            }
        }
        commits
    }

    /// Retry an operation while the metadata database reports it is busy.
    async fn retrying<T, F, Fut>(&self, mut op: F) -> DomainResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = DomainResult<T>>,
    {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.retry.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.retry.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build();
        let max_retries = self.retry.max_retries;
        let mut attempt = 0u32;

        retry(policy, || {
            attempt += 1;
            let current = attempt;
            let fut = op();
            async move {
                fut.await.map_err(|e| {
                    if e.is_retryable() && current <= max_retries {
                        warn!(attempt = current, error = %e, "Database busy, retrying");
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
    }
}

enum Ingested {
    Promoted(Option<Box<RegressionNotice>>),
    Unchanged,
}
