//! Build identity and on-disk log pairs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use super::{BuildStatus, Revision};
use crate::domain::errors::{DomainError, DomainResult};
use crate::services::checksum;

/// Extension of the standard-output log.
pub const LOG_EXTENSION: &str = "log";
/// Extension of the standard-error log.
pub const ERR_EXTENSION: &str = "err";

/// Identifies one build attempt.
///
/// Inbox builds have no revision yet; archived builds always do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildKey {
    pub tree: String,
    pub host: String,
    pub compiler: String,
    pub revision: Option<String>,
}

impl BuildKey {
    pub fn inbox(tree: &str, host: &str, compiler: &str) -> Self {
        Self {
            tree: tree.to_string(),
            host: host.to_string(),
            compiler: compiler.to_string(),
            revision: None,
        }
    }

    pub fn archived(tree: &str, host: &str, compiler: &str, revision: &str) -> Self {
        Self {
            revision: Some(revision.to_string()),
            ..Self::inbox(tree, host, compiler)
        }
    }

    /// Deterministic file stem shared by the log pair and the cache files.
    ///
    /// `build.<tree>.<host>.<compiler>` in the inbox,
    /// `build.<tree>.<host>.<compiler>-<revision>` in the archive.
    pub fn file_stem(&self) -> String {
        match &self.revision {
            Some(rev) => format!("build.{}.{}.{}-{}", self.tree, self.host, self.compiler, rev),
            None => format!("build.{}.{}.{}", self.tree, self.host, self.compiler),
        }
    }

    pub fn same_triple(&self, other: &Self) -> bool {
        self.tree == other.tree && self.host == other.host && self.compiler == other.compiler
    }

    pub fn not_found(&self) -> DomainError {
        DomainError::no_such_build(&self.tree, &self.host, &self.compiler, self.revision.as_deref())
    }
}

impl fmt::Display for BuildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(rev) => write!(
                f,
                "revision {} of {} on {} using {}",
                rev, self.tree, self.host, self.compiler
            ),
            None => write!(f, "{} on {} using {}", self.tree, self.host, self.compiler),
        }
    }
}

/// A build's pair of log files in either the inbox or the archive.
#[derive(Debug, Clone)]
pub struct Build {
    pub key: BuildKey,
    basename: PathBuf,
    checksum: OnceLock<String>,
}

impl Build {
    pub fn new(key: BuildKey, dir: &Path) -> Self {
        let basename = dir.join(key.file_stem());
        Self {
            key,
            basename,
            checksum: OnceLock::new(),
        }
    }

    pub fn tree(&self) -> &str {
        &self.key.tree
    }

    pub fn host(&self) -> &str {
        &self.key.host
    }

    pub fn compiler(&self) -> &str {
        &self.key.compiler
    }

    pub fn revision(&self) -> Option<&str> {
        self.key.revision.as_deref()
    }

    pub fn basename(&self) -> &Path {
        &self.basename
    }

    pub fn log_path(&self) -> PathBuf {
        self.basename.with_extension_appended(LOG_EXTENSION)
    }

    pub fn err_path(&self) -> PathBuf {
        self.basename.with_extension_appended(ERR_EXTENSION)
    }

    pub fn exists(&self) -> bool {
        self.log_path().is_file()
    }

    /// Read the full standard-output log.
    pub fn read_log(&self) -> DomainResult<Vec<u8>> {
        let path = self.log_path();
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DomainError::LogFileMissing(path),
            _ => DomainError::Io(e),
        })
    }

    /// Read the full standard-error log; a missing file reads as empty.
    pub fn read_err(&self) -> DomainResult<Vec<u8>> {
        match fs::read(self.err_path()) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Modification time of the stdout log.
    pub fn upload_time(&self) -> DomainResult<SystemTime> {
        let path = self.log_path();
        let meta = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DomainError::LogFileMissing(path),
            _ => DomainError::Io(e),
        })?;
        Ok(meta.modified()?)
    }

    pub fn age(&self) -> DomainResult<Duration> {
        let uploaded = self.upload_time()?;
        Ok(SystemTime::now().duration_since(uploaded).unwrap_or_default())
    }

    /// SHA-1 of the stdout log, computed once per value.
    pub fn checksum(&self) -> DomainResult<String> {
        if let Some(sum) = self.checksum.get() {
            return Ok(sum.clone());
        }
        let sum = checksum::file_checksum(&self.log_path())?;
        Ok(self.checksum.get_or_init(|| sum).clone())
    }

    /// Remove both log files. Missing files are ignored.
    pub fn remove(&self) -> DomainResult<()> {
        for path in [self.log_path(), self.err_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl PartialEq for Build {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.basename == other.basename
    }
}

impl Eq for Build {}

impl fmt::Display for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Build: {}>", self.key)
    }
}

/// Extension helper: append `.ext` without replacing an existing suffix.
///
/// File stems contain dots (`build.tree.host.cc`), so `Path::with_extension`
/// would clobber the compiler name.
pub trait PathExt {
    fn with_extension_appended(&self, ext: &str) -> PathBuf;
}

impl PathExt for Path {
    fn with_extension_appended(&self, ext: &str) -> PathBuf {
        let mut name = self.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        PathBuf::from(name)
    }
}

/// One row of the archive index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Insertion order within the archive.
    pub id: i64,
    pub tree: String,
    pub host: String,
    pub compiler: String,
    pub revision: String,
    pub commit_revision: Option<String>,
    pub checksum: String,
    pub upload_time: DateTime<Utc>,
    pub status: BuildStatus,
}

impl BuildRecord {
    pub fn key(&self) -> BuildKey {
        BuildKey::archived(&self.tree, &self.host, &self.compiler, &self.revision)
    }
}

/// Data needed to insert a freshly archived build into the index.
#[derive(Debug, Clone)]
pub struct NewBuildRecord {
    pub key: BuildKey,
    pub revision: Revision,
    pub checksum: String,
    pub upload_time: DateTime<Utc>,
    pub status: BuildStatus,
}

/// Key, revision and status of one build, as shown on summary pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub key: BuildKey,
    pub revision: Revision,
    pub status: BuildStatus,
}
