//! Derived-Data Cache
//!
//! Memoizes values computed from build logs (status, revision, stderr line
//! count, coverage percentage) in small files next to each other under one
//! cache directory.
//!
//! A cached value is fresh when the cache file's *modification* time is not
//! older than the source file's *change* time. Mirroring tools such as rsync
//! restore a file's mtime after rewriting it, but they cannot restore its
//! ctime, so the source side must be judged by ctime.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Build, BuildStatus, PathExt, Revision};
use crate::services::{log_parser, revision_extractor};

static LCOV_PERCENTAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<td class="headerCovTableEntryLo".*?>([0-9.]+) %"#).expect("lcov pattern")
});

/// Kind of derived value, which also names the cache file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedKind {
    Status,
    Revision,
    ErrCount,
}

impl DerivedKind {
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Revision => "revision",
            Self::ErrCount => "errcount",
        }
    }
}

/// On-disk encoding of a cached value.
///
/// `decode` returns `None` for content it cannot understand, which is
/// treated like a cache miss.
pub trait CacheValue: Sized {
    fn encode(&self) -> DomainResult<String>;
    fn decode(raw: &str) -> Option<Self>;
}

fn encode_json<T: Serialize>(value: &T) -> DomainResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn decode_json<T: DeserializeOwned>(raw: &str) -> Option<T> {
    serde_json::from_str(raw).ok()
}

impl CacheValue for BuildStatus {
    fn encode(&self) -> DomainResult<String> {
        encode_json(self)
    }

    fn decode(raw: &str) -> Option<Self> {
        decode_json(raw)
    }
}

// A log without revision markers is cached too, as `null`.
impl CacheValue for Option<Revision> {
    fn encode(&self) -> DomainResult<String> {
        encode_json(self)
    }

    fn decode(raw: &str) -> Option<Self> {
        decode_json(raw)
    }
}

impl CacheValue for usize {
    fn encode(&self) -> DomainResult<String> {
        Ok(self.to_string())
    }

    fn decode(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }
}

// Coverage percentages are stored verbatim; an empty file means "no figure".
impl CacheValue for Option<String> {
    fn encode(&self) -> DomainResult<String> {
        Ok(self.clone().unwrap_or_default())
    }

    fn decode(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Some((!raw.is_empty()).then(|| raw.to_string()))
    }
}

/// Second/nanosecond pair, comparable across ctime and mtime.
type Stamp = (i64, i64);

fn ctime(meta: &fs::Metadata) -> Stamp {
    (meta.ctime(), meta.ctime_nsec())
}

fn mtime(meta: &fs::Metadata) -> Stamp {
    (meta.mtime(), meta.mtime_nsec())
}

fn source_metadata(path: &Path) -> DomainResult<fs::Metadata> {
    fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DomainError::LogFileMissing(path.to_path_buf()),
        _ => DomainError::Io(e),
    })
}

/// Read-through cache of values derived from build logs.
#[derive(Debug, Clone)]
pub struct DerivedCache {
    dir: PathBuf,
    readonly: bool,
}

impl DerivedCache {
    pub fn new(dir: impl Into<PathBuf>, readonly: bool) -> Self {
        Self {
            dir: dir.into(),
            readonly,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub const fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Cache file for one derived value of a build.
    pub fn cache_path(&self, build: &Build, kind: DerivedKind) -> PathBuf {
        self.dir
            .join(build.key.file_stem())
            .with_extension_appended(kind.suffix())
    }

    /// Status of a build, recomputed when either log changed.
    #[instrument(skip(self, build), fields(build = %build.key))]
    pub fn status(&self, build: &Build) -> DomainResult<BuildStatus> {
        let mut changed = ctime(&source_metadata(&build.log_path())?);
        match fs::metadata(build.err_path()) {
            Ok(meta) => changed = changed.max(ctime(&meta)),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.read_through(changed, &self.cache_path(build, DerivedKind::Status), || {
            let log = build.read_log()?;
            let err = build.read_err()?;
            Ok(log_parser::build_status_from_logs(
                &String::from_utf8_lossy(&log),
                &String::from_utf8_lossy(&err),
            ))
        })
    }

    /// Revision reported by a build's log.
    ///
    /// # Errors
    ///
    /// `MissingRevisionInfo` when the log carries no revision marker.
    #[instrument(skip(self, build), fields(build = %build.key))]
    pub fn revision(&self, build: &Build) -> DomainResult<Revision> {
        let changed = ctime(&source_metadata(&build.log_path())?);
        let revision: Option<Revision> =
            self.read_through(changed, &self.cache_path(build, DerivedKind::Revision), || {
                let log = build.read_log()?;
                Ok(revision_extractor::revision_from_log(&String::from_utf8_lossy(&log)))
            })?;

        revision.ok_or_else(|| DomainError::MissingRevisionInfo {
            tree: build.tree().to_string(),
            host: build.host().to_string(),
            compiler: build.compiler().to_string(),
        })
    }

    /// Number of lines in the stderr log. A build without one counts zero.
    pub fn err_count(&self, build: &Build) -> DomainResult<usize> {
        let meta = match fs::metadata(build.err_path()) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        self.read_through(ctime(&meta), &self.cache_path(build, DerivedKind::ErrCount), || {
            let err = build.read_err()?;
            Ok(log_parser::error_line_count(&String::from_utf8_lossy(&err)))
        })
    }

    /// Coverage percentage from an lcov `index.html` report.
    ///
    /// `cache_name` is the file name of the cache entry inside the cache
    /// directory.
    pub fn lcov_percentage(&self, report: &Path, cache_name: &str) -> DomainResult<Option<String>> {
        let changed = ctime(&source_metadata(report)?);
        self.read_through(changed, &self.dir.join(cache_name), || {
            let html = fs::read_to_string(report)?;
            Ok(extract_lcov_percentage(&html))
        })
    }

    fn read_through<T, F>(&self, source_changed: Stamp, cache_file: &Path, compute: F) -> DomainResult<T>
    where
        T: CacheValue,
        F: FnOnce() -> DomainResult<T>,
    {
        if let Some(value) = Self::load_fresh(source_changed, cache_file)? {
            debug!(cache = %cache_file.display(), "Cache hit");
            return Ok(value);
        }

        debug!(cache = %cache_file.display(), "Cache miss");
        let value = compute()?;

        if !self.readonly {
            if let Err(e) = self.store(cache_file, &value.encode()?) {
                warn!(cache = %cache_file.display(), error = %e, "Failed to write cache entry");
            }
        }
        Ok(value)
    }

    fn load_fresh<T: CacheValue>(source_changed: Stamp, cache_file: &Path) -> DomainResult<Option<T>> {
        let meta = match fs::metadata(cache_file) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if mtime(&meta) < source_changed {
            return Ok(None);
        }

        let raw = match fs::read_to_string(cache_file) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = T::decode(&raw);
        if value.is_none() {
            warn!(cache = %cache_file.display(), "Ignoring unreadable cache entry");
        }
        Ok(value)
    }

    // Readers must never observe a half-written entry.
    fn store(&self, cache_file: &Path, contents: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let tmp = cache_file.with_extension_appended(&format!("tmp{}", std::process::id()));
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, cache_file).inspect_err(|_| {
            let _ = fs::remove_file(&tmp);
        })
    }
}

/// Pull the headline coverage percentage out of an lcov HTML report.
pub fn extract_lcov_percentage(html: &str) -> Option<String> {
    LCOV_PERCENTAGE.captures(html).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_lcov_percentage() {
        let html = r#"<tr>
    <td class="headerItem" width="20%">Functions:</td>
    <td class="headerValue" width="20%">6</td>
    <td class="headerCovTableEntryLo">3.7 %</td>
</tr>"#;
        assert_eq!(extract_lcov_percentage(html).as_deref(), Some("3.7"));
        assert_eq!(extract_lcov_percentage("<html></html>"), None);
    }

    #[test]
    fn test_optional_string_encoding() {
        assert_eq!(<Option<String>>::decode("").unwrap(), None);
        assert_eq!(<Option<String>>::decode("12.5\n").unwrap().as_deref(), Some("12.5"));
        assert_eq!(Some("1.0".to_string()).encode().unwrap(), "1.0");
        assert_eq!(None::<String>.encode().unwrap(), "");
    }

    #[test]
    fn test_count_decoding() {
        assert_eq!(usize::decode("3"), Some(3));
        assert_eq!(usize::decode("three"), None);
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(DerivedKind::Status.suffix(), "status");
        assert_eq!(DerivedKind::Revision.suffix(), "revision");
        assert_eq!(DerivedKind::ErrCount.suffix(), "errcount");
    }
}
