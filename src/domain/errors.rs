//! Domain errors for the build farm result store.

use std::path::PathBuf;
use thiserror::Error;

/// Format an optional revision suffix for error messages.
fn format_revision(revision: Option<&String>) -> String {
    revision.map(|r| format!(" at revision {r}")).unwrap_or_default()
}

/// Domain-level errors that can occur in the build farm.
///
/// Parsing anomalies are never errors: they are folded into
/// [`BuildStatus`](crate::domain::models::BuildStatus) as data.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("No build of {tree} on {host} using {compiler}{}", format_revision(.revision.as_ref()))]
    NoSuchBuild {
        tree: String,
        host: String,
        compiler: String,
        revision: Option<String>,
    },

    #[error("No revision information in log of {tree} on {host} using {compiler}")]
    MissingRevisionInfo {
        tree: String,
        host: String,
        compiler: String,
    },

    /// The log names a revision that cannot be used as part of a file name.
    #[error("Unusable revision {revision:?} in log of {tree} on {host} using {compiler}")]
    InvalidRevision {
        tree: String,
        host: String,
        compiler: String,
        revision: String,
    },

    #[error("Log file missing: {}", .0.display())]
    LogFileMissing(PathBuf),

    #[error("Host already exists: {0}")]
    HostAlreadyExists(String),

    #[error("No such host: {0}")]
    NoSuchHost(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(String),

    /// The metadata database stayed locked for longer than the busy timeout.
    #[error("Database busy: {0}")]
    DatabaseBusy(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn no_such_build(tree: &str, host: &str, compiler: &str, revision: Option<&str>) -> Self {
        Self::NoSuchBuild {
            tree: tree.to_string(),
            host: host.to_string(),
            compiler: compiler.to_string(),
            revision: revision.map(ToString::to_string),
        }
    }

    /// Whether the caller should retry the operation later.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DatabaseBusy(_))
    }

    /// Whether this is a "requested key absent" condition.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchBuild { .. } | Self::NoSuchHost(_))
    }
}

// SQLITE_BUSY, SQLITE_LOCKED and their extended codes.
const BUSY_CODES: &[&str] = &["5", "6", "261", "262", "517", "773"];

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().is_some_and(|code| BUSY_CODES.contains(&&*code)) {
                return Self::DatabaseBusy(err.to_string());
            }
        }
        if matches!(err, sqlx::Error::PoolTimedOut) {
            return Self::DatabaseBusy(err.to_string());
        }
        Self::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
