//! Version-control log reader port.
//!
//! Only the notifier needs commit details; the engine passes revision
//! strings through.

use crate::domain::errors::DomainResult;
use crate::domain::models::Tree;

/// One commit in a tree's history.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CommitEntry {
    pub revision: String,
    pub author: String,
    pub committer: String,
    pub message: String,
}

/// Reads commits of a tree starting at `from`, stopping at any excluded revision.
///
/// The returned sequence is lazy and finite, and can only be walked once.
pub trait VcsLogReader: Send + Sync {
    fn log<'a>(
        &'a self,
        tree: &Tree,
        from: &str,
        exclude: &[String],
    ) -> DomainResult<Box<dyn Iterator<Item = DomainResult<CommitEntry>> + 'a>>;
}
