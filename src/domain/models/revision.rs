//! Source-control revision reported by a build log.

use serde::{Deserialize, Serialize};

/// Revision details extracted from a build log.
///
/// `id` is the historical `BUILD REVISION` marker (or the commit id when the
/// log only carries that one). When a commit id is present it is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub id: String,
    pub commit_id: Option<String>,
    pub timestamp: Option<String>,
}

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            commit_id: None,
            timestamp: None,
        }
    }

    /// The revision used to key the archive.
    pub fn effective(&self) -> &str {
        self.commit_id.as_deref().unwrap_or(&self.id)
    }
}
