//! Revision markers emitted by the build scripts.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::models::Revision;

static REVISION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+:@~-]*$").expect("revision pattern"));

const COMMIT_REVISION: &str = "BUILD COMMIT REVISION:";
const REVISION: &str = "BUILD REVISION:";
const COMMIT_TIME: &str = "BUILD COMMIT TIME:";

/// Scan a stdout log for revision markers.
///
/// The last occurrence of each marker wins. Returns `None` when neither
/// revision marker is present.
pub fn revision_from_log(log: &str) -> Option<Revision> {
    let mut revision: Option<String> = None;
    let mut commit_id: Option<String> = None;
    let mut timestamp: Option<String> = None;

    for line in log.lines() {
        if let Some(value) = line.strip_prefix(COMMIT_REVISION) {
            commit_id = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix(REVISION) {
            revision = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix(COMMIT_TIME) {
            timestamp = Some(value.trim().to_string());
        }
    }

    let id = revision.or_else(|| commit_id.clone())?;
    Some(Revision {
        id,
        commit_id,
        timestamp,
    })
}

/// Whether a revision id is safe to embed in an archive file name.
pub fn is_valid_revision(id: &str) -> bool {
    REVISION_ID.is_match(id)
}
