//! Regression comparator.
//!
//! Rules are applied in order and the first one that decides wins:
//!
//! 1. a full disk on the new build is never a regression;
//! 2. a timeout on both builds is not a regression;
//! 3. a new panic is always a regression;
//! 4. completing fewer stages is a regression;
//! 5. otherwise any stage whose result grew is a regression. Positions
//!    where the stage names differ are not comparable and are skipped.

use tracing::warn;

use crate::domain::models::{BuildStatus, OtherFailure};

/// Whether `new` is worse than `old`.
pub fn is_regression(old: &BuildStatus, new: &BuildStatus) -> bool {
    if new.has(OtherFailure::DiskFull) {
        return false;
    }
    if new.has(OtherFailure::Timeout) && old.has(OtherFailure::Timeout) {
        return false;
    }
    if new.has(OtherFailure::Panic) && !old.has(OtherFailure::Panic) {
        return true;
    }
    if new.stages.len() < old.stages.len() {
        return true;
    }
    old.stages.iter().zip(&new.stages).any(|(before, after)| {
        if before.name != after.name {
            warn!(
                old_stage = %before.name,
                new_stage = %after.name,
                "Mismatched stage order, skipping position"
            );
            return false;
        }
        after.result > before.result
    })
}
