//! Structured build status derived from raw build logs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Result of one build stage (`CONFIGURE`, `BUILD`, `TEST`, ...).
///
/// A result of `0` means success. The `TEST` stage may carry the number of
/// failed sub-tests, or `-1` when the coarse and granular signals disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    pub name: String,
    pub result: i64,
}

impl StageResult {
    pub fn new(name: impl Into<String>, result: i64) -> Self {
        Self {
            name: name.into(),
            result,
        }
    }
}

/// A build-wide anomaly not tied to a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtherFailure {
    DiskFull,
    Timeout,
    Panic,
    InconsistentTestResult,
}

impl OtherFailure {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DiskFull => "disk full",
            Self::Timeout => "timeout",
            Self::Panic => "panic",
            Self::InconsistentTestResult => "inconsistent test result",
        }
    }
}

impl fmt::Display for OtherFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a build: ordered stage results plus build-wide failure flags.
///
/// Stages keep their order of first appearance in the log; a stage name that
/// appears twice produces two entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatus {
    pub stages: Vec<StageResult>,
    pub other_failures: BTreeSet<OtherFailure>,
}

impl BuildStatus {
    pub fn new(stages: Vec<StageResult>, other_failures: impl IntoIterator<Item = OtherFailure>) -> Self {
        Self {
            stages,
            other_failures: other_failures.into_iter().collect(),
        }
    }

    /// Build a status from `(name, result)` pairs with no other failures.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        Self {
            stages: pairs
                .into_iter()
                .map(|(name, result)| StageResult::new(name, result))
                .collect(),
            other_failures: BTreeSet::new(),
        }
    }

    pub fn failed(&self) -> bool {
        !self.other_failures.is_empty() || self.stages.iter().any(|s| s.result != 0)
    }

    pub fn has(&self, failure: OtherFailure) -> bool {
        self.other_failures.contains(&failure)
    }

    /// A full disk is a problem with the host rather than with the code.
    pub fn broken_host(&self) -> bool {
        self.has(OtherFailure::DiskFull)
    }

    /// True when no stage line was ever seen.
    pub fn is_unknown(&self) -> bool {
        self.stages.is_empty() && self.other_failures.is_empty()
    }

    /// Whether this build is worse than `older`.
    pub fn regressed_since(&self, older: &Self) -> bool {
        crate::services::regression::is_regression(older, self)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.other_failures.is_empty() {
            let names: Vec<&str> = self.other_failures.iter().map(OtherFailure::as_str).collect();
            return f.write_str(&names.join(","));
        }
        let results: Vec<String> = self.stages.iter().map(|s| s.result.to_string()).collect();
        f.write_str(&results.join("/"))
    }
}
