//! Status classifier: turns raw build output into a [`BuildStatus`].
//!
//! A log with no recognizable stage lines yields an empty ("unknown")
//! status; classification never fails.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::models::{BuildStatus, OtherFailure, StageResult};

static STAGE_STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z_]+) STATUS:\s*(\d+)$").expect("stage status pattern"));

static LEGACY_ACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ACTION (PASSED|FAILED):\s+test$").expect("action pattern"));

const TEST_STAGE: &str = "TEST";
const DISK_FULL: &str = "No space left on device";
const TIMEOUT: &str = "maximum runtime exceeded";

#[derive(Debug, Default)]
struct TestTally {
    successes: i64,
    failures: i64,
}

impl TestTally {
    const fn is_empty(&self) -> bool {
        self.successes + self.failures == 0
    }
}

/// Classify a build from its stdout and stderr text.
pub fn build_status_from_logs(log: &str, err: &str) -> BuildStatus {
    let mut status = BuildStatus::default();
    let mut tally = TestTally::default();
    let mut test_seen = false;

    for line in log.lines() {
        if line.contains(DISK_FULL) {
            status.other_failures.insert(OtherFailure::DiskFull);
            continue;
        }
        if line.contains(TIMEOUT) {
            status.other_failures.insert(OtherFailure::Timeout);
            continue;
        }
        if line.starts_with("PANIC:") || line.starts_with("INTERNAL ERROR:") {
            status.other_failures.insert(OtherFailure::Panic);
            continue;
        }
        if line.starts_with("testsuite-failure: ") || line.starts_with("testsuite-error: ") {
            tally.failures += 1;
            continue;
        }
        if line.starts_with("testsuite-success: ") {
            tally.successes += 1;
            continue;
        }
        if let Some(caps) = STAGE_STATUS.captures(line) {
            // Digits only, but the value may still overflow i64.
            if let Ok(result) = caps[2].parse::<i64>() {
                if &caps[1] == TEST_STAGE {
                    test_seen = true;
                }
                status.stages.push(StageResult::new(&caps[1], result));
            }
            continue;
        }
        if !test_seen {
            if let Some(caps) = LEGACY_ACTION.captures(line) {
                let result = i64::from(&caps[1] != "PASSED");
                status.stages.push(StageResult::new(TEST_STAGE, result));
            }
        }
    }

    if err.lines().any(|line| line.contains(DISK_FULL)) {
        status.other_failures.insert(OtherFailure::DiskFull);
    }

    if !tally.is_empty() {
        for stage in status.stages.iter_mut().filter(|s| s.name == TEST_STAGE) {
            if stage.result == 1 && tally.failures == 0 {
                stage.result = -1;
                status.other_failures.insert(OtherFailure::InconsistentTestResult);
            } else {
                stage.result = tally.failures;
            }
        }
    }

    status
}

/// Number of lines in the stderr log.
pub fn error_line_count(err: &str) -> usize {
    err.lines().count()
}
