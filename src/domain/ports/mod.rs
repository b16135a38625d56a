//! Port trait definitions (Hexagonal Architecture)
//!
//! - HostRepository: host registry
//! - BuildIndex: insertion-ordered index of archived builds
//! - VcsLogReader: commit history for attributing regressions

pub mod build_index;
pub mod host_repository;
pub mod vcs_log;

pub use build_index::{BuildFilter, BuildIndex};
pub use host_repository::HostRepository;
pub use vcs_log::{CommitEntry, VcsLogReader};
