//! Domain models for the build farm.

pub mod build;
pub mod config;
pub mod host;
pub mod revision;
pub mod status;
pub mod tree;

pub use build::{
    Build, BuildKey, BuildRecord, BuildSummary, NewBuildRecord, PathExt, ERR_EXTENSION, LOG_EXTENSION,
};
pub use config::{CacheConfig, Config, DatabaseConfig, LcovConfig, LoggingConfig, RetryConfig};
pub use host::Host;
pub use revision::Revision;
pub use status::{BuildStatus, OtherFailure, StageResult};
pub use tree::{Tree, TreeConfig};
