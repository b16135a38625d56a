//! Buildfarm - build result store and status engine
//!
//! Hosts upload the stdout and stderr logs of their builds into an inbox.
//! This crate classifies those logs into structured statuses, promotes them
//! into a revision-keyed archive with content deduplication, caches derived
//! values on disk and detects regressions between consecutive revisions.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, ports and the error taxonomy
//! - **Service Layer** (`services`): log parsing, stores, queries, ingestion
//! - **Adapters** (`adapters`): the SQLite metadata database
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use buildfarm::{BuildFarm, ConfigLoader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let farm = BuildFarm::open(ConfigLoader::load(None)?).await?;
//!     for record in farm.get_last_builds().await? {
//!         println!("{} {}", record.key(), record.status);
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Build, BuildKey, BuildRecord, BuildStatus, BuildSummary, Config, Host, OtherFailure, Revision,
    StageResult, Tree,
};
pub use domain::ports::{BuildFilter, BuildIndex, CommitEntry, HostRepository, VcsLogReader};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ArchiveStore, BuildFarm, DerivedCache, InboxStore, Ingestor};
