//! Application services for the build farm.
//!
//! Pure log analysis (`log_parser`, `revision_extractor`, `checksum`,
//! `regression`), the file-backed stores and their cache, the query layer
//! and the ingestion job.

pub mod archive_store;
pub mod build_farm;
pub mod checksum;
pub mod derived_cache;
pub mod inbox_store;
pub mod ingest;
pub mod log_parser;
pub mod regression;
pub mod revision_extractor;

pub use archive_store::{ArchiveStore, Promotion};
pub use build_farm::{distinct_builds, BuildFarm};
pub use derived_cache::{DerivedCache, DerivedKind};
pub use inbox_store::InboxStore;
pub use ingest::{IngestReport, Ingestor, PlannedAction, PlannedImport, RegressionNotice, SkippedBuild};
pub use log_parser::build_status_from_logs;
pub use regression::is_regression;
pub use revision_extractor::revision_from_log;
