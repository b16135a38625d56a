//! CLI command implementations.

pub mod builds;
pub mod host;
pub mod import;
pub mod init;
pub mod lcov;
