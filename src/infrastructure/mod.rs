//! Infrastructure layer
//!
//! Cross-cutting concerns used by the binary:
//! - Configuration loading (figment)
//! - Logging setup (tracing)

pub mod config;
pub mod logging;
