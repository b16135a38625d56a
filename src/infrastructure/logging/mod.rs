//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - Human or JSON diagnostics on stderr, keeping stdout for command output
//! - Optional daily-rotated JSON log files

pub mod config;
pub mod logger;

pub use config::{LogConfig, LogFormat};
pub use logger::LoggerImpl;
