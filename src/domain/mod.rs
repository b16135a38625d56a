//! Domain layer for the build farm
//!
//! Core models, the error taxonomy and the ports that adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
