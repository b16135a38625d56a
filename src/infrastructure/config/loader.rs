use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::models::Config;

/// Config file read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "buildfarm.yaml";

/// Prefix of environment overrides; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "BUILDFARM_";

const LOCAL_CONFIG_FILE: &str = "buildfarm.local.yaml";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid busy_timeout_ms: {0}. Must be at least 1")]
    InvalidBusyTimeout(u64),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Tree '{0}' must name an scm and a repo")]
    IncompleteTree(String),

    #[error("Invalid name '{0}': must be non-empty and contain no '.', '-' or '/'")]
    InvalidName(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `path`, or `buildfarm.yaml` in the working directory
    /// 3. `buildfarm.local.yaml` next to that file (optional)
    /// 4. Environment variables (`BUILDFARM_*` prefix, highest priority)
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let main = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);
        let local = main
            .parent()
            .map_or_else(|| PathBuf::from(LOCAL_CONFIG_FILE), |dir| dir.join(LOCAL_CONFIG_FILE));

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&main))
            .merge(Yaml::file(&local))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", main.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        if config.database.busy_timeout_ms == 0 {
            return Err(ConfigError::InvalidBusyTimeout(config.database.busy_timeout_ms));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        // Names end up in file names split on '.' and '-'.
        for (name, tree) in &config.trees {
            validate_name(name)?;
            if tree.scm.is_empty() || tree.repo.is_empty() {
                return Err(ConfigError::IncompleteTree(name.clone()));
            }
        }
        for compiler in &config.compilers {
            validate_name(compiler)?;
        }

        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.contains(['.', '-', '/']) {
        return Err(ConfigError::InvalidName(name.to_string()));
    }
    Ok(())
}
