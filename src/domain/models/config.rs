use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{Tree, TreeConfig};

/// Main configuration structure for the build farm
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Root of the data layout (`data/upload`, `data/oldrevs`, `cache`, `lcov/data`)
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Derived-data cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Coverage report configuration
    #[serde(default)]
    pub lcov: LcovConfig,

    /// Retry policy for a busy metadata database
    #[serde(default)]
    pub retry: RetryConfig,

    /// Known trees, by name
    #[serde(default)]
    pub trees: BTreeMap<String, TreeConfig>,

    /// Known compiler names
    #[serde(default)]
    pub compilers: Vec<String>,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            cache: CacheConfig::default(),
            lcov: LcovConfig::default(),
            retry: RetryConfig::default(),
            trees: BTreeMap::new(),
            compilers: vec![],
        }
    }
}

impl Config {
    pub fn inbox_dir(&self) -> PathBuf {
        self.base_dir.join("data").join("upload")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.base_dir.join("data").join("oldrevs")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("cache"))
    }

    pub fn lcov_dir(&self) -> PathBuf {
        self.lcov
            .dir
            .clone()
            .unwrap_or_else(|| self.base_dir.join("lcov").join("data"))
    }

    /// Database path; relative paths are resolved against `base_dir`.
    pub fn database_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.database.path);
        if path.is_absolute() {
            path
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn database_url(&self) -> String {
        format!("sqlite:{}", self.database_path().display())
    }

    pub fn tree(&self, name: &str) -> Option<Tree> {
        self.trees.get(name).map(|t| Tree::from_config(name, t))
    }

    pub fn is_known_compiler(&self, compiler: &str) -> bool {
        self.compilers.iter().any(|c| c == compiler)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on a locked database before giving up
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_database_path() -> String {
    "db/hostdb.sqlite".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rotated log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Derived-data cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Cache directory; `<base_dir>/cache` when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Read through the cache without writing fresh values back
    #[serde(default)]
    pub readonly: bool,
}

/// Coverage report configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LcovConfig {
    /// Pseudo-host under which coverage reports are published
    #[serde(default = "default_lcov_host")]
    pub host: String,

    /// Report directory; `<base_dir>/lcov/data` when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_lcov_host() -> String {
    "coverage".to_string()
}

impl Default for LcovConfig {
    fn default() -> Self {
        Self {
            host: default_lcov_host(),
            dir: None,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    100
}

const fn default_max_backoff_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}
