//! Common test utilities for integration tests
//!
//! Provides a throwaway build farm rooted in a temporary directory, backed by
//! an in-memory metadata database, plus helpers for writing uploads.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use buildfarm::adapters::sqlite::{create_migrated_test_pool, SqliteBuildIndex, SqliteHostRepository};
use buildfarm::domain::models::{Build, BuildKey, Config, Host, TreeConfig};
use buildfarm::services::{BuildFarm, DerivedKind};
use filetime::FileTime;
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const HOSTS: [&str; 2] = ["charis", "athena"];

/// Configuration for a farm under `base`, knowing trees `tdb` and `samba`
/// and compilers `cc` and `gcc`.
pub fn test_config(base: &Path) -> Config {
    let mut trees = BTreeMap::new();
    for name in ["tdb", "samba"] {
        trees.insert(
            name.to_string(),
            TreeConfig {
                scm: "git".to_string(),
                repo: format!("{name}.git"),
                branch: "master".to_string(),
                subdir: String::new(),
                srcdir: String::new(),
            },
        );
    }
    Config {
        base_dir: base.to_path_buf(),
        trees,
        compilers: vec!["cc".to_string(), "gcc".to_string()],
        ..Config::default()
    }
}

/// stdout log reporting `revision` and the given stage results.
pub fn build_log(revision: &str, stages: &[(&str, i64)]) -> String {
    let mut log = format!("BUILD COMMIT REVISION: {revision}\n");
    for (name, result) in stages {
        log.push_str(&format!("{name} STATUS: {result}\n"));
    }
    log
}

pub fn set_mtime(path: &Path, unix_secs: i64) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(unix_secs, 0)).expect("Failed to set mtime");
}

pub struct TestFarm {
    pub dir: TempDir,
    pub pool: SqlitePool,
    pub farm: Arc<BuildFarm>,
}

impl TestFarm {
    /// A farm with the default test configuration and hosts registered.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = test_config(dir.path());
        customize(&mut config);

        let pool = create_migrated_test_pool().await.expect("Failed to create test database");
        let hosts = Arc::new(SqliteHostRepository::new(pool.clone()));
        let index = Arc::new(SqliteBuildIndex::new(pool.clone()));
        let farm = BuildFarm::new(config, hosts, index);
        farm.create_layout().expect("Failed to create layout");

        for name in HOSTS {
            farm.hosts()
                .create_host(&Host::new(name).with_platform("linux"))
                .await
                .expect("Failed to register host");
        }

        Self {
            dir,
            pool,
            farm: Arc::new(farm),
        }
    }

    /// Write an upload into the inbox.
    pub fn upload(&self, tree: &str, host: &str, compiler: &str, log: &str, err: Option<&str>) -> Build {
        let build = Build::new(BuildKey::inbox(tree, host, compiler), &self.farm.config().inbox_dir());
        fs::write(build.log_path(), log).expect("Failed to write log");
        if let Some(err) = err {
            fs::write(build.err_path(), err).expect("Failed to write err log");
        }
        build
    }

    /// Backdate the inbox cache entries of a triple so they read as stale.
    ///
    /// A second upload of the same triple can land within one timestamp
    /// tick of the first upload's cache entries, where ctime and mtime
    /// compare equal.
    pub fn invalidate_cache(&self, tree: &str, host: &str, compiler: &str) {
        let build = Build::new(BuildKey::inbox(tree, host, compiler), &self.farm.config().inbox_dir());
        for kind in [DerivedKind::Status, DerivedKind::Revision, DerivedKind::ErrCount] {
            let entry = self.farm.cache().cache_path(&build, kind);
            if entry.exists() {
                set_mtime(&entry, 0);
            }
        }
    }

    /// Upload again for a triple that was uploaded before in this test.
    pub fn reupload(&self, tree: &str, host: &str, compiler: &str, log: &str, err: Option<&str>) -> Build {
        self.invalidate_cache(tree, host, compiler);
        self.upload(tree, host, compiler, log, err)
    }

    /// Write an upload whose log claims to have been produced at `unix_secs`,
    /// replacing any earlier upload of the triple.
    pub fn upload_at(&self, tree: &str, host: &str, compiler: &str, log: &str, unix_secs: i64) -> Build {
        let build = self.reupload(tree, host, compiler, log, None);
        set_mtime(&build.log_path(), unix_secs);
        build
    }

    /// Upload and promote a build of `tree` on `host` with `cc`.
    pub async fn archive(&self, tree: &str, host: &str, log: &str, unix_secs: i64) -> Build {
        let upload = self.upload_at(tree, host, "cc", log, unix_secs);
        self.farm.upload_build(&upload).await.expect("Failed to promote upload")
    }

    pub fn archive_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.farm.config().archive_dir())
            .expect("Failed to read archive")
            .map(|e| e.expect("Failed to read entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
