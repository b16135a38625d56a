//! Inbox Store
//!
//! The upload directory where hosts drop `build.<tree>.<host>.<compiler>.log`
//! (and optionally `.err`). It is written by an untrusted upload mechanism,
//! so enumeration only ever yields names that parse cleanly.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::{Build, BuildKey, Config, LOG_EXTENSION};
use crate::domain::ports::HostRepository;

/// Split an inbox file name into its (tree, host, compiler) triple.
fn parse_log_name(name: &str) -> Option<(&str, &str, &str)> {
    let mut parts = name.split('.');
    let (Some("build"), Some(tree), Some(host), Some(compiler), Some(ext), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return None;
    };
    if ext != LOG_EXTENSION || tree.is_empty() || host.is_empty() || compiler.is_empty() {
        return None;
    }
    Some((tree, host, compiler))
}

pub struct InboxStore {
    dir: PathBuf,
    trees: BTreeSet<String>,
    compilers: BTreeSet<String>,
}

impl InboxStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        trees: impl IntoIterator<Item = String>,
        compilers: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            trees: trees.into_iter().collect(),
            compilers: compilers.into_iter().collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.inbox_dir(),
            config.trees.keys().cloned(),
            config.compilers.iter().cloned(),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look up the pending upload for a triple.
    ///
    /// # Errors
    ///
    /// `NoSuchBuild` when no log has been uploaded for the triple.
    pub fn get_build(&self, tree: &str, host: &str, compiler: &str) -> DomainResult<Build> {
        let build = Build::new(BuildKey::inbox(tree, host, compiler), &self.dir);
        if !build.exists() {
            return Err(build.key.not_found());
        }
        Ok(build)
    }

    /// Every well-formed upload, whatever its tree, host or compiler.
    pub fn list_all(&self) -> DomainResult<Vec<Build>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut builds = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            match parse_log_name(name) {
                Some((tree, host, compiler)) => {
                    builds.push(Build::new(BuildKey::inbox(tree, host, compiler), &self.dir));
                }
                None => debug!(file = name, "Ignoring unrecognized inbox entry"),
            }
        }
        builds.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(builds)
    }

    /// Uploads whose tree and compiler are configured and whose host is
    /// registered. Anything else is skipped without error.
    #[instrument(skip(self, hosts))]
    pub async fn list_new(&self, hosts: &dyn HostRepository) -> DomainResult<Vec<Build>> {
        let known_hosts: BTreeSet<String> = hosts.hosts().await?.into_iter().map(|h| h.name).collect();

        let builds: Vec<Build> = self
            .list_all()?
            .into_iter()
            .filter(|build| {
                let accepted = self.trees.contains(build.tree())
                    && self.compilers.contains(build.compiler())
                    && known_hosts.contains(build.host());
                if !accepted {
                    debug!(build = %build.key, "Skipping upload for unknown tree, compiler or host");
                }
                accepted
            })
            .collect();
        Ok(builds)
    }

    /// Whether any inbox file names `host`.
    pub fn has_host(&self, host: &str) -> DomainResult<bool> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let file_name = entry?.file_name();
            if file_name.to_str().and_then(|n| n.split('.').nth(2)) == Some(host) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete both files of an upload.
    pub fn remove(&self, build: &Build) -> DomainResult<()> {
        build.remove()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_name() {
        assert_eq!(parse_log_name("build.tdb.charis.cc.log"), Some(("tdb", "charis", "cc")));
        assert_eq!(parse_log_name("build.tdb.charis.cc.err"), None);
        assert_eq!(parse_log_name("build.tdb.charis.log"), None);
        assert_eq!(parse_log_name("build.tdb.charis.cc.x.log"), None);
        assert_eq!(parse_log_name("bld.tdb.charis.cc.log"), None);
        assert_eq!(parse_log_name("build..charis.cc.log"), None);
    }

    #[test]
    fn test_list_all_and_get_build() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("build.tdb.charis.cc.log"), "BUILD STATUS: 0\n").unwrap();
        fs::write(dir.path().join("build.tdb.charis.cc.err"), "").unwrap();
        fs::write(dir.path().join("build.samba.charis.gcc.log"), "").unwrap();
        fs::write(dir.path().join("README"), "").unwrap();

        let store = InboxStore::new(dir.path(), Vec::new(), Vec::new());
        let keys: Vec<_> = store.list_all().unwrap().into_iter().map(|b| b.key).collect();
        assert_eq!(
            keys,
            vec![BuildKey::inbox("samba", "charis", "gcc"), BuildKey::inbox("tdb", "charis", "cc")]
        );

        assert!(store.get_build("tdb", "charis", "cc").is_ok());
        let err = store.get_build("tdb", "charis", "gcc").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = InboxStore::new(dir.path().join("upload"), Vec::new(), Vec::new());
        assert!(store.list_all().unwrap().is_empty());
        assert!(!store.has_host("charis").unwrap());
    }

    #[test]
    fn test_has_host() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("build.tdb.charis.cc.log"), "").unwrap();
        let store = InboxStore::new(dir.path(), Vec::new(), Vec::new());
        assert!(store.has_host("charis").unwrap());
        assert!(!store.has_host("tdb").unwrap());
    }
}
