//! Source trees built by the farm.

use serde::{Deserialize, Serialize};

/// Configuration of one tree, as listed in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    pub scm: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub subdir: String,
    #[serde(default)]
    pub srcdir: String,
}

fn default_branch() -> String {
    "master".to_string()
}

/// A named source tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tree {
    pub name: String,
    pub scm: String,
    pub repo: String,
    pub branch: String,
    pub subdir: String,
    pub srcdir: String,
}

impl Tree {
    pub fn from_config(name: &str, config: &TreeConfig) -> Self {
        Self {
            name: name.to_string(),
            scm: config.scm.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            subdir: config.subdir.clone(),
            srcdir: config.srcdir.clone(),
        }
    }
}
