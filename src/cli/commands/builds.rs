//! Build query CLI commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use tracing::warn;

use crate::cli::open_farm;
use crate::cli::output::{format_age, list_table, output, render_list, CommandOutput};
use crate::domain::models::{Build, BuildRecord, BuildStatus, Config, Revision};
use crate::services::BuildFarm;

#[derive(Args, Debug)]
pub struct BuildsArgs {
    #[command(subcommand)]
    pub command: BuildsCommands,
}

#[derive(Subcommand, Debug)]
pub enum BuildsCommands {
    /// Latest archived build of every tree, host and compiler
    Last,
    /// Latest archived builds of one tree
    Tree {
        /// Tree name
        tree: String,
    },
    /// Latest archived builds from one host
    Host {
        /// Host name
        host: String,
    },
    /// Every archived build of a tree at one revision
    Revision {
        /// Tree name
        tree: String,
        /// Revision
        revision: String,
    },
    /// Archived builds of one tree, host and compiler, oldest first
    History {
        tree: String,
        host: String,
        compiler: String,
    },
    /// Details of one build
    Show {
        tree: String,
        host: String,
        compiler: String,
        /// Archived revision; the inbox upload when omitted
        #[arg(short, long)]
        revision: Option<String>,
        /// Print the full stdout log
        #[arg(long)]
        log: bool,
    },
    /// Uploads waiting in the inbox
    New,
}

#[derive(Debug, serde::Serialize)]
pub struct BuildRow {
    pub tree: String,
    pub host: String,
    pub compiler: String,
    pub revision: Option<String>,
    /// `None` when the build could not be read.
    pub status: Option<BuildStatus>,
    pub upload_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<BuildRecord> for BuildRow {
    fn from(record: BuildRecord) -> Self {
        Self {
            tree: record.tree,
            host: record.host,
            compiler: record.compiler,
            revision: Some(record.revision),
            status: Some(record.status),
            upload_time: Some(record.upload_time),
            error: None,
        }
    }
}

impl BuildRow {
    /// Row for a build whose status is read from its logs.
    fn from_build(farm: &BuildFarm, build: &Build) -> Result<Self> {
        let revision = match build.revision() {
            Some(rev) => Some(rev.to_string()),
            None => farm.revision_details(build).ok().map(|r| r.effective().to_string()),
        };
        Ok(Self {
            tree: build.tree().to_string(),
            host: build.host().to_string(),
            compiler: build.compiler().to_string(),
            revision,
            status: Some(farm.status(build)?),
            upload_time: Some(build.upload_time()?.into()),
            error: None,
        })
    }

    /// Row for a build that vanished or could not be read while listing.
    fn unavailable(build: &Build, error: &anyhow::Error) -> Self {
        Self {
            tree: build.tree().to_string(),
            host: build.host().to_string(),
            compiler: build.compiler().to_string(),
            revision: build.revision().map(ToString::to_string),
            status: None,
            upload_time: None,
            error: Some(error.to_string()),
        }
    }

    fn status_text(&self) -> String {
        self.status
            .as_ref()
            .map_or_else(|| "no status".to_string(), ToString::to_string)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct BuildListOutput {
    pub builds: Vec<BuildRow>,
    #[serde(skip)]
    pub now: DateTime<Utc>,
}

impl CommandOutput for BuildListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["tree", "host", "compiler", "revision", "status", "age"]);
        for row in &self.builds {
            table.add_row(vec![
                row.tree.clone(),
                row.host.clone(),
                row.compiler.clone(),
                row.revision.clone().unwrap_or_else(|| "-".to_string()),
                row.status_text(),
                row.upload_time.map_or_else(|| "-".to_string(), |t| format_age(t, self.now)),
            ]);
        }
        render_list("build", &table, self.builds.len())
    }
}

#[derive(Debug, serde::Serialize)]
pub struct BuildDetailOutput {
    #[serde(flatten)]
    pub row: BuildRow,
    pub revision_details: Option<Revision>,
    pub err_count: usize,
    pub log_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

impl CommandOutput for BuildDetailOutput {
    fn to_human(&self) -> String {
        let row = &self.row;
        let mut lines = vec![
            format!("Build: {} on {} using {}", row.tree, row.host, row.compiler),
            format!("Revision: {}", row.revision.as_deref().unwrap_or("unknown")),
        ];
        if let Some(details) = &self.revision_details {
            if let Some(commit) = &details.commit_id {
                lines.push(format!("Commit: {commit}"));
            }
            if let Some(ts) = &details.timestamp {
                lines.push(format!("Commit time: {ts}"));
            }
        }
        lines.push(format!("Status: {}", row.status_text()));
        for stage in row.status.iter().flat_map(|s| &s.stages) {
            lines.push(format!("  {:<16} {}", stage.name, stage.result));
        }
        lines.push(format!("Error lines: {}", self.err_count));
        if let Some(uploaded) = row.upload_time {
            lines.push(format!("Uploaded: {}", uploaded.format("%Y-%m-%d %H:%M:%S")));
        }
        lines.push(format!("Log: {}", self.log_path));
        if let Some(log) = &self.log {
            lines.push(String::new());
            lines.push(log.clone());
        }
        lines.join("\n")
    }
}

fn list(builds: Vec<BuildRow>, json_mode: bool) {
    output(
        &BuildListOutput {
            builds,
            now: Utc::now(),
        },
        json_mode,
    );
}

/// One row per build; builds that cannot be read get a placeholder row.
fn rows(farm: &BuildFarm, builds: &[Build]) -> Vec<BuildRow> {
    builds
        .iter()
        .map(|build| {
            BuildRow::from_build(farm, build).unwrap_or_else(|e| {
                warn!(build = %build.key, error = %e, "Build unavailable while listing");
                BuildRow::unavailable(build, &e)
            })
        })
        .collect()
}

pub async fn execute(args: BuildsArgs, config: &Config, json_mode: bool) -> Result<()> {
    let farm = open_farm(config).await?;

    match args.command {
        BuildsCommands::Last => {
            let records = farm.get_last_builds().await.context("Failed to list builds")?;
            list(records.into_iter().map(BuildRow::from).collect(), json_mode);
        }
        BuildsCommands::Tree { tree } => {
            let records = farm.get_tree_builds(&tree).await?;
            list(records.into_iter().map(BuildRow::from).collect(), json_mode);
        }
        BuildsCommands::Host { host } => {
            let records = farm.get_host_builds(&host).await?;
            list(records.into_iter().map(BuildRow::from).collect(), json_mode);
        }
        BuildsCommands::Revision { tree, revision } => {
            let records = farm.get_revision_builds(&tree, &revision).await?;
            list(records.into_iter().map(BuildRow::from).collect(), json_mode);
        }
        BuildsCommands::History { tree, host, compiler } => {
            let builds = farm.get_old_builds(&tree, &host, &compiler).await?;
            list(rows(&farm, &builds), json_mode);
        }
        BuildsCommands::New => {
            let builds = farm.get_new_builds().await.context("Failed to read inbox")?;
            list(rows(&farm, &builds), json_mode);
        }
        BuildsCommands::Show {
            tree,
            host,
            compiler,
            revision,
            log,
        } => {
            let build = farm.get_build(&tree, &host, &compiler, revision.as_deref())?;
            let log = if log {
                Some(String::from_utf8_lossy(&build.read_log()?).into_owned())
            } else {
                None
            };
            let detail = BuildDetailOutput {
                row: BuildRow::from_build(&farm, &build)?,
                revision_details: farm.revision_details(&build).ok(),
                err_count: farm.err_count(&build)?,
                log_path: build.log_path().display().to_string(),
                log,
            };
            output(&detail, json_mode);
        }
    }

    Ok(())
}
