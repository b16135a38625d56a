//! Implementation of the `buildfarm import` command.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::open_farm;
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::models::Config;
use crate::services::{IngestReport, Ingestor, PlannedImport};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// List what would be imported without touching the inbox or archive
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct PlanOutput {
    pub builds: Vec<PlannedImport>,
}

impl CommandOutput for PlanOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["tree", "host", "compiler", "revision", "action"]);
        for planned in &self.builds {
            table.add_row(vec![
                planned.key.tree.clone(),
                planned.key.host.clone(),
                planned.key.compiler.clone(),
                planned.revision.clone().unwrap_or_else(|| "-".to_string()),
                planned.action.as_str().to_string(),
            ]);
        }
        render_list("pending upload", &table, self.builds.len())
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ImportOutput {
    #[serde(flatten)]
    pub report: IngestReport,
}

impl CommandOutput for ImportOutput {
    fn to_human(&self) -> String {
        let report = &self.report;
        let mut lines = vec![format!(
            "Promoted {}, unchanged {}, skipped {}, regressions {}",
            report.promoted.len(),
            report.unchanged.len(),
            report.skipped.len(),
            report.regressions.len()
        )];

        for skipped in &report.skipped {
            lines.push(format!("  skipped {}: {}", skipped.key, skipped.reason));
        }

        for notice in &report.regressions {
            lines.push(String::new());
            lines.push(format!("Subject: {}", notice.subject()));
            let recipients: Vec<_> = notice.recipients().into_iter().collect();
            if !recipients.is_empty() {
                lines.push(format!("To: {}", recipients.join(", ")));
            }
            lines.push(String::new());
            lines.push(notice.body());
        }

        lines.join("\n")
    }
}

pub async fn execute(args: ImportArgs, config: &Config, json_mode: bool) -> Result<()> {
    let farm = open_farm(config).await?;
    let ingestor = Ingestor::new(farm);

    if args.dry_run {
        let builds = ingestor.plan().await.context("Failed to inspect inbox")?;
        output(&PlanOutput { builds }, json_mode);
        return Ok(());
    }

    let report = ingestor.run().await.context("Import failed")?;
    output(&ImportOutput { report }, json_mode);
    Ok(())
}
