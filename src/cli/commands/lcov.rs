//! Implementation of the `buildfarm lcov` command.

use anyhow::Result;
use clap::Args;

use crate::cli::open_farm;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct LcovArgs {
    /// Tree name
    pub tree: String,
}

#[derive(Debug, serde::Serialize)]
pub struct LcovOutput {
    pub tree: String,
    pub host: String,
    pub percentage: Option<String>,
}

impl CommandOutput for LcovOutput {
    fn to_human(&self) -> String {
        match &self.percentage {
            Some(pct) => format!("{}: {} line coverage (reported by {})", self.tree, pct, self.host),
            None => format!("{}: coverage report has no percentage", self.tree),
        }
    }
}

pub async fn execute(args: LcovArgs, config: &Config, json_mode: bool) -> Result<()> {
    let farm = open_farm(config).await?;
    let percentage = farm.lcov_status(&args.tree)?;

    output(
        &LcovOutput {
            tree: args.tree,
            host: config.lcov.host.clone(),
            percentage,
        },
        json_mode,
    );
    Ok(())
}
