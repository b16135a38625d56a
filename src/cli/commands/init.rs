//! Implementation of the `buildfarm init` command.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::cli::open_farm;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub directories: Vec<PathBuf>,
    pub database: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone(), "\nDirectories:".to_string()];
        for dir in &self.directories {
            lines.push(format!("  - {}", dir.display()));
        }
        lines.push(format!("\nDatabase initialized at {}", self.database.display()));
        lines.join("\n")
    }
}

pub async fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let farm = open_farm(config).await?;
    let directories = farm
        .create_layout()
        .context("Failed to create build farm directories")?;

    let output_data = InitOutput {
        success: true,
        message: format!("Build farm initialized under {}", config.base_dir.display()),
        directories,
        database: config.database_path(),
    };

    output(&output_data, json_mode);
    Ok(())
}
