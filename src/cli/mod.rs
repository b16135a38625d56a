//! Command-line front end for the build farm.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::domain::models::Config;
use crate::services::BuildFarm;

/// Open the build farm described by the loaded configuration.
pub async fn open_farm(config: &Config) -> Result<Arc<BuildFarm>> {
    let farm = BuildFarm::open(config.clone())
        .await
        .context("Failed to open build farm. Run 'buildfarm init' first.")?;
    Ok(Arc::new(farm))
}

/// Report a failed command and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().map(ToString::to_string).collect();
        let value = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": chain.get(1..).unwrap_or_default(),
        });
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
    } else {
        eprintln!("Error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
    std::process::exit(1);
}
