//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::builds::BuildsArgs;
use crate::cli::commands::host::HostArgs;
use crate::cli::commands::import::ImportArgs;
use crate::cli::commands::lcov::LcovArgs;

#[derive(Parser, Debug)]
#[command(name = "buildfarm")]
#[command(about = "Build farm result store and status engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./buildfarm.yaml)
    #[arg(short, long, global = true, env = "BUILDFARM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directories and metadata database
    Init,

    /// Promote new uploads into the archive and report regressions
    Import(ImportArgs),

    /// Host registry commands
    Host(HostArgs),

    /// Build queries
    Builds(BuildsArgs),

    /// Coverage percentage of a tree
    Lcov(LcovArgs),
}
