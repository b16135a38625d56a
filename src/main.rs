//! Buildfarm CLI entry point.

use clap::Parser;

use buildfarm::cli::{handle_error, Cli, Commands};
use buildfarm::cli::commands::{builds, host, import, init, lcov};
use buildfarm::infrastructure::logging::{LogConfig, LoggerImpl};
use buildfarm::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init => init::execute(&config, cli.json).await,
        Commands::Import(args) => import::execute(args, &config, cli.json).await,
        Commands::Host(args) => host::execute(args, &config, cli.json).await,
        Commands::Builds(args) => builds::execute(args, &config, cli.json).await,
        Commands::Lcov(args) => lcov::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
