//! Strada - streaming server rendering with per-route asset preloading.

use anyhow::Result;
use clap::{ColorChoice, Parser};
use strada::cli::{Cli, Commands};
use strada::config::{AppConfig, init_config};
use strada::logger;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let mut config = AppConfig::load(&cli)?;
    if let Commands::Build { build_args } = &cli.command
        && let Some(out_dir) = &build_args.out_dir
    {
        config.build.out_dir = out_dir.clone();
    }
    let config = init_config(config);

    match &cli.command {
        Commands::Routes { json } => strada::cli::routes::print_routes(&config, *json),
        Commands::Build { build_args } => strada::cli::build::build_assets(&config, build_args),
    }
}
