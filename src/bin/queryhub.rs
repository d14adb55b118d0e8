//! QueryHub CLI Binary
//!
//! Command-line interface for running declarative reports.

use anyhow::Context;
use clap::Parser;
use queryhub::cli::{Cli, RunContext};
use queryhub::config::ConfigLoader;
use queryhub::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    info!("QueryHub CLI starting");
    let context = RunContext::new(cli);
    let outcome = runtime
        .block_on(context.execute(&cli.command))
        .map_err(|e| anyhow::anyhow!(queryhub::cli::map_error(&e)))?;

    if let Some(status) = &outcome.status {
        eprintln!("{}", status);
    }
    if let Some(stdout) = &outcome.stdout {
        println!("{}", stdout);
    }
    info!(exit_code = outcome.exit_code, "Command completed");
    Ok(outcome.exit_code)
}

/// Build logging configuration from CLI args and the config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(ConfigLoader::default_config_dir);
    let mut loader = ConfigLoader::new(config_dir);
    if let Some(ref file) = cli.config {
        loader = loader.with_config_file(file);
    }
    let mut config = loader.load().map(|c| c.logging).unwrap_or_default();

    if cli.quiet {
        config.enabled = false;
    }
    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    config
}
