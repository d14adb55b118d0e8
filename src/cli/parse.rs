//! CLI parse: clap types for QueryHub. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// QueryHub CLI - Declarative report execution
#[derive(Parser)]
#[command(name = "queryhub")]
#[command(about = "Run declarative reports against configured data backends")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration directory (default: ./config, else the platform config dir)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Main configuration file (overrides <config-dir>/queryhub.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Report templates directory (default: <config-dir>/templates)
    #[arg(long, global = true)]
    pub templates_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Disable logging
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a report and write its output
    Run {
        /// Report id
        report_id: String,

        /// Write output to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = RunFormat::Html)]
        format: RunFormat,

        /// Exit non-zero when any component failed
        #[arg(long)]
        fail_on_error: bool,
    },
    /// List configured reports
    List {
        #[arg(long, value_enum, default_value_t = ListFormat::Text)]
        format: ListFormat,
    },
    /// Load and validate the configuration
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunFormat {
    Html,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Text,
    Json,
}
