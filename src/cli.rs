use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shortforge")]
#[command(author, version, about = "Generate and publish vertical shorts with provider fallback")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline once and print the run report
    Run {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Keep the run workspace for inspection
        #[arg(long)]
        keep_artifacts: bool,
    },

    /// Run in the configured mode (once or on an interval)
    Start,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Display version information
    Version,
}
