//! Command-line interface definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(
    name = "dbsubset",
    about = "Extract a referentially-consistent subset of PostgreSQL data, preserving FK dependencies"
)]
pub struct CommandLine {
    /// Path to the YAML config file
    #[clap(long)]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze the FK dependency graph and print its structure
    Analyze {
        /// Output format: mermaid or text
        #[clap(long, default_value = "mermaid")]
        format: String,
    },
    /// Extract a data subset starting from the configured root tables
    Extract {
        /// Output file path (overrides config; "-" means stdout)
        #[clap(long)]
        output: Option<String>,
        /// Print the generated queries without executing them
        #[clap(long)]
        dry_run: bool,
        /// Show detailed per-table progress
        #[clap(long)]
        verbose: bool,
    },
}
