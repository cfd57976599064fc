pub mod cli;
pub mod scoring;

#[cfg(feature = "cli")]
use crate::core::report::OutputFormat;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "cycling-portal")]
#[command(about = "Stage results, rankings and points for cycling races")]
pub struct CliConfig {
    /// Portal snapshot file (JSON)
    #[arg(long, default_value = "portal.json")]
    pub portal: String,

    /// Scoring tables (TOML); built-in defaults when omitted
    #[arg(long)]
    pub scoring: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List races and stages with their state and result counts
    Summary,

    /// Print the classification of a stage
    Classify {
        #[arg(long)]
        stage: u32,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Register a rider's times for a stage and save the snapshot
    Register {
        #[arg(long)]
        stage: u32,

        #[arg(long)]
        rider: u32,

        /// Start, checkpoint and finish times as hh:mm:ss[.fff]
        #[arg(long, value_delimiter = ',', required = true)]
        times: Vec<String>,
    },

    /// Delete a rider's result for a stage and save the snapshot
    DeleteResult {
        #[arg(long)]
        stage: u32,

        #[arg(long)]
        rider: u32,
    },
}
