//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod cases;
mod import;
mod init;
mod run_cmd;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "courtfile")]
#[command(about = "Resumable batch filing of claims through the court e-filing portal")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, short = 'd', global = true, env = "COURTFILE_DATA_DIR")]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Import cases from a JSON or YAML file as a new batch
    Import {
        /// File holding an array of case records keyed by sheet column names
        file: PathBuf,
    },

    /// File the pending cases of one or more batches
    Run {
        /// Batch IDs to process
        #[arg(required = true)]
        batch_ids: Vec<String>,
        /// Walk the wizard against an in-memory portal; nothing is recorded
        #[arg(long)]
        dry_run: bool,
        /// Maximum number of batches filed at the same time
        #[arg(short = 'j', long, default_value = "3")]
        max_parallel: usize,
    },

    /// Show batch progress
    Status {
        /// Batch ID
        batch_id: String,
        /// Continuously refresh until the batch completes
        #[arg(long)]
        watch: bool,
        /// Refresh interval in seconds
        #[arg(long, default_value = "5")]
        interval: u64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List a batch's cases and their confirmation tokens
    Cases {
        /// Batch ID
        batch_id: String,
        /// Only show cases still waiting for a token
        #[arg(long)]
        pending: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data: cli.data,
    };
    let (settings, config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Import { file } => import::cmd_import(&settings, &file).await,
        Commands::Run {
            batch_ids,
            dry_run,
            max_parallel,
        } => run_cmd::cmd_run(&settings, &config, &batch_ids, dry_run, max_parallel).await,
        Commands::Status {
            batch_id,
            watch,
            interval,
            json,
        } => status::cmd_status(&settings, &batch_id, watch, interval, json).await,
        Commands::Cases {
            batch_id,
            pending,
            json,
        } => cases::cmd_cases(&settings, &batch_id, pending, json).await,
    }
}
