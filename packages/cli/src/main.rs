#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `venue_map` entry point.

use std::io::IsTerminal as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use venue_map_cli::config::{DEFAULT_STUDY_PATH, load_study};
use venue_map_cli::paths::StudyPaths;
use venue_map_cli::{interactive, pipeline};
use venue_map_acquisition::LogProgress;
use venue_map_cli_utils::IndicatifProgress;

#[derive(Parser)]
#[command(name = "venue_map", about = "Venue acquisition and density mapping")]
struct Cli {
    /// Study definition file
    #[arg(long, global = true, default_value = DEFAULT_STUDY_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the sampling grid and print its size and API call estimate
    Plan,
    /// Write the checkpoint for the planned grid
    Init {
        /// Overwrite a checkpoint that already has done points
        #[arg(long)]
        force: bool,
    },
    /// Fetch places for pending points, resuming from the checkpoint
    Fetch {
        /// Process at most this many points
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Show checkpoint progress, tile count, and fault count
    Status,
    /// Clean fetched places, aggregate per district, and write outputs
    Analyze,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = venue_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let study = load_study(&cli.config)?;
    let paths = StudyPaths::from_config(&study);

    let Some(command) = cli.command else {
        return interactive::run(&study, &paths, &multi).await;
    };

    match command {
        Commands::Plan => {
            let plan = pipeline::plan(&study)?;
            venue_map_cli::print_plan(&study, &plan);
        }
        Commands::Init { force } => {
            let store = pipeline::init(&study, &paths, force)?;
            log::info!("Checkpoint ready at {}", store.path().display());
        }
        Commands::Fetch { limit } => {
            let progress = if std::io::stderr().is_terminal() {
                IndicatifProgress::points_bar(&multi, "Fetching")
            } else {
                LogProgress::new("Fetching", 100)
            };
            venue_map_cli::run_fetch(&study, &paths, limit, &progress).await?;
        }
        Commands::Status => {
            venue_map_cli::print_status(pipeline::status(&paths)?.as_ref());
        }
        Commands::Analyze => venue_map_cli::run_analyze(&study, &paths)?,
    }

    Ok(())
}
