//! uavtiles CLI - serve VRT mosaics as map tiles.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::datasets::DatasetsArgs;
use commands::info::InfoArgs;
use commands::serve::ServeArgs;

#[derive(Parser)]
#[command(name = "uavtiles")]
#[command(version, about = "Dynamic tile server for UAV/drone VRT imagery", long_about = None)]
struct Cli {
    /// Configuration file (default: UAVTILES_CONFIG or ~/.uavtiles/config.ini)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP tile server
    Serve(ServeArgs),

    /// List datasets under the data directory
    Datasets(DatasetsArgs),

    /// Print metadata for one dataset
    Info(InfoArgs),

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Serve(args) => commands::serve::run(config, args),
        Commands::Datasets(args) => commands::datasets::run(config, args),
        Commands::Info(args) => commands::info::run(config, args),
        Commands::Config { command } => commands::config::run(config, command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
