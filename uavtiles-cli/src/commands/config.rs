//! `config`: inspect and create the configuration file.

use std::path::Path;

use clap::Subcommand;
use uavtiles::config::{config_file_path, ServerConfig};

use crate::error::CliError;
use crate::runner::CliRunner;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (file, environment, defaults)
    Show,

    /// Show the configuration file path
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(config_path: Option<&Path>, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(config_path),
        ConfigCommands::Path => run_path(config_path),
        ConfigCommands::Init { force } => run_init(config_path, force),
    }
}

fn run_show(config_path: Option<&Path>) -> Result<(), CliError> {
    let runner = CliRunner::without_logging(config_path)?;
    print!("{}", runner.config().to_ini_string());
    Ok(())
}

fn run_path(config_path: Option<&Path>) -> Result<(), CliError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);
    println!("{}", path.display());
    Ok(())
}

fn run_init(config_path: Option<&Path>, force: bool) -> Result<(), CliError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        )));
    }

    write_default_config(&path).map_err(|error| CliError::FileWrite {
        path: path.display().to_string(),
        error,
    })?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn write_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, ServerConfig::default().to_ini_string())
}
