//! `datasets`: list the VRT datasets under the data directory.

use std::path::{Path, PathBuf};

use clap::Args;
use uavtiles::catalog::Catalog;

use crate::error::CliError;
use crate::runner::CliRunner;

#[derive(Debug, Args)]
pub struct DatasetsArgs {
    /// Directory to scan instead of the configured one
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Print the listing as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(config_path: Option<&Path>, args: DatasetsArgs) -> Result<(), CliError> {
    let runner = CliRunner::without_logging(config_path)?;
    let mut data = runner.config().data.clone();
    if let Some(dir) = args.data_dir {
        data.data_dir = dir;
    }

    let entries = Catalog::new(&data).list();

    if args.json {
        let body = serde_json::json!({ "datasets": entries });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
        return Ok(());
    }

    if entries.is_empty() {
        println!("No datasets found in {}", data.data_dir.display());
        return Ok(());
    }

    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
    for entry in &entries {
        println!("{:<width$}  {}", entry.name, entry.path, width = width);
    }
    println!();
    println!("{} dataset(s) in {}", entries.len(), data.data_dir.display());
    Ok(())
}
