//! `info`: print a dataset's metadata as JSON.

use std::path::{Path, PathBuf};

use clap::Args;
use uavtiles::service::TileService;

use crate::error::CliError;
use crate::runner::CliRunner;

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Dataset name (VRT file stem)
    pub name: String,

    /// Directory to search instead of the configured one
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Print the TileJSON document instead
    #[arg(long)]
    pub tilejson: bool,
}

pub fn run(config_path: Option<&Path>, args: InfoArgs) -> Result<(), CliError> {
    let runner = CliRunner::without_logging(config_path)?;
    let mut config = runner.config().clone();
    if let Some(dir) = args.data_dir {
        config.data.data_dir = dir;
    }
    // One-shot lookups never hit the tile cache
    config.tiles.cache_size = 0;

    let runtime = runner.runtime()?;
    let body = runtime.block_on(async {
        let service = TileService::new(config);
        if args.tilejson {
            service
                .tilejson(&args.name, "png")
                .await
                .map(|tj| serde_json::to_value(tj).unwrap_or_default())
        } else {
            service
                .dataset_info(&args.name)
                .await
                .map(|info| serde_json::to_value(info).unwrap_or_default())
        }
    })?;

    println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    Ok(())
}
