//! `serve`: run the HTTP tile server until Ctrl+C.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uavtiles::config::{format_size, parse_cache_max, parse_size, ServerConfig};
use uavtiles::server;
use uavtiles::service::TileService;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Overrides applied on top of the file and environment configuration.
#[derive(Debug, Default, Args)]
pub struct ServeArgs {
    /// Address to bind (HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (PORT)
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Directory holding VRT datasets (DATA_DIR)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding source imagery (SOURCE_DIR)
    #[arg(long)]
    pub source_dir: Option<PathBuf>,

    /// Render threads (GDAL_NUM_THREADS)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Decoded raster cache, e.g. 512 (MB) or 2GB (GDAL_CACHEMAX)
    #[arg(long)]
    pub cache_max: Option<String>,

    /// Rendered tile cache, e.g. 256MB; 0 disables (TILE_CACHE_SIZE)
    #[arg(long)]
    pub tile_cache_size: Option<String>,

    /// Absolute URL prefix for TileJSON tile URLs (PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Also write logs to this directory (LOG_DIR)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl ServeArgs {
    pub fn apply(&self, config: &mut ServerConfig) -> Result<(), CliError> {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.data_dir {
            config.data.data_dir = dir.clone();
        }
        if let Some(dir) = &self.source_dir {
            config.data.source_dir = Some(dir.clone());
        }
        if let Some(threads) = self.threads {
            if threads == 0 {
                return Err(CliError::Config("--threads must be at least 1".to_string()));
            }
            config.raster.threads = threads;
        }
        if let Some(value) = &self.cache_max {
            config.raster.cache_max = parse_cache_max(value)
                .map_err(|e| CliError::Config(format!("--cache-max: {}", e)))?;
        }
        if let Some(value) = &self.tile_cache_size {
            config.tiles.cache_size = parse_size(value)
                .map_err(|e| CliError::Config(format!("--tile-cache-size: {}", e)))?;
        }
        if let Some(url) = &self.public_url {
            let url = url.trim_end_matches('/');
            config.server.public_url = (!url.is_empty()).then(|| url.to_string());
        }
        if let Some(dir) = &self.log_dir {
            config.logging.directory = Some(dir.clone());
        }
        Ok(())
    }
}

pub fn run(config_path: Option<&Path>, args: ServeArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path, |config| args.apply(config))?;
    runner.log_startup("serve");
    runner.init_thread_pool()?;
    let config = runner.config().clone();

    println!("uavtiles v{}", uavtiles::VERSION);
    println!("=============");
    println!();
    println!("Data dir:   {}", config.data.data_dir.display());
    if let Some(dir) = &config.data.source_dir {
        println!("Source dir: {}", dir.display());
    }
    println!("Threads:    {}", config.raster.threads);
    println!(
        "Caches:     {} rasters, {} tiles",
        format_size(config.raster.cache_max),
        format_size(config.tiles.cache_size)
    );
    println!("Listening:  http://{}", config.bind_address());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        signal.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let runtime = runner.runtime()?;
    runtime.block_on(async {
        let address = config.bind_address();
        let service = Arc::new(TileService::new(config));
        server::serve(service, &address, shutdown).await
    })?;

    println!("Server stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win() {
        let mut config = ServerConfig::default();
        config.server.port = 9000;
        let args = ServeArgs {
            port: Some(8080),
            data_dir: Some(PathBuf::from("/srv/mosaics")),
            cache_max: Some("1024".to_string()),
            tile_cache_size: Some("0".to_string()),
            public_url: Some("https://tiles.example.com/".to_string()),
            ..Default::default()
        };
        args.apply(&mut config).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.data.data_dir, PathBuf::from("/srv/mosaics"));
        assert_eq!(config.raster.cache_max, 1024 * 1024 * 1024);
        assert_eq!(config.tiles.cache_size, 0);
        assert_eq!(
            config.server.public_url.as_deref(),
            Some("https://tiles.example.com")
        );
    }

    #[test]
    fn test_absent_overrides_keep_config() {
        let mut config = ServerConfig::default();
        config.server.host = "127.0.0.1".to_string();
        ServeArgs::default().apply(&mut config).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_invalid_overrides() {
        let mut config = ServerConfig::default();
        let zero_threads = ServeArgs {
            threads: Some(0),
            ..Default::default()
        };
        assert!(zero_threads.apply(&mut config).is_err());

        let bad_size = ServeArgs {
            tile_cache_size: Some("lots".to_string()),
            ..Default::default()
        };
        assert!(bad_size.apply(&mut config).is_err());
    }
}
