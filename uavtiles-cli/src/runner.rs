//! Shared command setup: configuration, logging, and the async runtime.

use std::path::Path;

use tracing::info;
use uavtiles::config::ServerConfig;
use uavtiles::logging::{init_logging, LoggingGuard};

use crate::error::CliError;

pub struct CliRunner {
    #[allow(dead_code)]
    logging_guard: Option<LoggingGuard>,
    config: ServerConfig,
}

impl CliRunner {
    /// Load configuration, let `customize` apply command-line overrides, then
    /// start logging with the final settings.
    pub fn new<F>(config_path: Option<&Path>, customize: F) -> Result<Self, CliError>
    where
        F: FnOnce(&mut ServerConfig) -> Result<(), CliError>,
    {
        let mut config = ServerConfig::load(config_path)?;
        customize(&mut config)?;

        let logging_guard = init_logging(&config.logging)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;
        if let Some(path) = logging_guard.log_path() {
            info!(path = %path.display(), "Logging to file");
        }

        Ok(Self {
            logging_guard: Some(logging_guard),
            config,
        })
    }

    /// Load configuration only. For one-shot commands whose stdout is data.
    pub fn without_logging(config_path: Option<&Path>) -> Result<Self, CliError> {
        Ok(Self {
            logging_guard: None,
            config: ServerConfig::load(config_path)?,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!("uavtiles v{}", uavtiles::VERSION);
        info!("uavtiles CLI: {} command", command);
    }

    /// Size the global rayon pool used for row-parallel rendering.
    pub fn init_thread_pool(&self) -> Result<(), CliError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.raster.threads)
            .thread_name(|i| format!("uavtiles-render-{}", i))
            .build_global()
            .map_err(|e| CliError::Runtime(e.to_string()))
    }

    /// Multi-threaded tokio runtime for commands that touch the service.
    pub fn runtime(&self) -> Result<tokio::runtime::Runtime, CliError> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("uavtiles-http")
            .build()
            .map_err(|e| CliError::Runtime(e.to_string()))
    }
}
