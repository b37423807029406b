//! Server configuration.
//!
//! Values are layered: built-in defaults, then the optional INI file
//! (`~/.uavtiles/config.ini` or `UAVTILES_CONFIG`), then environment
//! variables. The CLI applies its flags last.

pub mod env;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use file::{config_directory, config_file_path, ConfigError};
pub use settings::{
    num_cpus, DataSettings, LoggingSettings, RasterSettings, ServerConfig, ServerSettings,
    StorageSettings, TileSettings, DEFAULT_CACHE_MAX, DEFAULT_DATASET_POOL_SIZE, DEFAULT_DATA_DIR,
    DEFAULT_HOST, DEFAULT_LOG_FILE, DEFAULT_PORT, DEFAULT_REGION, DEFAULT_TILE_CACHE_SIZE,
};
pub use size::{format_size, parse_cache_max, parse_size, SizeError, CACHEMAX_MB_LIMIT};
