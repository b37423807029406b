//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file. Defaults
//! mirror the values the container deployment ships with.

use std::path::PathBuf;

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default bind port.
pub const DEFAULT_PORT: u16 = 8000;
/// Default directory holding VRT datasets.
pub const DEFAULT_DATA_DIR: &str = "/data";
/// Default decoded raster cache size (512MB, GDAL's container default here).
pub const DEFAULT_CACHE_MAX: usize = 512 * 1024 * 1024;
/// Default number of datasets kept open.
pub const DEFAULT_DATASET_POOL_SIZE: usize = 100;
/// Default rendered tile cache size (256MB).
pub const DEFAULT_TILE_CACHE_SIZE: usize = 256 * 1024 * 1024;
/// Default object storage region.
pub const DEFAULT_REGION: &str = "us-east-1";
/// Default log file name when a log directory is configured.
pub const DEFAULT_LOG_FILE: &str = "uavtiles.log";

/// Get the number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// HTTP listener settings
    pub server: ServerSettings,
    /// Dataset location settings
    pub data: DataSettings,
    /// Raster reading settings
    pub raster: RasterSettings,
    /// Rendered tile settings
    pub tiles: TileSettings,
    /// Object storage credentials
    pub storage: StorageSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Absolute URL prefix for TileJSON tile templates. Relative when unset.
    pub public_url: Option<String>,
}

/// Dataset location configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    /// Directory scanned for `*.vrt` datasets.
    pub data_dir: PathBuf,
    /// Directory holding source imagery referenced by the mosaics.
    pub source_dir: Option<PathBuf>,
    /// Skip recursive directory scans when resolving a dataset by name.
    pub skip_dir_scan: bool,
}

/// Raster reading configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSettings {
    /// Decoded raster cache size in bytes.
    pub cache_max: usize,
    /// Maximum number of open datasets.
    pub pool_size: usize,
    /// Concurrent raster workers.
    pub threads: usize,
    /// Keep decoded source rasters between requests.
    pub file_caching: bool,
}

/// Rendered tile configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSettings {
    /// In-memory cache for encoded tiles in bytes. Zero disables it.
    pub cache_size: usize,
}

/// Object storage configuration.
#[derive(Clone, PartialEq)]
pub struct StorageSettings {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub region: String,
    /// Custom S3-compatible endpoint, e.g. `http://minio:9000`.
    pub endpoint: Option<String>,
}

impl StorageSettings {
    /// Whether both halves of a credential pair are present.
    pub fn has_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Directory for a log file. Stdout only when unset.
    pub directory: Option<PathBuf>,
    pub file: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
                public_url: None,
            },
            data: DataSettings {
                data_dir: PathBuf::from(DEFAULT_DATA_DIR),
                source_dir: None,
                skip_dir_scan: false,
            },
            raster: RasterSettings {
                cache_max: DEFAULT_CACHE_MAX,
                pool_size: DEFAULT_DATASET_POOL_SIZE,
                threads: num_cpus(),
                file_caching: true,
            },
            tiles: TileSettings {
                cache_size: DEFAULT_TILE_CACHE_SIZE,
            },
            storage: StorageSettings {
                access_key_id: None,
                secret_access_key: None,
                session_token: None,
                region: DEFAULT_REGION.to_string(),
                endpoint: None,
            },
            logging: LoggingSettings {
                directory: None,
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}

impl ServerConfig {
    /// Socket address string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
