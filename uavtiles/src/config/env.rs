//! Environment variable overlay.
//!
//! The variable names match the ones the container deployment has always
//! used, including the GDAL-style tuning knobs, so existing compose files keep
//! working.

use std::path::PathBuf;

use super::file::ConfigError;
use super::settings::{num_cpus, ServerConfig};
use super::size::{parse_cache_max, parse_size};

pub const DATA_DIR: &str = "DATA_DIR";
pub const SOURCE_DIR: &str = "SOURCE_DIR";
pub const GDAL_CACHEMAX: &str = "GDAL_CACHEMAX";
pub const GDAL_MAX_DATASET_POOL_SIZE: &str = "GDAL_MAX_DATASET_POOL_SIZE";
pub const GDAL_NUM_THREADS: &str = "GDAL_NUM_THREADS";
pub const VSI_CACHE: &str = "VSI_CACHE";
pub const GDAL_DISABLE_READDIR_ON_OPEN: &str = "GDAL_DISABLE_READDIR_ON_OPEN";
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const AWS_REGION: &str = "AWS_REGION";
pub const AWS_S3_ENDPOINT: &str = "AWS_S3_ENDPOINT";
pub const HOST: &str = "HOST";
pub const PORT: &str = "PORT";
pub const TILE_CACHE_SIZE: &str = "TILE_CACHE_SIZE";
pub const PUBLIC_URL: &str = "PUBLIC_URL";
pub const LOG_DIR: &str = "LOG_DIR";
pub const CONFIG_PATH: &str = "UAVTILES_CONFIG";

/// Parse a GDAL-style boolean (`TRUE`/`YES`/`ON`/`1` and their negations).
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_uppercase().as_str() {
        "TRUE" | "YES" | "ON" | "1" => Some(true),
        "FALSE" | "NO" | "OFF" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a thread count: a positive integer or `ALL_CPUS`.
pub fn parse_threads(value: &str) -> Option<usize> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("ALL_CPUS") {
        return Some(num_cpus());
    }
    value.parse::<usize>().ok().filter(|n| *n > 0)
}

/// Parse the directory-scan flag, which also accepts GDAL's `EMPTY_DIR`.
pub fn parse_skip_dir_scan(value: &str) -> Option<bool> {
    if value.trim().eq_ignore_ascii_case("EMPTY_DIR") {
        return Some(true);
    }
    parse_flag(value)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl ServerConfig {
    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup.
    ///
    /// Unset and empty variables leave the current value untouched.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(non_empty);

        if let Some(v) = get(DATA_DIR) {
            self.data.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get(SOURCE_DIR) {
            self.data.source_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get(GDAL_DISABLE_READDIR_ON_OPEN) {
            self.data.skip_dir_scan = parse_skip_dir_scan(&v)
                .ok_or_else(|| invalid(GDAL_DISABLE_READDIR_ON_OPEN, &v, "expected EMPTY_DIR, TRUE or FALSE"))?;
        }

        if let Some(v) = get(GDAL_CACHEMAX) {
            self.raster.cache_max = parse_cache_max(&v)
                .map_err(|_| invalid(GDAL_CACHEMAX, &v, "expected megabytes or a size like '512MB'"))?;
        }
        if let Some(v) = get(GDAL_MAX_DATASET_POOL_SIZE) {
            self.raster.pool_size = v
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid(GDAL_MAX_DATASET_POOL_SIZE, &v, "must be a positive integer"))?;
        }
        if let Some(v) = get(GDAL_NUM_THREADS) {
            self.raster.threads = parse_threads(&v)
                .ok_or_else(|| invalid(GDAL_NUM_THREADS, &v, "must be ALL_CPUS or a positive integer"))?;
        }
        if let Some(v) = get(VSI_CACHE) {
            self.raster.file_caching =
                parse_flag(&v).ok_or_else(|| invalid(VSI_CACHE, &v, "expected TRUE or FALSE"))?;
        }

        if let Some(v) = get(AWS_ACCESS_KEY_ID) {
            self.storage.access_key_id = Some(v);
        }
        if let Some(v) = get(AWS_SECRET_ACCESS_KEY) {
            self.storage.secret_access_key = Some(v);
        }
        if let Some(v) = get(AWS_SESSION_TOKEN) {
            self.storage.session_token = Some(v);
        }
        if let Some(v) = get(AWS_REGION) {
            self.storage.region = v;
        }
        if let Some(v) = get(AWS_S3_ENDPOINT) {
            self.storage.endpoint = Some(v);
        }

        if let Some(v) = get(HOST) {
            self.server.host = v;
        }
        if let Some(v) = get(PORT) {
            self.server.port = v
                .parse()
                .map_err(|_| invalid(PORT, &v, "must be a port number"))?;
        }
        if let Some(v) = get(PUBLIC_URL) {
            self.server.public_url = Some(v.trim_end_matches('/').to_string());
        }
        if let Some(v) = get(TILE_CACHE_SIZE) {
            self.tiles.cache_size = parse_size(&v)
                .map_err(|_| invalid(TILE_CACHE_SIZE, &v, "expected a size like '256MB' or 0"))?;
        }
        if let Some(v) = get(LOG_DIR) {
            self.logging.directory = Some(PathBuf::from(v));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("yes"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("Off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_parse_threads() {
        assert_eq!(parse_threads("4"), Some(4));
        assert_eq!(parse_threads("ALL_CPUS"), Some(num_cpus()));
        assert_eq!(parse_threads("0"), None);
        assert_eq!(parse_threads("many"), None);
    }

    #[test]
    fn test_deployment_environment() {
        let mut config = ServerConfig::default();
        config
            .apply_env_from(lookup(&[
                ("DATA_DIR", "/srv/vrt"),
                ("SOURCE_DIR", "/srv/source"),
                ("GDAL_CACHEMAX", "1024"),
                ("GDAL_MAX_DATASET_POOL_SIZE", "64"),
                ("GDAL_NUM_THREADS", "6"),
                ("VSI_CACHE", "FALSE"),
                ("GDAL_DISABLE_READDIR_ON_OPEN", "EMPTY_DIR"),
                ("AWS_ACCESS_KEY_ID", "AKID"),
                ("AWS_SECRET_ACCESS_KEY", "secret"),
                ("AWS_S3_ENDPOINT", "http://minio:9000"),
                ("PORT", "9090"),
                ("PUBLIC_URL", "https://tiles.example.com/"),
                ("TILE_CACHE_SIZE", "0"),
            ]))
            .unwrap();

        assert_eq!(config.data.data_dir, PathBuf::from("/srv/vrt"));
        assert_eq!(config.data.source_dir, Some(PathBuf::from("/srv/source")));
        assert!(config.data.skip_dir_scan);
        assert_eq!(config.raster.cache_max, 1024 * 1024 * 1024);
        assert_eq!(config.raster.pool_size, 64);
        assert_eq!(config.raster.threads, 6);
        assert!(!config.raster.file_caching);
        assert!(config.storage.has_credentials());
        assert_eq!(config.storage.endpoint.as_deref(), Some("http://minio:9000"));
        assert_eq!(config.server.port, 9090);
        assert_eq!(
            config.server.public_url.as_deref(),
            Some("https://tiles.example.com")
        );
        assert_eq!(config.tiles.cache_size, 0);
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let mut config = ServerConfig::default();
        config
            .apply_env_from(lookup(&[("DATA_DIR", "  "), ("AWS_ACCESS_KEY_ID", "")]))
            .unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_invalid_value_names_the_variable() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_env_from(lookup(&[("GDAL_NUM_THREADS", "lots")]))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("GDAL_NUM_THREADS"));
        assert!(msg.contains("lots"));
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let mut config = ServerConfig::default();
        config
            .apply_env_from(lookup(&[
                ("AWS_ACCESS_KEY_ID", "AKID"),
                ("AWS_SECRET_ACCESS_KEY", "hunter2"),
            ]))
            .unwrap();
        let debug = format!("{:?}", config.storage);
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("hunter2"));
    }
}
