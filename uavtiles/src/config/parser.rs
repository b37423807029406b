//! INI parsing logic for converting `Ini` → `ServerConfig`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::env::{parse_flag, parse_skip_dir_scan, parse_threads};
use super::file::ConfigError;
use super::settings::ServerConfig;
use super::size::{parse_cache_max, parse_size};

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty(v: &str) -> Option<String> {
    let v = v.trim();
    (!v.is_empty()).then(|| v.to_string())
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse an `Ini` object into a `ServerConfig`.
///
/// Starts from `ServerConfig::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();

    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = section.get("host").and_then(non_empty) {
            config.server.host = v;
        }
        if let Some(v) = section.get("port") {
            config.server.port = v
                .trim()
                .parse()
                .map_err(|_| invalid("server", "port", v, "must be a port number"))?;
        }
        if let Some(v) = section.get("public_url").and_then(non_empty) {
            config.server.public_url = Some(v.trim_end_matches('/').to_string());
        }
    }

    if let Some(section) = ini.section(Some("data")) {
        if let Some(v) = section.get("data_dir").and_then(non_empty) {
            config.data.data_dir = expand_tilde(&v);
        }
        if let Some(v) = section.get("source_dir").and_then(non_empty) {
            config.data.source_dir = Some(expand_tilde(&v));
        }
        if let Some(v) = section.get("skip_dir_scan") {
            config.data.skip_dir_scan = parse_skip_dir_scan(v)
                .ok_or_else(|| invalid("data", "skip_dir_scan", v, "expected true or false"))?;
        }
    }

    if let Some(section) = ini.section(Some("raster")) {
        if let Some(v) = section.get("cache_max") {
            config.raster.cache_max = parse_cache_max(v).map_err(|_| {
                invalid("raster", "cache_max", v, "expected format like '512MB' or '1GB'")
            })?;
        }
        if let Some(v) = section.get("pool_size") {
            config.raster.pool_size = v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("raster", "pool_size", v, "must be a positive integer"))?;
        }
        if let Some(v) = section.get("threads") {
            config.raster.threads = parse_threads(v).ok_or_else(|| {
                invalid("raster", "threads", v, "must be ALL_CPUS or a positive integer")
            })?;
        }
        if let Some(v) = section.get("file_caching") {
            config.raster.file_caching = parse_flag(v)
                .ok_or_else(|| invalid("raster", "file_caching", v, "expected true or false"))?;
        }
    }

    if let Some(section) = ini.section(Some("tiles")) {
        if let Some(v) = section.get("cache_size") {
            config.tiles.cache_size = parse_size(v).map_err(|_| {
                invalid("tiles", "cache_size", v, "expected format like '256MB' or 0")
            })?;
        }
    }

    if let Some(section) = ini.section(Some("storage")) {
        if let Some(v) = section.get("access_key_id").and_then(non_empty) {
            config.storage.access_key_id = Some(v);
        }
        if let Some(v) = section.get("secret_access_key").and_then(non_empty) {
            config.storage.secret_access_key = Some(v);
        }
        if let Some(v) = section.get("session_token").and_then(non_empty) {
            config.storage.session_token = Some(v);
        }
        if let Some(v) = section.get("region").and_then(non_empty) {
            config.storage.region = v;
        }
        if let Some(v) = section.get("endpoint").and_then(non_empty) {
            config.storage.endpoint = Some(v);
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory").and_then(non_empty) {
            config.logging.directory = Some(expand_tilde(&v));
        }
        if let Some(v) = section.get("file").and_then(non_empty) {
            config.logging.file = v;
        }
    }

    Ok(config)
}
