//! INI serialization for `ServerConfig`.
//!
//! Used by `uavtiles config` to show the effective configuration. Secrets
//! are never written out.

use std::path::Path;

use super::settings::ServerConfig;
use super::size::format_size;

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn redacted(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "<redacted>"
    } else {
        ""
    }
}

/// Convert a `ServerConfig` to a commented INI string.
pub(super) fn to_config_string(config: &ServerConfig) -> String {
    let public_url = config.server.public_url.as_deref().unwrap_or("");
    let source_dir = config
        .data
        .source_dir
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();
    let log_dir = config
        .logging
        .directory
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();

    format!(
        r#"[server]
host = {}
port = {}
; Absolute prefix for TileJSON tile URLs (relative when empty)
public_url = {}

[data]
; Directory scanned for *.vrt mosaics
data_dir = {}
source_dir = {}
skip_dir_scan = {}

[raster]
cache_max = {}
pool_size = {}
threads = {}
file_caching = {}

[tiles]
; Rendered tile cache, 0 disables it
cache_size = {}

[storage]
access_key_id = {}
secret_access_key = {}
session_token = {}
region = {}
endpoint = {}

[logging]
directory = {}
file = {}
"#,
        config.server.host,
        config.server.port,
        public_url,
        path_to_string(&config.data.data_dir),
        source_dir,
        config.data.skip_dir_scan,
        format_size(config.raster.cache_max),
        config.raster.pool_size,
        config.raster.threads,
        config.raster.file_caching,
        format_size(config.tiles.cache_size),
        config.storage.access_key_id.as_deref().unwrap_or(""),
        redacted(&config.storage.secret_access_key),
        redacted(&config.storage.session_token),
        config.storage.region,
        config.storage.endpoint.as_deref().unwrap_or(""),
        log_dir,
        config.logging.file,
    )
}
