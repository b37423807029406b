//! Configuration file handling for `~/.uavtiles/config.ini`.
//!
//! The file is optional. Parsing lives in [`super::parser`] and serialization
//! in [`super::writer`].

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::env::CONFIG_PATH;
use super::settings::ServerConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid value in the config file
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Invalid value in an environment variable
    #[error("Invalid environment variable: {key}='{value}' - {reason}")]
    InvalidEnv {
        key: String,
        value: String,
        reason: String,
    },

    /// Config file named explicitly but missing
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

impl ServerConfig {
    /// Load configuration from a specific INI file.
    ///
    /// A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Build the effective configuration: defaults, then the INI file, then
    /// the environment.
    ///
    /// An explicit `path` must exist. Otherwise `UAVTILES_CONFIG` is
    /// consulted, then `~/.uavtiles/config.ini` if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                Self::load_from(p)?
            }
            None => match std::env::var(CONFIG_PATH).ok().filter(|v| !v.is_empty()) {
                Some(p) => {
                    let p = PathBuf::from(p);
                    if !p.exists() {
                        return Err(ConfigError::NotFound(p));
                    }
                    Self::load_from(&p)?
                }
                None => Self::load_from(&config_file_path())?,
            },
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Render the configuration as INI text with secrets redacted.
    pub fn to_ini_string(&self) -> String {
        super::writer::to_config_string(self)
    }
}

/// Get the path to the config directory (~/.uavtiles).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".uavtiles")
}

/// Get the path to the config file (~/.uavtiles/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = ServerConfig::load_from(&temp_dir.path().join("missing.ini")).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.ini");
        let err = ServerConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(p) if p == path));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[server]\nport = 9001\n\n[data]\ndata_dir = /mnt/mosaics\n\n[tiles]\ncache_size = 64MB"
        )
        .unwrap();

        let config = ServerConfig::load_from(&path).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.data.data_dir, PathBuf::from("/mnt/mosaics"));
        assert_eq!(config.tiles.cache_size, 64 * 1024 * 1024);
        assert_eq!(config.raster, ServerConfig::default().raster);
    }

    #[test]
    fn test_environment_overrides_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(&path, "[server]\nport = 9001\nhost = 127.0.0.1\n").unwrap();

        let mut config = ServerConfig::load_from(&path).unwrap();
        config
            .apply_env_from(|key| (key == "PORT").then(|| "7000".to_string()))
            .unwrap();

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_config_file_path() {
        let path = config_file_path();
        assert!(path.ends_with(".uavtiles/config.ini"));
    }
}
