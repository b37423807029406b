//! Logging setup.
//!
//! Logs go to stdout and, when a log directory is configured, to a log file
//! that is truncated at startup. The filter comes from `RUST_LOG` and
//! defaults to `info`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Keeps the file writer alive. Dropping it flushes and closes the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
    log_path: Option<PathBuf>,
}

impl LoggingGuard {
    /// Path of the log file, when file logging is on.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }
}

/// Install the global subscriber.
///
/// Fails if the log file cannot be prepared or a subscriber is already set.
pub fn init_logging(settings: &LoggingSettings) -> Result<LoggingGuard, io::Error> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(false);

    let (file_layer, file_guard, log_path) = match &settings.directory {
        Some(dir) => {
            let path = prepare_log_file(dir, &settings.file)?;
            let appender = tracing_appender::rolling::never(dir, &settings.file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard), Some(path))
        }
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        log_path,
    })
}

/// Create `dir` and truncate `dir/file`.
fn prepare_log_file(dir: &Path, file: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file);
    fs::write(&path, "")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/logs");

        let path = prepare_log_file(&nested, "uavtiles.log").unwrap();
        assert_eq!(path, nested.join("uavtiles.log"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_prepare_truncates_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("uavtiles.log");
        fs::write(&path, "old session").unwrap();

        prepare_log_file(dir.path(), "uavtiles.log").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_prepare_fails_when_directory_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("logs");
        fs::write(&blocker, "").unwrap();

        assert!(prepare_log_file(&blocker, "uavtiles.log").is_err());
    }

    // The global subscriber can only be installed once per process, so
    // init_logging itself is exercised by the CLI rather than here.
}
