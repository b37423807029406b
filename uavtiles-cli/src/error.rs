//! CLI error handling with user-facing messages and exit codes.

use std::fmt;
use std::process;

use uavtiles::config::ConfigError;
use uavtiles::server::ServerError;
use uavtiles::service::ServiceError;

#[derive(Debug)]
pub enum CliError {
    LoggingInit(String),
    Config(String),
    ConfigFile(ConfigError),
    /// Tokio runtime or thread pool setup failed
    Runtime(String),
    Serve(ServerError),
    Service(ServiceError),
    FileWrite { path: String, error: std::io::Error },
}

impl CliError {
    /// Print the error, plus hints where they help, and exit with status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Serve(ServerError::Bind { .. }) => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. Another process is using the port: pick one with --port or PORT");
                eprintln!("  2. Ports below 1024 need elevated privileges");
            }
            CliError::ConfigFile(ConfigError::NotFound(_)) => {
                eprintln!();
                eprintln!("Create a config file with: uavtiles config init");
            }
            CliError::Service(ServiceError::DatasetNotFound(_)) => {
                eprintln!();
                eprintln!("List available datasets with: uavtiles datasets");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "Configuration error: {}", e),
            CliError::Runtime(msg) => write!(f, "Failed to start runtime: {}", msg),
            CliError::Serve(e) => write!(f, "Server error: {}", e),
            CliError::Service(e) => write!(f, "{}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Serve(e) => Some(e),
            CliError::Service(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<ServerError> for CliError {
    fn from(e: ServerError) -> Self {
        CliError::Serve(e)
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        CliError::Service(e)
    }
}
