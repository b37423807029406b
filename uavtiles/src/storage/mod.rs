//! Source file access.
//!
//! Mosaics reference their imagery by local path, plain HTTP(S) URL, or
//! object-storage key. [`SourceLocation`] names a file in any of these forms
//! and [`ObjectFetcher`] retrieves remote bytes, signing S3 requests when
//! credentials are configured.

mod fetch;
mod location;
pub mod sigv4;

pub(crate) use fetch::modified_time;
pub use fetch::{HttpFetcher, ObjectFetcher, SourceReader};
pub use location::SourceLocation;

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading source files.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Local file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transport-level failure
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Remote answered with a non-success status
    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The file does not exist
    #[error("File not found: {0}")]
    NotFound(String),
}

impl StorageError {
    /// Whether the error means the file is missing rather than unreadable.
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound(_) => true,
            StorageError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
