//! Dataset discovery under the data directory.
//!
//! Datasets are `.vrt` files anywhere below `data_dir`, addressed by file
//! stem. Tile-by-URL requests may also name any file below `data_dir` or
//! `source_dir`, or a remote location.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::DataSettings;
use crate::storage::SourceLocation;

/// A discoverable dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetEntry {
    /// File stem, used in URLs.
    pub name: String,
    /// Path relative to the data directory.
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    data_dir: PathBuf,
    source_dir: Option<PathBuf>,
    skip_dir_scan: bool,
}

impl Catalog {
    pub fn new(settings: &DataSettings) -> Self {
        Self {
            data_dir: settings.data_dir.clone(),
            source_dir: settings.source_dir.clone(),
            skip_dir_scan: settings.skip_dir_scan,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// All `.vrt` files below the data directory, sorted by name.
    pub fn list(&self) -> Vec<DatasetEntry> {
        let mut entries: Vec<DatasetEntry> = self
            .scan("*")
            .into_iter()
            .filter_map(|path| {
                let name = path.file_stem()?.to_str()?.to_string();
                let relative = path.strip_prefix(&self.data_dir).unwrap_or(&path);
                Some(DatasetEntry {
                    name,
                    path: relative.to_string_lossy().into_owned(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
        entries
    }

    /// Path of the dataset called `name`, if one exists.
    ///
    /// `<data_dir>/<name>.vrt` wins over deeper matches.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if !is_plain_name(name) {
            debug!(name, "Rejected dataset name");
            return None;
        }
        let direct = self.data_dir.join(format!("{}.vrt", name));
        if direct.is_file() {
            return Some(direct);
        }
        if self.skip_dir_scan {
            return None;
        }
        self.scan(name).into_iter().next()
    }

    /// Location for a tile-by-URL request.
    ///
    /// Remote locations pass through. Local paths must exist and lie below
    /// the data or source directory.
    pub fn resolve_url(&self, url: &str) -> Option<SourceLocation> {
        let location = SourceLocation::parse(url);
        let path = match location.as_local() {
            None => return Some(location),
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => self.data_dir.join(p),
        };
        let canonical = path.canonicalize().ok()?;
        let allowed = std::iter::once(&self.data_dir)
            .chain(self.source_dir.as_ref())
            .filter_map(|root| root.canonicalize().ok())
            .any(|root| canonical.starts_with(root));
        if !allowed || !canonical.is_file() {
            debug!(url, "Rejected local path outside served directories");
            return None;
        }
        Some(SourceLocation::Local(canonical))
    }

    /// `**/<stem>.vrt` matches in sorted path order.
    fn scan(&self, stem: &str) -> Vec<PathBuf> {
        if !self.data_dir.is_dir() {
            return Vec::new();
        }
        let pattern = format!(
            "{}/**/{}.vrt",
            glob::Pattern::escape(&self.data_dir.to_string_lossy()),
            stem
        );
        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Invalid dataset glob");
                return Vec::new();
            }
        };
        // glob yields in alphabetical order
        paths
            .filter_map(|entry| match entry {
                Ok(path) if path.is_file() => Some(path),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable path");
                    None
                }
            })
            .collect()
    }
}

/// Names used in URLs may not navigate or glob.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '*' | '?' | '[' | ']' | '{' | '}' | '\0'))
}
