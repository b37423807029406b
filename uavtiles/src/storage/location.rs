use std::fmt;
use std::path::{Path, PathBuf};

const VSICURL_PREFIX: &str = "/vsicurl/";
const VSIS3_PREFIX: &str = "/vsis3/";
const S3_SCHEME: &str = "s3://";

/// Where a raster file lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceLocation {
    /// File on the local filesystem
    Local(PathBuf),
    /// Plain HTTP(S) URL, also reached through `/vsicurl/`
    Http(String),
    /// Object in an S3-compatible bucket
    S3 { bucket: String, key: String },
}

impl SourceLocation {
    /// Parse a location string.
    ///
    /// Accepts local paths, `http(s)://` URLs, `/vsicurl/<url>`,
    /// `s3://bucket/key` and `/vsis3/bucket/key`.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if let Some(url) = value.strip_prefix(VSICURL_PREFIX) {
            return SourceLocation::Http(url.to_string());
        }
        if let Some(rest) = value
            .strip_prefix(VSIS3_PREFIX)
            .or_else(|| value.strip_prefix(S3_SCHEME))
        {
            let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
            return SourceLocation::S3 {
                bucket: bucket.to_string(),
                key: key.to_string(),
            };
        }
        if is_http_url(value) {
            return SourceLocation::Http(value.to_string());
        }
        SourceLocation::Local(PathBuf::from(value))
    }

    pub fn as_local(&self) -> Option<&Path> {
        match self {
            SourceLocation::Local(path) => Some(path),
            _ => None,
        }
    }

    /// Resolve a path found inside this file relative to it.
    ///
    /// Absolute paths and remote locations are returned unchanged.
    pub fn join(&self, reference: &str) -> SourceLocation {
        let parsed = SourceLocation::parse(reference);
        if !matches!(&parsed, SourceLocation::Local(p) if p.is_relative()) {
            return parsed;
        }
        let relative = reference.trim();
        match self {
            SourceLocation::Local(path) => SourceLocation::Local(
                path.parent()
                    .map(|dir| dir.join(relative))
                    .unwrap_or_else(|| PathBuf::from(relative)),
            ),
            SourceLocation::Http(url) => {
                let base = url.rsplit_once('/').map(|(b, _)| b).unwrap_or(url);
                SourceLocation::Http(format!("{}/{}", base, relative.trim_start_matches("./")))
            }
            SourceLocation::S3 { bucket, key } => {
                let dir = key.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
                let key = if dir.is_empty() {
                    relative.trim_start_matches("./").to_string()
                } else {
                    format!("{}/{}", dir, relative.trim_start_matches("./"))
                };
                SourceLocation::S3 {
                    bucket: bucket.clone(),
                    key,
                }
            }
        }
    }

    /// Lowercase file extension, if any.
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            SourceLocation::Local(path) => path.file_name()?.to_str()?.to_string(),
            SourceLocation::Http(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                path.rsplit('/').next()?.to_string()
            }
            SourceLocation::S3 { key, .. } => key.rsplit('/').next()?.to_string(),
        };
        let (_, ext) = name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }

    /// File name without extension.
    pub fn stem(&self) -> Option<String> {
        let name = match self {
            SourceLocation::Local(path) => return Some(path.file_stem()?.to_str()?.to_string()),
            SourceLocation::Http(url) => url.split(['?', '#']).next()?.rsplit('/').next()?,
            SourceLocation::S3 { key, .. } => key.rsplit('/').next()?,
        };
        Some(name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name).to_string())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Local(path) => write!(f, "{}", path.display()),
            SourceLocation::Http(url) => write!(f, "{}", url),
            SourceLocation::S3 { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
        }
    }
}

fn is_http_url(value: &str) -> bool {
    let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
