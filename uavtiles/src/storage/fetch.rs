use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use chrono::Utc;
use tracing::debug;

use super::location::SourceLocation;
use super::sigv4::{self, Credentials, SigningRequest};
use super::StorageError;
use crate::config::StorageSettings;

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Retrieves whole remote files.
///
/// Implementations are called from blocking worker threads.
pub trait ObjectFetcher: Send + Sync {
    /// Fetch the full contents of a remote location.
    fn fetch(&self, location: &SourceLocation) -> Result<Bytes, StorageError>;
}

/// A readable, seekable view of a source file.
pub enum SourceReader {
    File(BufReader<File>),
    Memory(Cursor<Bytes>),
}

impl SourceReader {
    /// Open a location, fetching remote files into memory.
    pub fn open(
        location: &SourceLocation,
        fetcher: &dyn ObjectFetcher,
    ) -> Result<Self, StorageError> {
        match location {
            SourceLocation::Local(path) => {
                let file = File::open(path).map_err(|source| StorageError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok(SourceReader::File(BufReader::new(file)))
            }
            remote => Ok(SourceReader::Memory(Cursor::new(fetcher.fetch(remote)?))),
        }
    }

    /// Read the whole file into memory.
    pub fn into_bytes(self) -> std::io::Result<Bytes> {
        match self {
            SourceReader::File(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(Bytes::from(buf))
            }
            SourceReader::Memory(cursor) => Ok(cursor.into_inner()),
        }
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            SourceReader::File(r) => r.read(buf),
            SourceReader::Memory(r) => r.read(buf),
        }
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            SourceReader::File(r) => r.seek(pos),
            SourceReader::Memory(r) => r.seek(pos),
        }
    }
}

/// Modification time of a local file, `None` for remote locations.
pub(crate) fn modified_time(location: &SourceLocation) -> Option<SystemTime> {
    location
        .as_local()
        .and_then(|path| std::fs::metadata(path).ok())
        .and_then(|meta| meta.modified().ok())
}

/// Fetches `http(s)` and S3 objects with a blocking `reqwest` client.
pub struct HttpFetcher {
    settings: StorageSettings,
    client: OnceLock<reqwest::blocking::Client>,
}

impl HttpFetcher {
    pub fn new(settings: StorageSettings) -> Self {
        Self {
            settings,
            client: OnceLock::new(),
        }
    }

    // Built on first use so it is never created on an async worker thread.
    fn client(&self) -> Result<&reqwest::blocking::Client, StorageError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("uavtiles/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| StorageError::Http {
                url: String::new(),
                source,
            })?;
        Ok(self.client.get_or_init(|| client))
    }

    fn endpoint(&self) -> String {
        match &self.settings.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://s3.{}.amazonaws.com", self.settings.region),
        }
    }

    /// Path-style URL for an object.
    pub fn s3_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}{}",
            self.endpoint(),
            sigv4::uri_encode_path(&format!("/{}/{}", bucket, key))
        )
    }

    fn get(&self, url: &str, signed: bool) -> Result<Bytes, StorageError> {
        let client = self.client()?;
        let mut request = client.get(url);

        if signed {
            if let (Some(access_key_id), Some(secret_access_key)) = (
                self.settings.access_key_id.as_deref(),
                self.settings.secret_access_key.as_deref(),
            ) {
                let parsed = reqwest::Url::parse(url).map_err(|_| StorageError::NotFound(url.to_string()))?;
                let host = match (parsed.host_str(), parsed.port()) {
                    (Some(h), Some(p)) => format!("{}:{}", h, p),
                    (Some(h), None) => h.to_string(),
                    (None, _) => return Err(StorageError::NotFound(url.to_string())),
                };
                let credentials = Credentials {
                    access_key_id,
                    secret_access_key,
                    session_token: self.settings.session_token.as_deref(),
                };
                let signing = SigningRequest {
                    method: "GET",
                    host: &host,
                    path: parsed.path(),
                    headers: &[],
                    region: &self.settings.region,
                    service: "s3",
                };
                let headers = sigv4::sign(&signing, &credentials, Utc::now());
                request = request
                    .header("authorization", headers.authorization)
                    .header("x-amz-date", headers.amz_date)
                    .header("x-amz-content-sha256", headers.content_sha256);
                if let Some(token) = headers.security_token {
                    request = request.header("x-amz-security-token", token);
                }
            }
        }

        debug!(url = %url, signed, "Fetching remote source");
        let response = request.send().map_err(|source| StorageError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().map_err(|source| StorageError::Http {
            url: url.to_string(),
            source,
        })
    }
}

impl ObjectFetcher for HttpFetcher {
    fn fetch(&self, location: &SourceLocation) -> Result<Bytes, StorageError> {
        match location {
            SourceLocation::Http(url) => self.get(url, false),
            SourceLocation::S3 { bucket, key } => {
                let url = self.s3_url(bucket, key);
                self.get(&url, self.settings.has_credentials())
            }
            SourceLocation::Local(path) => std::fs::read(path)
                .map(Bytes::from)
                .map_err(|source| StorageError::Io {
                    path: path.clone(),
                    source,
                }),
        }
    }
}
