//! Rendered-tile cache client.
//!
//! Wraps a generic [`Cache`] and translates [`TileKey`]s into string keys of
//! the form `tile:{source}@{revision}:{z}:{x}:{y}:{format}[:{min},{max}]`.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{trace, warn};

use super::traits::Cache;
use crate::coord::TileCoord;
use crate::render::{Rescale, TileFormat};

/// Everything that distinguishes one rendered tile from another.
#[derive(Debug, Clone, Copy)]
pub struct TileKey<'a> {
    /// Resolved dataset location.
    pub source: &'a str,
    /// Fingerprint of the files the tile was rendered from.
    pub revision: u64,
    pub tile: TileCoord,
    pub format: TileFormat,
    pub rescale: Option<Rescale>,
}

impl fmt::Display for TileKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tile:{}@{:016x}:{}:{}:{}:{}",
            self.source,
            self.revision,
            self.tile.z,
            self.tile.x,
            self.tile.y,
            self.format.extension()
        )?;
        if let Some(r) = self.rescale {
            write!(f, ":{},{}", r.min, r.max)?;
        }
        Ok(())
    }
}

/// Cache client for encoded tiles.
///
/// Cache failures are logged and treated as misses.
#[derive(Clone)]
pub struct TileCacheClient {
    cache: Arc<dyn Cache>,
}

impl TileCacheClient {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    pub async fn get(&self, key: &TileKey<'_>) -> Option<Bytes> {
        let key = key.to_string();
        match self.cache.get(&key).await {
            Ok(Some(data)) => {
                trace!(key = %key, "Tile cache hit");
                Some(data)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, key = %key, "Tile cache get failed");
                None
            }
        }
    }

    pub async fn set(&self, key: &TileKey<'_>, data: Bytes) {
        let key = key.to_string();
        if let Err(e) = self.cache.set(&key, data).await {
            warn!(error = %e, key = %key, "Tile cache set failed");
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.cache.size_bytes()
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.cache.max_size_bytes()
    }
}
