//! Endpoint operations, independent of HTTP.
//!
//! [`TileService`] resolves dataset names through the [`Catalog`], opens them
//! through the shared [`RasterPool`], and renders tiles on blocking threads
//! behind the [`RenderLimiter`]. Encoded tiles are kept in an optional
//! in-memory [`TileCacheClient`].

mod error;
mod responses;

#[cfg(test)]
mod tests;

pub use error::ServiceError;
pub use responses::{BoundsResponse, DatasetInfo, DatasetList, HealthResponse, TileJson};

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::cache::{MemoryCacheProvider, TileCacheClient, TileKey};
use crate::catalog::Catalog;
use crate::config::{format_size, ServerConfig};
use crate::coord::{Bounds, TileCoord};
use crate::raster::{Dataset, RasterInfo, RasterPool};
use crate::render::{encoder_for, render_tile, RenderError, RenderLimiter, Rescale, TileFormat};
use crate::storage::sigv4::uri_encode;
use crate::storage::{HttpFetcher, ObjectFetcher, SourceLocation};

/// TileJSON format version emitted by [`TileService::tilejson`].
pub const TILEJSON_VERSION: &str = "3.0.0";

/// Preferred zoom for the TileJSON `center`, clamped to the dataset range.
pub const CENTER_ZOOM: u8 = 15;

/// An encoded tile ready to send.
#[derive(Debug, Clone)]
pub struct RenderedTile {
    pub data: Bytes,
    pub format: TileFormat,
}

pub struct TileService {
    config: ServerConfig,
    catalog: Catalog,
    pool: Arc<RasterPool>,
    tile_cache: Option<TileCacheClient>,
    limiter: RenderLimiter,
}

impl TileService {
    /// Build a service that fetches remote sources over HTTP.
    pub fn new(config: ServerConfig) -> Self {
        let fetcher = Arc::new(HttpFetcher::new(config.storage.clone()));
        Self::with_fetcher(config, fetcher)
    }

    pub fn with_fetcher(config: ServerConfig, fetcher: Arc<dyn ObjectFetcher>) -> Self {
        let catalog = Catalog::new(&config.data);
        let pool = Arc::new(RasterPool::new(
            &config.raster,
            config.data.source_dir.clone(),
            fetcher,
        ));
        let tile_cache = (config.tiles.cache_size > 0).then(|| {
            TileCacheClient::new(Arc::new(MemoryCacheProvider::new(
                config.tiles.cache_size as u64,
            )))
        });
        let limiter = RenderLimiter::new(config.raster.threads, "render");

        info!(
            data_dir = %config.data.data_dir.display(),
            threads = limiter.max_permits(),
            pool_size = config.raster.pool_size,
            cache_max = %format_size(config.raster.cache_max),
            tile_cache = %format_size(config.tiles.cache_size),
            "Tile service ready"
        );

        Self {
            config,
            catalog,
            pool,
            tile_cache,
            limiter,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn tile_cache(&self) -> Option<&TileCacheClient> {
        self.tile_cache.as_ref()
    }

    /// Reject new render work. Renders already running finish.
    pub fn shutdown(&self) {
        self.limiter.close();
        let (tile_entries, tile_bytes, tile_capacity) = self
            .tile_cache
            .as_ref()
            .map(|c| (c.entry_count(), c.size_bytes(), c.max_size_bytes()))
            .unwrap_or_default();
        info!(
            renders_in_flight = self.limiter.in_flight(),
            datasets = self.pool.dataset_count(),
            decoded = %format_size(self.pool.cached_source_bytes() as usize),
            tiles = tile_entries,
            tile_cache = %format!(
                "{} of {}",
                format_size(tile_bytes as usize),
                format_size(tile_capacity as usize)
            ),
            "Tile service stopping"
        );
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse { status: "ok" }
    }

    pub async fn list_datasets(&self) -> Result<DatasetList, ServiceError> {
        let catalog = self.catalog.clone();
        let datasets = tokio::task::spawn_blocking(move || catalog.list())
            .await
            .map_err(|e| ServiceError::TaskFailed(e.to_string()))?;
        Ok(DatasetList { datasets })
    }

    pub async fn dataset_info(&self, name: &str) -> Result<DatasetInfo, ServiceError> {
        let dataset = self.open_dataset(name).await?;
        Ok(describe(name, dataset.info()))
    }

    /// Geographic bounds and centre for fitting a map view.
    pub async fn dataset_bounds(&self, name: &str) -> Result<BoundsResponse, ServiceError> {
        let dataset = self.open_dataset(name).await?;
        let info = dataset.info();
        let bounds = geographic_bounds(info)?;
        let (lon, lat) = bounds.center();
        let (minzoom, maxzoom) = info.zoom_range();
        Ok(BoundsResponse {
            bounds: bounds.to_array(),
            center: [lon, lat],
            minzoom,
            maxzoom,
        })
    }

    /// TileJSON for a dataset. Unknown `tile_format` values fall back to PNG.
    pub async fn tilejson(&self, name: &str, tile_format: &str) -> Result<TileJson, ServiceError> {
        let dataset = self.open_dataset(name).await?;
        let info = dataset.info();
        let bounds = geographic_bounds(info)?;
        let (lon, lat) = bounds.center();
        let (minzoom, maxzoom) = info.zoom_range();

        let extension = match TileFormat::from_extension(tile_format) {
            Some(_) => tile_format.trim().to_ascii_lowercase(),
            None => TileFormat::Png.extension().to_string(),
        };
        let path = format!(
            "/datasets/{}/tiles/{{z}}/{{x}}/{{y}}.{}",
            uri_encode(name, false),
            extension
        );
        let url = match &self.config.server.public_url {
            Some(prefix) => format!("{}{}", prefix, path),
            None => path,
        };

        Ok(TileJson {
            tilejson: TILEJSON_VERSION,
            name: name.to_string(),
            tiles: vec![url],
            bounds: bounds.to_array(),
            center: [lon, lat, CENTER_ZOOM.clamp(minzoom, maxzoom) as f64],
            minzoom,
            maxzoom,
        })
    }

    /// Render a tile of a named dataset.
    pub async fn tile(
        &self,
        name: &str,
        z: u32,
        x: u32,
        y: u32,
        format: TileFormat,
        rescale: Option<&str>,
    ) -> Result<RenderedTile, ServiceError> {
        let tile = tile_coord(z, x, y)?;
        let rescale = parse_rescale(rescale)?;
        let path = self
            .resolve_dataset(name)
            .await?
            .ok_or_else(|| ServiceError::DatasetNotFound(name.to_string()))?;

        self.render(SourceLocation::Local(path), tile, format, rescale)
            .await
            .map_err(|e| not_found_as(e, || ServiceError::DatasetNotFound(name.to_string())))
    }

    /// Render a tile of any readable file, local or remote.
    pub async fn tile_by_url(
        &self,
        url: Option<&str>,
        z: u32,
        x: u32,
        y: u32,
        format: TileFormat,
        rescale: Option<&str>,
    ) -> Result<RenderedTile, ServiceError> {
        let url = url
            .filter(|u| !u.trim().is_empty())
            .ok_or(ServiceError::MissingUrl)?;
        let tile = tile_coord(z, x, y)?;
        let rescale = parse_rescale(rescale)?;

        let catalog = self.catalog.clone();
        let owned = url.to_string();
        let location = tokio::task::spawn_blocking(move || catalog.resolve_url(&owned))
            .await
            .map_err(|e| ServiceError::TaskFailed(e.to_string()))?
            .ok_or_else(|| ServiceError::FileNotFound(url.to_string()))?;

        self.render(location, tile, format, rescale)
            .await
            .map_err(|e| not_found_as(e, || ServiceError::FileNotFound(url.to_string())))
    }

    async fn resolve_dataset(&self, name: &str) -> Result<Option<PathBuf>, ServiceError> {
        let catalog = self.catalog.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || catalog.resolve(&name))
            .await
            .map_err(|e| ServiceError::TaskFailed(e.to_string()))
    }

    async fn open_dataset(&self, name: &str) -> Result<Arc<Dataset>, ServiceError> {
        let path = self
            .resolve_dataset(name)
            .await?
            .ok_or_else(|| ServiceError::DatasetNotFound(name.to_string()))?;
        let pool = Arc::clone(&self.pool);
        self.blocking(move || Ok(pool.open(&SourceLocation::Local(path))?))
            .await
            .map_err(|e| not_found_as(e, || ServiceError::DatasetNotFound(name.to_string())))
    }

    async fn render(
        &self,
        location: SourceLocation,
        tile: TileCoord,
        format: TileFormat,
        rescale: Option<Rescale>,
    ) -> Result<RenderedTile, ServiceError> {
        let source = location.to_string();
        let pool = Arc::clone(&self.pool);
        let (dataset, revision) = tokio::task::spawn_blocking(move || {
            pool.open(&location).map(|dataset| {
                let revision = dataset.revision();
                (dataset, revision)
            })
        })
        .await
        .map_err(|e| ServiceError::TaskFailed(e.to_string()))??;

        let key = TileKey {
            source: &source,
            revision,
            tile,
            format,
            rescale,
        };
        if let Some(cache) = &self.tile_cache {
            if let Some(data) = cache.get(&key).await {
                return Ok(RenderedTile { data, format });
            }
        }

        let pool = Arc::clone(&self.pool);
        let data = self
            .blocking(move || {
                let image = render_tile(&dataset, pool.as_ref(), tile, rescale)?;
                let encoded = encoder_for(format).encode(&image)?;
                Ok(Bytes::from(encoded))
            })
            .await?;
        debug!(source = %source, tile = %tile, format = %format, bytes = data.len(), "Rendered tile");

        if let Some(cache) = &self.tile_cache {
            cache.set(&key, data.clone()).await;
        }
        Ok(RenderedTile { data, format })
    }

    /// Run raster work on a blocking thread once a render permit is free.
    async fn blocking<T, F>(&self, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .limiter
            .acquire()
            .await
            .ok_or(ServiceError::ShuttingDown)?;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work()
        })
        .await
        .map_err(|e| ServiceError::TaskFailed(e.to_string()))?
    }
}

fn not_found_as(err: ServiceError, replacement: impl FnOnce() -> ServiceError) -> ServiceError {
    if err.is_not_found() {
        replacement()
    } else {
        err
    }
}

fn tile_coord(z: u32, x: u32, y: u32) -> Result<TileCoord, ServiceError> {
    let z = u8::try_from(z)
        .map_err(|_| ServiceError::InvalidParameter(format!("zoom level {}", z)))?;
    Ok(TileCoord::new(z, x, y)?)
}

fn parse_rescale(value: Option<&str>) -> Result<Option<Rescale>, ServiceError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => Ok(Some(text.parse::<Rescale>()?)),
    }
}

fn geographic_bounds(info: &RasterInfo) -> Result<Bounds, ServiceError> {
    info.geographic_bounds()
        .ok_or_else(|| ServiceError::Render(RenderError::UnsupportedCrs(info.crs.to_string())))
}

fn band_name(index: usize) -> String {
    format!("b{}", index + 1)
}

fn describe(name: &str, info: &RasterInfo) -> DatasetInfo {
    let (minzoom, maxzoom) = info.zoom_range();
    DatasetInfo {
        name: name.to_string(),
        bounds: info.native_bounds().to_array(),
        geographic_bounds: info.geographic_bounds().map(|b| b.to_array()),
        crs: info.crs.to_string(),
        width: info.width,
        height: info.height,
        count: info.count(),
        band_metadata: info
            .bands
            .iter()
            .enumerate()
            .map(|(i, b)| (band_name(i), b.metadata.clone()))
            .collect(),
        band_descriptions: info
            .bands
            .iter()
            .enumerate()
            .map(|(i, b)| (band_name(i), b.description.clone()))
            .collect(),
        colorinterp: info.bands.iter().map(|b| b.color_interp.as_str()).collect(),
        dtype: info.dtype().as_str(),
        nodata_type: info.nodata_type().as_str(),
        nodata_value: info.nodata_value(),
        minzoom,
        maxzoom,
    }
}
