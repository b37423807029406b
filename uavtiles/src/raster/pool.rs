//! Shared cache of opened datasets and decoded source chunks.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use moka::sync::Cache;
use tracing::{debug, trace};

use super::dataset::Dataset;
use super::geotiff::{self, ChunkLayout, DecodedRaster, SourceRegion};
use super::window::PixelWindow;
use super::RasterError;
use crate::config::RasterSettings;
use crate::storage::{modified_time, ObjectFetcher, SourceLocation, SourceReader};

/// Number of source layouts remembered.
const LAYOUT_CAPACITY: u64 = 10_000;

/// Provides decoded pixels for source files.
pub trait SourceLoader: Send + Sync {
    /// Strip or tile layout of a source file.
    fn layout(&self, location: &SourceLocation) -> Result<ChunkLayout, RasterError>;

    /// The chunks of a source file covering `region`, in file pixels.
    fn load(
        &self,
        location: &SourceLocation,
        region: PixelWindow,
    ) -> Result<Arc<SourceRegion>, RasterError>;
}

#[derive(Clone)]
struct Stamped<T> {
    value: Arc<T>,
    modified: Option<SystemTime>,
}

type ChunkKey = (SourceLocation, u32);

/// Dataset, layout and decoded-chunk caches.
///
/// Datasets are bounded by count, decoded chunks by bytes. Local entries
/// are reloaded when the file's modification time changes.
pub struct RasterPool {
    fetcher: Arc<dyn ObjectFetcher>,
    source_dir: Option<PathBuf>,
    datasets: Cache<SourceLocation, Stamped<Dataset>>,
    layouts: Cache<SourceLocation, Stamped<ChunkLayout>>,
    /// `None` when decoded chunks are not retained between requests.
    chunks: Option<Cache<ChunkKey, Stamped<DecodedRaster>>>,
}

impl RasterPool {
    pub fn new(
        settings: &RasterSettings,
        source_dir: Option<PathBuf>,
        fetcher: Arc<dyn ObjectFetcher>,
    ) -> Self {
        let datasets = Cache::builder()
            .max_capacity(settings.pool_size.max(1) as u64)
            .build();
        let layouts = Cache::builder().max_capacity(LAYOUT_CAPACITY).build();
        let chunks = (settings.file_caching && settings.cache_max > 0).then(|| {
            Cache::builder()
                .weigher(|_key: &ChunkKey, value: &Stamped<DecodedRaster>| -> u32 {
                    value.value.size_bytes().min(u32::MAX as usize) as u32
                })
                .max_capacity(settings.cache_max as u64)
                .build()
        });
        Self {
            fetcher,
            source_dir,
            datasets,
            layouts,
            chunks,
        }
    }

    /// Open a dataset, reusing a cached one when the file is unchanged.
    pub fn open(&self, location: &SourceLocation) -> Result<Arc<Dataset>, RasterError> {
        let modified = modified_time(location);
        if let Some(entry) = self.datasets.get(location) {
            if entry.modified == modified {
                return Ok(entry.value);
            }
            debug!(location = %location, "Dataset changed on disk, reopening");
            self.datasets.invalidate(location);
        }

        let entry = self
            .datasets
            .try_get_with(location.clone(), || {
                Dataset::open(location, self.fetcher.as_ref(), self.source_dir.as_deref()).map(
                    |dataset| Stamped {
                        value: Arc::new(dataset),
                        modified,
                    },
                )
            })
            .map_err(RasterError::Shared)?;
        Ok(entry.value)
    }

    pub fn dataset_count(&self) -> u64 {
        self.datasets.run_pending_tasks();
        self.datasets.entry_count()
    }

    /// Bytes held by decoded chunks.
    pub fn cached_source_bytes(&self) -> u64 {
        match &self.chunks {
            Some(cache) => {
                cache.run_pending_tasks();
                cache.weighted_size()
            }
            None => 0,
        }
    }

    fn cached_chunk(&self, key: &ChunkKey, modified: Option<SystemTime>) -> Option<Arc<DecodedRaster>> {
        let cache = self.chunks.as_ref()?;
        match cache.get(key) {
            Some(entry) if entry.modified == modified => Some(entry.value),
            Some(_) => {
                cache.invalidate(key);
                None
            }
            None => None,
        }
    }
}

impl SourceLoader for RasterPool {
    fn layout(&self, location: &SourceLocation) -> Result<ChunkLayout, RasterError> {
        let modified = modified_time(location);
        if let Some(entry) = self.layouts.get(location) {
            if entry.modified == modified {
                return Ok(*entry.value);
            }
            self.layouts.invalidate(location);
        }

        let entry = self
            .layouts
            .try_get_with(location.clone(), || {
                let reader = SourceReader::open(location, self.fetcher.as_ref())?;
                geotiff::read_layout(reader, &location.to_string()).map(|layout| Stamped {
                    value: Arc::new(layout),
                    modified,
                })
            })
            .map_err(RasterError::Shared)?;
        Ok(*entry.value)
    }

    fn load(
        &self,
        location: &SourceLocation,
        region: PixelWindow,
    ) -> Result<Arc<SourceRegion>, RasterError> {
        let layout = self.layout(location)?;
        let modified = modified_time(location);

        let mut chunks = HashMap::new();
        let mut missing = Vec::new();
        for index in layout.chunks_in(region) {
            match self.cached_chunk(&(location.clone(), index), modified) {
                Some(chunk) => {
                    chunks.insert(index, chunk);
                }
                None => missing.push(index),
            }
        }

        if !missing.is_empty() {
            trace!(location = %location, chunks = missing.len(), "Decoding source chunks");
            let reader = SourceReader::open(location, self.fetcher.as_ref())?;
            for (index, raster) in geotiff::decode_chunks(reader, &location.to_string(), &layout, &missing)? {
                let raster = Arc::new(raster);
                if let Some(cache) = &self.chunks {
                    cache.insert(
                        (location.clone(), index),
                        Stamped {
                            value: Arc::clone(&raster),
                            modified,
                        },
                    );
                }
                chunks.insert(index, raster);
            }
        }
        Ok(Arc::new(SourceRegion::new(layout, chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::raster::geotiff::testutil::{rgb8_strips, write_solid_rgb, Georef};
    use crate::raster::{Crs, DatasetKind, PixelWindow};
    use crate::storage::HttpFetcher;
    use std::path::Path;

    fn pool(file_caching: bool) -> RasterPool {
        let config = ServerConfig::default();
        let mut raster = config.raster.clone();
        raster.file_caching = file_caching;
        RasterPool::new(&raster, None, Arc::new(HttpFetcher::new(config.storage)))
    }

    fn full(dataset: &Dataset) -> PixelWindow {
        PixelWindow::new(0, 0, dataset.info().width, dataset.info().height)
    }

    fn georef(x: f64) -> Georef {
        Georef {
            origin: (x, 1_000.0),
            pixel_size: 1.0,
            epsg: 3857,
            nodata: None,
        }
    }

    fn write_mosaic(dir: &Path) -> PathBuf {
        write_solid_rgb(&dir.join("west.tif"), 10, 10, [200, 0, 0], &georef(0.0));
        write_solid_rgb(&dir.join("east.tif"), 10, 10, [0, 0, 200], &georef(10.0));
        let mut bands = String::new();
        for band in 1..=3 {
            bands.push_str(&format!(
                r#"<VRTRasterBand dataType="Byte" band="{band}">
    <SimpleSource><SourceFilename relativeToVRT="1">west.tif</SourceFilename><SourceBand>{band}</SourceBand>
      <SrcRect xOff="0" yOff="0" xSize="10" ySize="10"/><DstRect xOff="0" yOff="0" xSize="10" ySize="10"/></SimpleSource>
    <SimpleSource><SourceFilename relativeToVRT="1">east.tif</SourceFilename><SourceBand>{band}</SourceBand>
      <SrcRect xOff="0" yOff="0" xSize="10" ySize="10"/><DstRect xOff="10" yOff="0" xSize="10" ySize="10"/></SimpleSource>
  </VRTRasterBand>"#
            ));
        }
        let vrt = format!(
            r#"<VRTDataset rasterXSize="20" rasterYSize="10">
  <SRS>EPSG:3857</SRS>
  <GeoTransform>0, 1, 0, 1000, 0, -1</GeoTransform>
  {bands}
</VRTDataset>"#
        );
        let path = dir.join("mosaic.vrt");
        std::fs::write(&path, vrt).unwrap();
        path
    }

    #[test]
    fn test_open_vrt_and_sample_each_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_mosaic(dir.path());
        let pool = pool(true);

        let dataset = pool.open(&SourceLocation::Local(path)).unwrap();
        assert!(matches!(dataset.kind(), DatasetKind::Vrt(_)));
        assert_eq!(dataset.info().crs, Crs::WebMercator);

        let reader = dataset.window_reader(full(&dataset), &pool).unwrap();
        assert_eq!(reader.sample(2, 2), vec![Some(200.0), Some(0.0), Some(0.0)]);
        assert_eq!(reader.sample(15, 2), vec![Some(0.0), Some(0.0), Some(200.0)]);
    }

    #[test]
    fn test_window_loads_only_intersecting_sources() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_mosaic(dir.path());
        // Remove the east tile: a window over the west half must still work
        std::fs::remove_file(dir.path().join("east.tif")).unwrap();
        let pool = pool(true);

        let dataset = pool.open(&SourceLocation::Local(path)).unwrap();
        let reader = dataset
            .window_reader(PixelWindow::new(0, 0, 5, 5), &pool)
            .unwrap();
        assert_eq!(reader.layer_count(), 3);

        let err = dataset
            .window_reader(full(&dataset), &pool)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_dataset_cached_and_sources_retained() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_mosaic(dir.path());
        let location = SourceLocation::Local(path);
        let pool = pool(true);

        let a = pool.open(&location).unwrap();
        let b = pool.open(&location).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.dataset_count(), 1);

        a.window_reader(full(&a), &pool).unwrap();
        assert_eq!(pool.cached_source_bytes(), 2 * 10 * 10 * 3);
    }

    #[test]
    fn test_window_decodes_only_touched_strips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("strips.tif");
        // Red channel holds the row
        let pixels: Vec<u8> = (0..16 * 16).flat_map(|i| [(i / 16) as u8, 0, 0]).collect();
        std::fs::write(&path, rgb8_strips(16, 16, &pixels, 4, &georef(0.0))).unwrap();
        let location = SourceLocation::Local(path);
        let pool = pool(true);

        let dataset = pool.open(&location).unwrap();
        let reader = dataset
            .window_reader(PixelWindow::new(2, 5, 4, 2), &pool)
            .unwrap();
        assert_eq!(reader.sample(3, 6)[0], Some(6.0));
        // Rows 5 and 6 both sit in the second strip
        assert_eq!(pool.cached_source_bytes(), 16 * 4 * 3);

        let region = pool.load(&location, PixelWindow::new(0, 3, 16, 6)).unwrap();
        assert_eq!(region.chunk_count(), 3);
        assert_eq!(region.value(0, 8, 0), Some(8.0));
        assert_eq!(pool.cached_source_bytes(), 3 * 16 * 4 * 3);
    }

    #[test]
    fn test_sources_not_retained_without_file_caching() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_mosaic(dir.path());
        let pool = pool(false);
        let dataset = pool.open(&SourceLocation::Local(path)).unwrap();
        dataset.window_reader(full(&dataset), &pool).unwrap();
        assert_eq!(pool.cached_source_bytes(), 0);
    }

    #[test]
    fn test_open_geotiff_directly() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("single.tif");
        write_solid_rgb(&path, 4, 4, [1, 2, 3], &georef(0.0));
        let pool = pool(true);
        let dataset = pool.open(&SourceLocation::Local(path)).unwrap();
        assert!(matches!(dataset.kind(), DatasetKind::GeoTiff));
        let reader = dataset.window_reader(full(&dataset), &pool).unwrap();
        assert_eq!(reader.sample(3, 3), vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_sniffs_content_without_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ortho.data");
        write_solid_rgb(&path, 2, 2, [9, 9, 9], &georef(0.0));
        let pool = pool(true);
        let dataset = pool.open(&SourceLocation::Local(path)).unwrap();
        assert_eq!(dataset.info().count(), 3);
    }

    #[test]
    fn test_missing_dataset_is_not_found() {
        let pool = pool(true);
        let err = pool
            .open(&SourceLocation::Local("/nope/missing.vrt".into()))
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
