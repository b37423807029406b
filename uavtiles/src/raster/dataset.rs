use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::geotiff::{self, SourceRegion};
use super::pool::SourceLoader;
use super::vrt::{self, Rect, VrtDocument};
use super::window::{BandLayers, Layer, PixelWindow, WindowReader};
use super::{RasterError, RasterInfo};
use crate::storage::{modified_time, ObjectFetcher, SourceLocation, SourceReader};

/// What backs a dataset's pixels.
#[derive(Debug, Clone)]
pub enum DatasetKind {
    GeoTiff,
    Vrt(VrtDocument),
}

/// An opened raster dataset. Pixels are read lazily through
/// [`Dataset::window_reader`].
#[derive(Debug, Clone)]
pub struct Dataset {
    location: SourceLocation,
    info: RasterInfo,
    kind: DatasetKind,
}

fn read_text(reader: SourceReader, location: &SourceLocation) -> Result<String, RasterError> {
    let bytes = reader.into_bytes().map_err(|source| {
        RasterError::Storage(crate::storage::StorageError::Io {
            path: location.to_string().into(),
            source,
        })
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl Dataset {
    /// Open a `.vrt` or GeoTIFF, sniffing the content when the extension is
    /// not conclusive.
    pub fn open(
        location: &SourceLocation,
        fetcher: &dyn ObjectFetcher,
        source_dir: Option<&Path>,
    ) -> Result<Self, RasterError> {
        let mut reader = SourceReader::open(location, fetcher)?;
        let label = location.to_string();

        let is_vrt = match location.extension().as_deref() {
            Some("vrt") => true,
            Some("tif" | "tiff" | "gtiff") => false,
            _ => {
                let mut header = [0u8; 4];
                let read = reader.read(&mut header).unwrap_or(0);
                reader.seek(SeekFrom::Start(0)).map_err(|source| {
                    RasterError::Storage(crate::storage::StorageError::Io {
                        path: label.clone().into(),
                        source,
                    })
                })?;
                if geotiff::is_tiff(&header[..read]) {
                    false
                } else if header[..read].iter().any(|b| *b == b'<') {
                    true
                } else {
                    return Err(RasterError::unsupported(&label, "not a GeoTIFF or VRT file"));
                }
            }
        };

        if is_vrt {
            let text = read_text(reader, location)?;
            let document = vrt::parse(&text, location, source_dir)?;
            debug!(location = %location, bands = document.bands.len(), "Opened VRT");
            Ok(Self {
                location: location.clone(),
                info: document.info.clone(),
                kind: DatasetKind::Vrt(document),
            })
        } else {
            let info = geotiff::read_info(reader, &label)?;
            debug!(location = %location, bands = info.count(), "Opened GeoTIFF");
            Ok(Self {
                location: location.clone(),
                info,
                kind: DatasetKind::GeoTiff,
            })
        }
    }

    pub fn info(&self) -> &RasterInfo {
        &self.info
    }

    pub fn kind(&self) -> &DatasetKind {
        &self.kind
    }

    /// Fingerprint of the modification times of the dataset file and of
    /// every file it reads pixels from. Remote files contribute nothing.
    pub fn revision(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        modified_time(&self.location).hash(&mut hasher);
        if let DatasetKind::Vrt(document) = &self.kind {
            let mut seen = HashSet::new();
            for source in document.bands.iter().flat_map(|band| &band.sources) {
                if seen.insert(&source.location) {
                    source.location.hash(&mut hasher);
                    modified_time(&source.location).hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }

    /// Prepare a sampler for `window`, decoding only the strips or tiles of
    /// the sources that overlap it.
    pub fn window_reader(
        &self,
        window: PixelWindow,
        loader: &dyn SourceLoader,
    ) -> Result<WindowReader, RasterError> {
        let bands = match &self.kind {
            DatasetKind::GeoTiff => self.geotiff_layers(window, loader)?,
            DatasetKind::Vrt(document) => Self::vrt_layers(document, window, loader)?,
        };
        Ok(WindowReader::new(window, bands))
    }

    fn geotiff_layers(
        &self,
        window: PixelWindow,
        loader: &dyn SourceLoader,
    ) -> Result<Vec<BandLayers>, RasterError> {
        let region = loader.load(&self.location, window)?;
        let layout = region.layout();
        let full = Rect::new(0.0, 0.0, layout.width as f64, layout.height as f64);
        Ok(self
            .info
            .bands
            .iter()
            .enumerate()
            .map(|(i, band)| BandLayers {
                nodata: band.nodata,
                layers: vec![Layer {
                    raster: Arc::clone(&region),
                    band: i,
                    src: full,
                    dst: full,
                    nodata: None,
                    scale_offset: 0.0,
                    scale_ratio: 1.0,
                }],
            })
            .collect())
    }

    fn vrt_layers(
        document: &VrtDocument,
        window: PixelWindow,
        loader: &dyn SourceLoader,
    ) -> Result<Vec<BandLayers>, RasterError> {
        let target = window.as_rect();
        let mut loaded: HashMap<(&SourceLocation, PixelWindow), Arc<SourceRegion>> = HashMap::new();
        let mut bands = Vec::with_capacity(document.bands.len());

        for band in &document.bands {
            let mut layers = Vec::new();
            for source in &band.sources {
                if let Some(dst) = source.known_dst_rect() {
                    if !dst.intersects(&target) {
                        continue;
                    }
                }
                let layout = loader.layout(&source.location)?;
                if source.source_band > layout.samples {
                    return Err(RasterError::unsupported(
                        &source.location,
                        format!(
                            "SourceBand {} but the file has {} bands",
                            source.source_band, layout.samples
                        ),
                    ));
                }
                let (src, dst) = source.rects(layout.width, layout.height);
                if !dst.intersects(&target) || dst.x_size <= 0.0 || dst.y_size <= 0.0 {
                    continue;
                }
                let Some(region) = source_window(&src, &dst, &target, layout.width, layout.height)
                else {
                    continue;
                };
                let raster = match loaded.get(&(&source.location, region)) {
                    Some(r) => Arc::clone(r),
                    None => {
                        let r = loader.load(&source.location, region)?;
                        loaded.insert((&source.location, region), Arc::clone(&r));
                        r
                    }
                };
                layers.push(Layer {
                    raster,
                    band: source.source_band - 1,
                    src,
                    dst,
                    nodata: source.nodata,
                    scale_offset: source.scale_offset,
                    scale_ratio: source.scale_ratio,
                });
            }
            bands.push(BandLayers {
                nodata: band.info.nodata,
                layers,
            });
        }
        Ok(bands)
    }
}

/// Source file pixels read when painting the part of `dst` inside `target`.
fn source_window(
    src: &Rect,
    dst: &Rect,
    target: &Rect,
    source_width: u32,
    source_height: u32,
) -> Option<PixelWindow> {
    let x0 = target.x_off.max(dst.x_off);
    let y0 = target.y_off.max(dst.y_off);
    let x1 = (target.x_off + target.x_size).min(dst.x_off + dst.x_size);
    let y1 = (target.y_off + target.y_size).min(dst.y_off + dst.y_size);
    let to_src_x = |x: f64| src.x_off + (x - dst.x_off) * src.x_size / dst.x_size;
    let to_src_y = |y: f64| src.y_off + (y - dst.y_off) * src.y_size / dst.y_size;
    let (sx0, sx1) = (to_src_x(x0), to_src_x(x1));
    let (sy0, sy1) = (to_src_y(y0), to_src_y(y1));
    PixelWindow::covering(
        sx0.min(sx1),
        sy0.min(sy1),
        sx0.max(sx1),
        sy0.max(sy1),
        source_width,
        source_height,
    )
}
