use std::str::FromStr;

use image::RgbaImage;
use rayon::prelude::*;
use tracing::trace;

use super::RenderError;
use crate::coord::{TileCoord, TILE_SIZE};
use crate::raster::{Crs, CrsTransform, DataType, Dataset, PixelWindow, RasterInfo, SourceLoader};

/// Linear value stretch applied before clamping to 0..255.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescale {
    pub min: f64,
    pub max: f64,
}

impl Rescale {
    #[inline]
    fn apply(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min) * 255.0
    }
}

impl FromStr for Rescale {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RenderError::InvalidRescale(s.to_string());
        let (min, max) = s.split_once(',').ok_or_else(invalid)?;
        let min: f64 = min.trim().parse().map_err(|_| invalid())?;
        let max: f64 = max.trim().parse().map_err(|_| invalid())?;
        if !(min.is_finite() && max.is_finite()) || min == max {
            return Err(invalid());
        }
        Ok(Self { min, max })
    }
}

#[inline]
fn to_byte(value: f64, rescale: Option<&Rescale>) -> u8 {
    let v = match rescale {
        Some(r) => r.apply(value),
        None => value,
    };
    v.round().clamp(0.0, 255.0) as u8
}

/// How dataset bands map onto RGBA.
struct BandMapping {
    rgb: [usize; 3],
    data: Vec<usize>,
    alpha: Option<usize>,
    /// Divisor bringing alpha values into 0..255.
    alpha_scale: f64,
}

impl BandMapping {
    fn for_dataset(dataset: &Dataset) -> Result<Self, RenderError> {
        let info = dataset.info();
        let data = info.data_bands();
        let rgb = match data.as_slice() {
            [] => return Err(RenderError::NoBands),
            [r, g, b, ..] => [*r, *g, *b],
            [grey, ..] => [*grey; 3],
        };
        let alpha = info.alpha_band();
        let alpha_scale = match alpha.map(|a| info.bands[a].data_type) {
            Some(DataType::UInt16) => 257.0,
            _ => 1.0,
        };
        Ok(Self {
            rgb,
            data,
            alpha,
            alpha_scale,
        })
    }

    #[inline]
    fn pixel(&self, values: &[Option<f64>], rescale: Option<&Rescale>) -> [u8; 4] {
        if !self.data.iter().any(|b| values[*b].is_some()) {
            return [0, 0, 0, 0];
        }
        let alpha = match self.alpha {
            Some(a) => values[a]
                .map(|v| (v / self.alpha_scale).round().clamp(0.0, 255.0) as u8)
                .unwrap_or(0),
            None => 255,
        };
        let channel = |b: usize| values[b].map(|v| to_byte(v, rescale)).unwrap_or(0);
        [
            channel(self.rgb[0]),
            channel(self.rgb[1]),
            channel(self.rgb[2]),
            alpha,
        ]
    }
}

/// Spacing in output pixels between exactly projected nodes when the
/// dataset CRS goes through PROJ. Pixels in between are interpolated.
const PROJ_GRID_STEP: u32 = 16;

/// Output pixel offsets at which positions are projected exactly. Always
/// includes the first and last pixel.
fn node_offsets(size: u32, step: u32) -> Vec<u32> {
    let last = size - 1;
    let mut offsets: Vec<u32> = (0..last).step_by(step as usize).collect();
    offsets.push(last);
    offsets
}

/// For each output pixel along one axis, the grid cell it falls in and its
/// fractional position inside that cell.
fn cell_positions(size: u32, offsets: &[u32]) -> Vec<(usize, f64)> {
    let last_cell = offsets.len() - 2;
    let mut cell = 0;
    (0..size)
        .map(|i| {
            while cell < last_cell && offsets[cell + 1] <= i {
                cell += 1;
            }
            let (a, b) = (offsets[cell], offsets[cell + 1]);
            (cell, (i - a) as f64 / (b - a) as f64)
        })
        .collect()
}

#[inline]
fn bilinear(
    corners: [Option<(f64, f64)>; 4],
    tx: f64,
    ty: f64,
) -> Option<(f64, f64)> {
    let [a, b, c, d] = [corners[0]?, corners[1]?, corners[2]?, corners[3]?];
    let lerp = |p: (f64, f64), q: (f64, f64), t: f64| (p.0 + (q.0 - p.0) * t, p.1 + (q.1 - p.1) * t);
    Some(lerp(lerp(a, b, tx), lerp(c, d, tx), ty))
}

/// Source pixel `(col, row)` under each output pixel centre of `tile`, row
/// by row. `None` where the centre has no position in the dataset CRS.
fn source_positions(
    info: &RasterInfo,
    transform: &CrsTransform,
    tile: TileCoord,
) -> Vec<Option<(i64, i64)>> {
    let size = TILE_SIZE;
    let bounds = tile.mercator_bounds();
    let resolution = bounds.width() / size as f64;
    let project = |i: u32, j: u32| {
        let mx = bounds.min_x + (i as f64 + 0.5) * resolution;
        let my = bounds.max_y - (j as f64 + 0.5) * resolution;
        let (x, y) = transform.from_mercator(mx, my)?;
        Some(info.geotransform.crs_to_pixel(x, y))
    };

    let step = match info.crs {
        Crs::Wgs84 | Crs::WebMercator => 1,
        _ => PROJ_GRID_STEP,
    };
    let offsets = node_offsets(size, step);
    let nodes: Vec<Option<(f64, f64)>> = offsets
        .iter()
        .flat_map(|&j| offsets.iter().map(move |&i| (i, j)))
        .map(|(i, j)| project(i, j))
        .collect();
    let across = offsets.len();
    let cells = cell_positions(size, &offsets);

    let mut positions = Vec::with_capacity((size * size) as usize);
    for (j, &(cy, ty)) in cells.iter().enumerate() {
        for (i, &(cx, tx)) in cells.iter().enumerate() {
            let node = |x: usize, y: usize| nodes[y * across + x];
            let corners = [
                node(cx, cy),
                node(cx + 1, cy),
                node(cx, cy + 1),
                node(cx + 1, cy + 1),
            ];
            let position = bilinear(corners, tx, ty).or_else(|| project(i as u32, j as u32));
            positions.push(position.map(|(col, row)| (col.floor() as i64, row.floor() as i64)));
        }
    }
    positions
}

/// Render one 256x256 Web Mercator tile of a dataset.
///
/// Every output pixel centre is projected into the dataset CRS and sampled
/// with nearest-neighbour lookup. Rows render in parallel on the rayon pool.
pub fn render_tile(
    dataset: &Dataset,
    loader: &dyn SourceLoader,
    tile: TileCoord,
    rescale: Option<Rescale>,
) -> Result<RgbaImage, RenderError> {
    let info = dataset.info();
    let unsupported = || RenderError::UnsupportedCrs(info.crs.to_string());
    let transform = info.crs.transform().ok_or_else(unsupported)?;
    let geographic = transform
        .bounds_to_lonlat(&info.native_bounds())
        .ok_or_else(unsupported)?;
    if !geographic.intersects(&tile.lonlat_bounds()) {
        return Err(RenderError::TileOutsideBounds(tile));
    }

    let mapping = BandMapping::for_dataset(dataset)?;
    let size = TILE_SIZE as usize;
    let positions = source_positions(info, &transform, tile);

    let mut image = RgbaImage::new(TILE_SIZE, TILE_SIZE);
    let (min_col, min_row, max_col, max_row) = positions.iter().flatten().fold(
        (i64::MAX, i64::MAX, i64::MIN, i64::MIN),
        |(c0, r0, c1, r1), &(c, r)| (c0.min(c), r0.min(r), c1.max(c), r1.max(r)),
    );
    let Some(window) = PixelWindow::covering(
        min_col as f64,
        min_row as f64,
        max_col.saturating_add(1) as f64,
        max_row.saturating_add(1) as f64,
        info.width,
        info.height,
    ) else {
        // Overlaps geographically but no pixel centre lands on data
        return Ok(image);
    };

    let reader = dataset.window_reader(window, loader)?;
    trace!(tile = %tile, ?window, layers = reader.layer_count(), "Rendering tile");

    let band_count = reader.band_count();
    let rescale = rescale.as_ref();
    let pixels: &mut [u8] = &mut image;
    pixels
        .par_chunks_mut(size * 4)
        .zip(positions.par_chunks(size))
        .for_each(|(out_row, row_positions)| {
            let mut values = vec![None; band_count];
            for (out, position) in out_row.chunks_exact_mut(4).zip(row_positions) {
                match position {
                    Some((col, row)) => {
                        reader.sample_into(*col, *row, &mut values);
                        out.copy_from_slice(&mapping.pixel(&values, rescale));
                    }
                    None => out.copy_from_slice(&[0, 0, 0, 0]),
                }
            }
        });

    Ok(image)
}
