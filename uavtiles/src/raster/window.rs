use std::sync::Arc;

use super::geotiff::SourceRegion;
use super::vrt::Rect;

/// Rectangle of dataset pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelWindow {
    pub col_off: i64,
    pub row_off: i64,
    pub width: u32,
    pub height: u32,
}

impl PixelWindow {
    pub fn new(col_off: i64, row_off: i64, width: u32, height: u32) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    /// Smallest window covering fractional pixel bounds, clipped to a
    /// `width` x `height` raster. `None` when nothing remains.
    pub fn covering(
        min_col: f64,
        min_row: f64,
        max_col: f64,
        max_row: f64,
        width: u32,
        height: u32,
    ) -> Option<Self> {
        let c0 = min_col.floor().max(0.0);
        let r0 = min_row.floor().max(0.0);
        let c1 = max_col.ceil().min(width as f64);
        let r1 = max_row.ceil().min(height as f64);
        if !(c1 > c0 && r1 > r0) {
            return None;
        }
        Some(Self::new(
            c0 as i64,
            r0 as i64,
            (c1 - c0) as u32,
            (r1 - r0) as u32,
        ))
    }

    #[inline]
    pub fn contains(&self, col: i64, row: i64) -> bool {
        col >= self.col_off
            && row >= self.row_off
            && col < self.col_off + self.width as i64
            && row < self.row_off + self.height as i64
    }

    pub fn as_rect(&self) -> Rect {
        Rect::new(
            self.col_off as f64,
            self.row_off as f64,
            self.width as f64,
            self.height as f64,
        )
    }
}

/// One source painted into a band.
#[derive(Debug, Clone)]
pub(crate) struct Layer {
    pub raster: Arc<SourceRegion>,
    /// Zero-based sample index in the source.
    pub band: usize,
    pub src: Rect,
    pub dst: Rect,
    pub nodata: Option<f64>,
    pub scale_offset: f64,
    pub scale_ratio: f64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct BandLayers {
    pub nodata: Option<f64>,
    /// In document order; later layers paint over earlier ones.
    pub layers: Vec<Layer>,
}

#[inline]
fn matches_nodata(value: f64, nodata: Option<f64>) -> bool {
    match nodata {
        Some(n) if n.is_nan() => value.is_nan(),
        Some(n) => value == n,
        None => false,
    }
}

impl BandLayers {
    #[inline]
    fn sample(&self, x: f64, y: f64) -> Option<f64> {
        for layer in self.layers.iter().rev() {
            if !layer.dst.contains(x, y) {
                continue;
            }
            let sx = layer.src.x_off + (x - layer.dst.x_off) * layer.src.x_size / layer.dst.x_size;
            let sy = layer.src.y_off + (y - layer.dst.y_off) * layer.src.y_size / layer.dst.y_size;
            let Some(raw) = layer.raster.value(sx.floor() as i64, sy.floor() as i64, layer.band) else {
                continue;
            };
            // Source nodata lets lower layers show through
            if raw.is_nan() || matches_nodata(raw, layer.nodata) {
                continue;
            }
            let value = raw * layer.scale_ratio + layer.scale_offset;
            if matches_nodata(value, self.nodata) {
                return None;
            }
            return Some(value);
        }
        None
    }
}

/// Samples the pixels of one window of a dataset.
///
/// Only the strips or tiles of sources overlapping the window are decoded.
#[derive(Debug, Clone)]
pub struct WindowReader {
    window: PixelWindow,
    bands: Vec<BandLayers>,
}

impl WindowReader {
    pub(crate) fn new(window: PixelWindow, bands: Vec<BandLayers>) -> Self {
        Self { window, bands }
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Number of source layers backing the window.
    pub fn layer_count(&self) -> usize {
        self.bands.iter().map(|b| b.layers.len()).sum()
    }

    /// Per-band values at a dataset pixel. `None` marks nodata.
    ///
    /// `out` must hold one slot per band.
    #[inline]
    pub fn sample_into(&self, col: i64, row: i64, out: &mut [Option<f64>]) {
        if !self.window.contains(col, row) {
            out.iter_mut().for_each(|v| *v = None);
            return;
        }
        let (x, y) = (col as f64 + 0.5, row as f64 + 0.5);
        for (slot, band) in out.iter_mut().zip(&self.bands) {
            *slot = band.sample(x, y);
        }
    }

    pub fn sample(&self, col: i64, row: i64) -> Vec<Option<f64>> {
        let mut out = vec![None; self.bands.len()];
        self.sample_into(col, row, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::geotiff::{ChunkLayout, DecodedRaster, SampleBuffer};
    use std::collections::HashMap;

    /// A source decoded as a single chunk.
    fn whole(raster: DecodedRaster) -> Arc<SourceRegion> {
        let layout = ChunkLayout {
            width: raster.width,
            height: raster.height,
            samples: raster.samples,
            chunk_width: raster.width,
            chunk_height: raster.height,
        };
        Arc::new(SourceRegion::new(layout, HashMap::from([(0, Arc::new(raster))])))
    }

    fn raster(width: u32, height: u32, value: u8) -> Arc<SourceRegion> {
        let data = vec![value; (width * height) as usize];
        whole(DecodedRaster::new(width, height, 1, SampleBuffer::U8(data)).unwrap())
    }

    fn layer(raster: Arc<SourceRegion>, dst: Rect, nodata: Option<f64>) -> Layer {
        let layout = *raster.layout();
        Layer {
            src: Rect::new(0.0, 0.0, layout.width as f64, layout.height as f64),
            raster,
            band: 0,
            dst,
            nodata,
            scale_offset: 0.0,
            scale_ratio: 1.0,
        }
    }

    #[test]
    fn test_later_layer_wins() {
        let band = BandLayers {
            nodata: None,
            layers: vec![
                layer(raster(10, 10, 1), Rect::new(0.0, 0.0, 10.0, 10.0), None),
                layer(raster(10, 10, 2), Rect::new(5.0, 0.0, 10.0, 10.0), None),
            ],
        };
        let reader = WindowReader::new(PixelWindow::new(0, 0, 15, 10), vec![band]);
        assert_eq!(reader.sample(2, 2), vec![Some(1.0)]);
        assert_eq!(reader.sample(7, 2), vec![Some(2.0)]);
        assert_eq!(reader.sample(14, 9), vec![Some(2.0)]);
    }

    #[test]
    fn test_source_nodata_falls_through() {
        let band = BandLayers {
            nodata: None,
            layers: vec![
                layer(raster(10, 10, 7), Rect::new(0.0, 0.0, 10.0, 10.0), None),
                layer(raster(10, 10, 0), Rect::new(0.0, 0.0, 10.0, 10.0), Some(0.0)),
            ],
        };
        let reader = WindowReader::new(PixelWindow::new(0, 0, 10, 10), vec![band]);
        assert_eq!(reader.sample(3, 3), vec![Some(7.0)]);
    }

    #[test]
    fn test_band_nodata_and_uncovered_pixels() {
        let band = BandLayers {
            nodata: Some(9.0),
            layers: vec![layer(raster(4, 4, 9), Rect::new(0.0, 0.0, 4.0, 4.0), None)],
        };
        let reader = WindowReader::new(PixelWindow::new(0, 0, 8, 8), vec![band]);
        assert_eq!(reader.sample(1, 1), vec![None]);
        assert_eq!(reader.sample(6, 6), vec![None]);
        assert_eq!(reader.sample(20, 20), vec![None]);
    }

    #[test]
    fn test_scaled_destination() {
        // 2x2 source stretched over 4x4 pixels
        let data = SampleBuffer::U8(vec![1, 2, 3, 4]);
        let source = whole(DecodedRaster::new(2, 2, 1, data).unwrap());
        let mut l = layer(source, Rect::new(0.0, 0.0, 4.0, 4.0), None);
        l.scale_ratio = 10.0;
        let reader = WindowReader::new(
            PixelWindow::new(0, 0, 4, 4),
            vec![BandLayers {
                nodata: None,
                layers: vec![l],
            }],
        );
        assert_eq!(reader.sample(0, 0), vec![Some(10.0)]);
        assert_eq!(reader.sample(3, 0), vec![Some(20.0)]);
        assert_eq!(reader.sample(0, 3), vec![Some(30.0)]);
        assert_eq!(reader.sample(2, 2), vec![Some(40.0)]);
    }

    #[test]
    fn test_covering_window() {
        let w = PixelWindow::covering(-3.2, 1.5, 4.1, 9.9, 100, 5).unwrap();
        assert_eq!(w, PixelWindow::new(0, 1, 5, 4));
        assert!(PixelWindow::covering(120.0, 0.0, 130.0, 2.0, 100, 5).is_none());
    }
}
