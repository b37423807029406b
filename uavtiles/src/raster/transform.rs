use crate::coord::Bounds;

/// Affine pixel-to-CRS transform in GDAL's six-coefficient order.
///
/// Only north-up transforms (no rotation terms) are representable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub origin_y: f64,
    /// Negative for north-up rasters.
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Build from GDAL coefficients `[x0, dx, rx, y0, ry, dy]`.
    ///
    /// Returns `None` when the transform is rotated or degenerate.
    pub fn from_coefficients(c: [f64; 6]) -> Option<Self> {
        if c[2] != 0.0 || c[4] != 0.0 || c[1] == 0.0 || c[5] == 0.0 {
            return None;
        }
        if c.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(Self {
            origin_x: c[0],
            pixel_width: c[1],
            origin_y: c[3],
            pixel_height: c[5],
        })
    }

    /// Parse GDAL's comma-separated `GeoTransform` text.
    pub fn parse(text: &str) -> Option<Self> {
        let values: Vec<f64> = text
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        let coefficients: [f64; 6] = values.try_into().ok()?;
        Self::from_coefficients(coefficients)
    }

    pub fn coefficients(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            0.0,
            self.origin_y,
            0.0,
            self.pixel_height,
        ]
    }

    /// CRS coordinates of a (fractional) pixel position.
    #[inline]
    pub fn pixel_to_crs(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }

    /// Fractional pixel position of a CRS coordinate.
    #[inline]
    pub fn crs_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Shift the origin by half a pixel, converting a PixelIsPoint
    /// registration to PixelIsArea.
    pub fn shifted_half_pixel(&self) -> Self {
        Self {
            origin_x: self.origin_x - self.pixel_width / 2.0,
            origin_y: self.origin_y - self.pixel_height / 2.0,
            ..*self
        }
    }

    /// Extent of a `width` x `height` raster.
    pub fn bounds(&self, width: u32, height: u32) -> Bounds {
        let (x0, y0) = self.pixel_to_crs(0.0, 0.0);
        let (x1, y1) = self.pixel_to_crs(width as f64, height as f64);
        Bounds::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}
