//! Coordinate type definitions

use thiserror::Error;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.051_128_779_806_59;
pub const MAX_LAT: f64 = 85.051_128_779_806_59;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Zoom levels accepted in tile requests
pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 30;

/// WGS84 semi-major axis in meters (spherical Mercator radius).
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the Web Mercator world width in meters.
pub const ORIGIN_SHIFT: f64 = std::f64::consts::PI * EARTH_RADIUS;

/// Tile edge length in pixels.
pub const TILE_SIZE: u32 = 256;

/// Tile coordinates in the slippy-map (z/x/y) system.
///
/// `x` grows eastward from the antimeridian, `y` grows southward from the
/// northern edge of the Web Mercator square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level
    pub z: u8,
    /// Column, 0 at west
    pub x: u32,
    /// Row, 0 at north
    pub y: u32,
}

impl TileCoord {
    /// Create a tile coordinate, validating it against the zoom level grid.
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if z > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(z));
        }
        let n = 1u64 << z;
        if u64::from(x) >= n || u64::from(y) >= n {
            return Err(CoordError::TileOutOfRange { z, x, y });
        }
        Ok(Self { z, x, y })
    }

    /// Number of tiles along one axis at this tile's zoom level.
    #[inline]
    pub fn matrix_size(&self) -> u64 {
        1u64 << self.z
    }

    /// Bounds of this tile in Web Mercator meters (EPSG:3857).
    pub fn mercator_bounds(&self) -> Bounds {
        let size = 2.0 * ORIGIN_SHIFT / self.matrix_size() as f64;
        let min_x = -ORIGIN_SHIFT + self.x as f64 * size;
        let max_y = ORIGIN_SHIFT - self.y as f64 * size;
        Bounds::new(min_x, max_y - size, min_x + size, max_y)
    }

    /// Bounds of this tile in degrees (EPSG:4326).
    pub fn lonlat_bounds(&self) -> Bounds {
        let m = self.mercator_bounds();
        let (west, south) = super::mercator_to_lonlat(m.min_x, m.min_y);
        let (east, north) = super::mercator_to_lonlat(m.max_x, m.max_y);
        Bounds::new(west, south, east, north)
    }

    /// The four tiles one zoom level deeper covering this tile.
    pub fn children(&self) -> Option<[TileCoord; 4]> {
        if self.z >= MAX_ZOOM {
            return None;
        }
        let (z, x, y) = (self.z + 1, self.x * 2, self.y * 2);
        Some([
            TileCoord { z, x, y },
            TileCoord { z, x: x + 1, y },
            TileCoord { z, x, y: y + 1 },
            TileCoord {
                z,
                x: x + 1,
                y: y + 1,
            },
        ])
    }

    /// The tile one zoom level up that contains this tile.
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            return None;
        }
        Some(TileCoord {
            z: self.z - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Axis-aligned bounding box in some CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Center point as `(x, y)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Whether the two boxes share interior area. Touching edges do not count.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// `[min_x, min_y, max_x, max_y]`, the order used by TileJSON.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude is outside valid range (-85.05112878 to 85.05112878)
    #[error("Invalid latitude: {0} (must be between {} and {})", MIN_LAT, MAX_LAT)]
    InvalidLatitude(f64),
    /// Longitude is outside valid range (-180.0 to 180.0)
    #[error("Invalid longitude: {0} (must be between {} and {})", MIN_LON, MAX_LON)]
    InvalidLongitude(f64),
    /// Zoom level is outside valid range
    #[error("Invalid zoom level: {0} (must be between {} and {})", MIN_ZOOM, MAX_ZOOM)]
    InvalidZoom(u8),
    /// Column or row does not exist at the zoom level
    #[error("Tile {z}/{x}/{y} is outside the zoom {z} tile grid")]
    TileOutOfRange { z: u8, x: u32, y: u32 },
}
