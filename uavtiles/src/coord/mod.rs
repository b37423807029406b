//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude),
//! Web Mercator meters, and slippy-map tile coordinates used by map clients.

mod types;

pub use types::{
    Bounds, CoordError, TileCoord, EARTH_RADIUS, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON,
    MIN_ZOOM, ORIGIN_SHIFT, TILE_SIZE,
};

use std::f64::consts::PI;

/// Highest zoom level reported for a dataset's native resolution.
pub const MAX_DATASET_ZOOM: u8 = 24;

/// Zoom range reported when it cannot be derived from the dataset.
pub const DEFAULT_MINZOOM: u8 = 0;
pub const DEFAULT_MAXZOOM: u8 = 22;

/// Converts geographic coordinates to tile coordinates.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 30)
///
/// # Returns
///
/// A `Result` containing the tile coordinates or an error if inputs are invalid.
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    // Validate inputs
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    // Calculate number of tiles at this zoom level
    let n = 2.0_f64.powi(zoom as i32);
    let last = (n as u64 - 1) as u32;

    // Convert longitude to tile X coordinate
    let x = (((lon + 180.0) / 360.0 * n) as u32).min(last);

    // Convert latitude to tile Y coordinate using Web Mercator projection
    let lat_rad = lat * PI / 180.0;
    let y = (((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as u32).min(last);

    Ok(TileCoord { z: zoom, x, y })
}

/// Projects longitude/latitude degrees to Web Mercator meters.
///
/// Latitudes beyond the Mercator limit are clamped so the result stays finite.
#[inline]
pub fn lonlat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(MIN_LAT, MAX_LAT);
    let x = lon.to_radians() * EARTH_RADIUS;
    let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
    (x, y)
}

/// Inverse of [`lonlat_to_mercator`].
#[inline]
pub fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}

/// Ground resolution in meters per pixel of a 256px tile at `zoom`.
#[inline]
pub fn resolution_at_zoom(zoom: u8) -> f64 {
    2.0 * ORIGIN_SHIFT / (TILE_SIZE as f64 * 2.0_f64.powi(zoom as i32))
}

/// Zoom level whose tile resolution is closest to `resolution` (meters/pixel).
///
/// The result is clamped to `0..=MAX_DATASET_ZOOM`.
pub fn zoom_for_resolution(resolution: f64) -> u8 {
    if !(resolution.is_finite() && resolution > 0.0) {
        return DEFAULT_MAXZOOM;
    }
    let exact = (resolution_at_zoom(0) / resolution).log2();
    exact.round().clamp(0.0, MAX_DATASET_ZOOM as f64) as u8
}

/// Derives `(minzoom, maxzoom)` for a raster.
///
/// `maxzoom` matches the native resolution; `minzoom` is the level at which
/// the whole raster fits into roughly one tile.
pub fn zoom_range(resolution: f64, width: u32, height: u32) -> (u8, u8) {
    if !(resolution.is_finite() && resolution > 0.0) || width == 0 || height == 0 {
        return (DEFAULT_MINZOOM, DEFAULT_MAXZOOM);
    }
    let maxzoom = zoom_for_resolution(resolution);
    let overview = resolution * width.max(height) as f64 / TILE_SIZE as f64;
    let minzoom = zoom_for_resolution(overview).min(maxzoom);
    (minzoom, maxzoom)
}

#[cfg(test)]
mod tests;
