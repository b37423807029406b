//! uavtiles: dynamic map tiles from VRT mosaics and GeoTIFF imagery.
//!
//! The library reads GDAL VRT mosaics and the GeoTIFF sources they
//! reference, renders 256x256 Web Mercator tiles on demand, and serves them
//! with TileJSON metadata over HTTP.
//!
//! - [`config`]: defaults, INI file, and environment overlay
//! - [`catalog`]: dataset discovery under the data directory
//! - [`raster`]: GeoTIFF/VRT readers and the dataset pool
//! - [`storage`]: local, HTTP, and S3 source access
//! - [`render`]: sampling, band mapping, and image encoding
//! - [`service`]: endpoint operations
//! - [`server`]: the axum HTTP layer

pub mod cache;
pub mod catalog;
pub mod config;
pub mod coord;
pub mod logging;
pub mod raster;
pub mod render;
pub mod server;
pub mod service;
pub mod storage;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
