//! Tile rendering.
//!
//! A tile is rendered by sampling the dataset at each output pixel centre
//! (nearest neighbour), mapping bands to RGBA, and encoding the result with a
//! [`TileEncoder`].

mod encoder;
mod format;
mod limiter;
mod renderer;

pub use encoder::{encoder_for, JpegTileEncoder, PngTileEncoder, TileEncoder, WebpTileEncoder};
pub use format::TileFormat;
pub use limiter::{RenderLimiter, RenderPermit};
pub use renderer::{render_tile, Rescale};

use thiserror::Error;

use crate::coord::TileCoord;
use crate::raster::RasterError;

/// Errors raised while rendering a tile.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The tile does not overlap the dataset
    #[error("Tile {0} is outside bounds")]
    TileOutsideBounds(TileCoord),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("Cannot render tiles from {0}: only EPSG:4326 and EPSG:3857 are supported")]
    UnsupportedCrs(String),

    #[error("Dataset has no data bands")]
    NoBands,

    #[error("Invalid rescale '{0}': expected 'min,max'")]
    InvalidRescale(String),

    #[error("Failed to encode {format} tile: {source}")]
    Encode {
        format: TileFormat,
        #[source]
        source: image::ImageError,
    },
}
