use thiserror::Error;

use crate::coord::{CoordError, TileCoord};
use crate::raster::RasterError;
use crate::render::RenderError;

/// Errors returned by [`TileService`](super::TileService) operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Dataset {0} not found")]
    DatasetNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("url parameter required")]
    MissingUrl,

    #[error("Invalid tile coordinates: {0}")]
    InvalidTile(#[from] CoordError),

    /// A query parameter could not be parsed
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The tile does not overlap the dataset. Not a failure for map clients.
    #[error("Tile {0} is outside bounds")]
    TileOutsideBounds(TileCoord),

    #[error(transparent)]
    Render(RenderError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error("Service is shutting down")]
    ShuttingDown,

    #[error("Render task failed: {0}")]
    TaskFailed(String),
}

impl From<RenderError> for ServiceError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::TileOutsideBounds(tile) => ServiceError::TileOutsideBounds(tile),
            RenderError::InvalidRescale(value) => {
                ServiceError::InvalidParameter(format!("rescale '{}', expected 'min,max'", value))
            }
            RenderError::Raster(raster) => ServiceError::Raster(raster),
            other => ServiceError::Render(other),
        }
    }
}

impl ServiceError {
    /// True when the underlying file vanished or was never there.
    pub(crate) fn is_not_found(&self) -> bool {
        match self {
            ServiceError::DatasetNotFound(_) | ServiceError::FileNotFound(_) => true,
            ServiceError::Raster(e) => e.is_not_found(),
            _ => false,
        }
    }
}
