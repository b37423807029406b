//! Raster datasets.
//!
//! GeoTIFF files and VRT mosaics are opened into a [`Dataset`] whose
//! [`RasterInfo`] describes size, bands and georeferencing. Pixel access goes
//! through [`WindowReader`], which only decodes the strips or tiles of the
//! sources that overlap the requested window. [`RasterPool`] keeps opened
//! datasets and decoded chunks in memory.

mod crs;
mod dataset;
pub mod geotiff;
mod pool;
mod transform;
pub mod vrt;
mod window;
pub(crate) mod xml;

pub use crs::{Crs, CrsTransform};
pub use dataset::{Dataset, DatasetKind};
pub use geotiff::{ChunkLayout, DecodedRaster, SourceRegion};
pub use pool::{RasterPool, SourceLoader};
pub use transform::GeoTransform;
pub use window::{PixelWindow, WindowReader};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::coord::{self, Bounds};
use crate::storage::StorageError;

/// Errors raised while opening or reading rasters.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to decode TIFF {location}: {source}")]
    Tiff {
        location: String,
        #[source]
        source: tiff::TiffError,
    },

    #[error("Invalid VRT {location}: {reason}")]
    Vrt { location: String, reason: String },

    #[error("Unsupported raster {location}: {reason}")]
    Unsupported { location: String, reason: String },

    /// Error shared between callers waiting on the same load
    #[error(transparent)]
    Shared(#[from] Arc<RasterError>),
}

impl RasterError {
    /// Whether the underlying file is missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            RasterError::Storage(e) => e.is_not_found(),
            RasterError::Shared(e) => e.is_not_found(),
            _ => false,
        }
    }

    pub(crate) fn unsupported(location: impl fmt::Display, reason: impl Into<String>) -> Self {
        RasterError::Unsupported {
            location: location.to_string(),
            reason: reason.into(),
        }
    }
}

/// Sample data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl DataType {
    /// Parse GDAL's `dataType` names (`Byte`, `UInt16`, ...).
    pub fn from_gdal_name(name: &str) -> Option<Self> {
        Some(match name.trim().to_ascii_lowercase().as_str() {
            "byte" | "uint8" => DataType::UInt8,
            "int8" => DataType::Int8,
            "uint16" => DataType::UInt16,
            "int16" => DataType::Int16,
            "uint32" => DataType::UInt32,
            "int32" => DataType::Int32,
            "float32" => DataType::Float32,
            "float64" => DataType::Float64,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::UInt8 => "uint8",
            DataType::Int8 => "int8",
            DataType::UInt16 => "uint16",
            DataType::Int16 => "int16",
            DataType::UInt32 => "uint32",
            DataType::Int32 => "int32",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colour interpretation of a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorInterp {
    Undefined,
    Gray,
    Palette,
    Red,
    Green,
    Blue,
    Alpha,
}

impl ColorInterp {
    pub fn from_gdal_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "gray" | "grey" => ColorInterp::Gray,
            "palette" => ColorInterp::Palette,
            "red" => ColorInterp::Red,
            "green" => ColorInterp::Green,
            "blue" => ColorInterp::Blue,
            "alpha" => ColorInterp::Alpha,
            _ => ColorInterp::Undefined,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorInterp::Undefined => "undefined",
            ColorInterp::Gray => "gray",
            ColorInterp::Palette => "palette",
            ColorInterp::Red => "red",
            ColorInterp::Green => "green",
            ColorInterp::Blue => "blue",
            ColorInterp::Alpha => "alpha",
        }
    }
}

/// Per-band properties.
#[derive(Debug, Clone, PartialEq)]
pub struct BandInfo {
    pub data_type: DataType,
    pub nodata: Option<f64>,
    pub description: String,
    pub color_interp: ColorInterp,
    pub metadata: BTreeMap<String, String>,
}

impl BandInfo {
    pub fn new(data_type: DataType, color_interp: ColorInterp) -> Self {
        Self {
            data_type,
            nodata: None,
            description: String::new(),
            color_interp,
            metadata: BTreeMap::new(),
        }
    }
}

/// How empty pixels are marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodataType {
    Alpha,
    Nodata,
    None,
}

impl NodataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodataType::Alpha => "Alpha",
            NodataType::Nodata => "Nodata",
            NodataType::None => "None",
        }
    }
}

/// Dataset-level description.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub width: u32,
    pub height: u32,
    pub bands: Vec<BandInfo>,
    pub crs: Crs,
    pub geotransform: GeoTransform,
    pub metadata: BTreeMap<String, String>,
}

impl RasterInfo {
    pub fn count(&self) -> usize {
        self.bands.len()
    }

    pub fn dtype(&self) -> DataType {
        self.bands
            .first()
            .map(|b| b.data_type)
            .unwrap_or(DataType::UInt8)
    }

    /// Zero-based index of the alpha band.
    pub fn alpha_band(&self) -> Option<usize> {
        self.bands
            .iter()
            .position(|b| b.color_interp == ColorInterp::Alpha)
    }

    /// Zero-based indexes of the bands carrying image data.
    pub fn data_bands(&self) -> Vec<usize> {
        let alpha = self.alpha_band();
        (0..self.bands.len()).filter(|i| Some(*i) != alpha).collect()
    }

    pub fn nodata_type(&self) -> NodataType {
        if self.alpha_band().is_some() {
            NodataType::Alpha
        } else if self.bands.iter().any(|b| b.nodata.is_some()) {
            NodataType::Nodata
        } else {
            NodataType::None
        }
    }

    pub fn nodata_value(&self) -> Option<f64> {
        self.bands.iter().find_map(|b| b.nodata)
    }

    /// Extent in the dataset's own CRS.
    pub fn native_bounds(&self) -> Bounds {
        self.geotransform.bounds(self.width, self.height)
    }

    /// Extent in Web Mercator meters, `None` when the CRS has no transform.
    pub fn mercator_bounds(&self) -> Option<Bounds> {
        if self.crs == Crs::WebMercator {
            return Some(self.native_bounds());
        }
        let geo = self.geographic_bounds()?;
        let (x0, y0) = coord::lonlat_to_mercator(geo.min_x, geo.min_y);
        let (x1, y1) = coord::lonlat_to_mercator(geo.max_x, geo.max_y);
        Some(Bounds::new(x0, y0, x1, y1))
    }

    /// Extent in longitude/latitude degrees, `None` when the CRS has no
    /// transform.
    pub fn geographic_bounds(&self) -> Option<Bounds> {
        self.crs.transform()?.bounds_to_lonlat(&self.native_bounds())
    }

    /// `(minzoom, maxzoom)` derived from the native resolution.
    pub fn zoom_range(&self) -> (u8, u8) {
        match self.mercator_bounds() {
            Some(b) if self.width > 0 => {
                let resolution = b.width() / self.width as f64;
                coord::zoom_range(resolution, self.width, self.height)
            }
            _ => (coord::DEFAULT_MINZOOM, coord::DEFAULT_MAXZOOM),
        }
    }
}
