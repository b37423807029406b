//! JSON bodies returned by the service operations.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::DatasetEntry;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetList {
    pub datasets: Vec<DatasetEntry>,
}

/// Dataset metadata. `bounds` are in the dataset CRS.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub name: String,
    pub bounds: [f64; 4],
    /// `None` when the CRS cannot be converted to longitude/latitude.
    pub geographic_bounds: Option<[f64; 4]>,
    pub crs: String,
    pub width: u32,
    pub height: u32,
    pub count: usize,
    /// `[["b1", {..}], ..]`
    pub band_metadata: Vec<(String, BTreeMap<String, String>)>,
    /// `[["b1", "description"], ..]`
    pub band_descriptions: Vec<(String, String)>,
    pub colorinterp: Vec<&'static str>,
    pub dtype: &'static str,
    pub nodata_type: &'static str,
    pub nodata_value: Option<f64>,
    pub minzoom: u8,
    pub maxzoom: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundsResponse {
    pub bounds: [f64; 4],
    /// `[lon, lat]`
    pub center: [f64; 2],
    pub minzoom: u8,
    pub maxzoom: u8,
}

/// TileJSON 3.0.0 document.
#[derive(Debug, Clone, Serialize)]
pub struct TileJson {
    pub tilejson: &'static str,
    pub name: String,
    pub tiles: Vec<String>,
    pub bounds: [f64; 4],
    /// `[lon, lat, zoom]`
    pub center: [f64; 3],
    pub minzoom: u8,
    pub maxzoom: u8,
}
