use std::fmt;
use std::sync::OnceLock;

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use regex::Regex;
use tracing::debug;

use crate::coord::{lonlat_to_mercator, mercator_to_lonlat, Bounds, MAX_LON, MIN_LON};

/// EPSG codes used for spherical Web Mercator over the years.
const WEB_MERCATOR_CODES: [u32; 5] = [3857, 900913, 3785, 102100, 102113];

const WGS84_DEFINITION: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Points sampled along each edge when reprojecting an extent.
const EDGE_SAMPLES: usize = 21;

/// Coordinate reference system of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Crs {
    /// EPSG:4326 longitude/latitude degrees
    Wgs84,
    /// EPSG:3857 spherical Mercator meters
    WebMercator,
    /// Any other EPSG code
    Epsg(u32),
    /// A PROJ definition string (`+proj=utm +zone=33 ...`)
    Proj(String),
    /// Unrecognised SRS text, kept for reporting
    Unknown(String),
}

/// Patterns that carry an EPSG code.
///
/// - WKT1: `AUTHORITY["EPSG","3857"]`
/// - WKT2: `ID["EPSG",3857]`
/// - plain: `EPSG:3857` or `urn:ogc:def:crs:EPSG::3857`
fn epsg_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r#"AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).unwrap(),
            Regex::new(r#"\bID\[\s*"EPSG"\s*,\s*(\d+)\s*\]"#).unwrap(),
            Regex::new(r"(?i)EPSG:+(\d+)").unwrap(),
        ]
    })
}

impl Crs {
    pub fn from_epsg(code: u32) -> Self {
        if code == 4326 {
            Crs::Wgs84
        } else if WEB_MERCATOR_CODES.contains(&code) {
            Crs::WebMercator
        } else {
            Crs::Epsg(code)
        }
    }

    pub fn unknown() -> Self {
        Crs::Unknown("unknown".to_string())
    }

    /// Interpret an SRS string: an EPSG reference, WKT1, WKT2 or PROJ text.
    ///
    /// In WKT the outermost CRS carries the last authority clause.
    pub fn from_srs_text(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Crs::unknown();
        }

        let [wkt1, wkt2, plain] = epsg_patterns();
        for re in [wkt1, wkt2] {
            if let Some(code) = re
                .captures_iter(text)
                .last()
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            {
                return Crs::from_epsg(code);
            }
        }
        if !text.contains('[') {
            if let Some(code) = plain
                .captures(text)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            {
                return Crs::from_epsg(code);
            }
        }

        let lower = text.to_ascii_lowercase();
        if lower.contains("pseudo-mercator")
            || lower.contains("pseudo_mercator")
            || lower.contains("popular visualisation")
            || (lower.contains("+proj=merc") && lower.contains("+a=6378137") && lower.contains("+b=6378137"))
        {
            return Crs::WebMercator;
        }
        if lower.starts_with("+proj=") {
            if lower.contains("+proj=longlat") && lower.contains("+datum=wgs84") {
                return Crs::Wgs84;
            }
            return Crs::Proj(text.to_string());
        }
        let projected = lower.starts_with("projcs[") || lower.starts_with("projcrs[");
        if !projected && lower.contains("\"wgs 84\"") {
            return Crs::Wgs84;
        }
        Crs::Unknown(text.chars().take(80).collect())
    }

    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Wgs84 => Some(4326),
            Crs::WebMercator => Some(3857),
            Crs::Epsg(code) => Some(*code),
            Crs::Proj(_) | Crs::Unknown(_) => None,
        }
    }

    /// Build the transform to longitude/latitude and Web Mercator.
    ///
    /// `None` when the CRS has no known definition.
    pub fn transform(&self) -> Option<CrsTransform> {
        let native = match self {
            Crs::Wgs84 => return Some(CrsTransform { kind: Kind::LonLat }),
            Crs::WebMercator => return Some(CrsTransform { kind: Kind::WebMercator }),
            Crs::Epsg(code) => {
                let code = u16::try_from(*code).ok()?;
                Proj::from_epsg_code(code)
                    .map_err(|e| debug!(crs = %self, error = ?e, "Unknown EPSG code"))
                    .ok()?
            }
            Crs::Proj(definition) => Proj::from_proj_string(definition)
                .map_err(|e| debug!(crs = %self, error = ?e, "Invalid PROJ definition"))
                .ok()?,
            Crs::Unknown(_) => return None,
        };
        let wgs84 = Proj::from_proj_string(WGS84_DEFINITION).ok()?;
        Some(CrsTransform {
            kind: Kind::Proj { native, wgs84 },
        })
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Wgs84 => write!(f, "EPSG:4326"),
            Crs::WebMercator => write!(f, "EPSG:3857"),
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Proj(text) | Crs::Unknown(text) => write!(f, "{}", text),
        }
    }
}

enum Kind {
    LonLat,
    WebMercator,
    Proj { native: Proj, wgs84: Proj },
}

/// Point transforms between a dataset CRS, longitude/latitude degrees and
/// Web Mercator meters.
pub struct CrsTransform {
    kind: Kind,
}

#[inline]
fn finite(point: (f64, f64)) -> Option<(f64, f64)> {
    (point.0.is_finite() && point.1.is_finite()).then_some(point)
}

/// Run a proj4rs transform. Geographic sides take radians.
fn reproject(src: &Proj, dst: &Proj, x: f64, y: f64) -> Option<(f64, f64)> {
    let mut point = if src.is_latlong() {
        (x.to_radians(), y.to_radians(), 0.0)
    } else {
        (x, y, 0.0)
    };
    transform(src, dst, &mut point).ok()?;
    if dst.is_latlong() {
        finite((point.0.to_degrees(), point.1.to_degrees()))
    } else {
        finite((point.0, point.1))
    }
}

impl CrsTransform {
    /// Dataset coordinates to longitude/latitude degrees.
    pub fn to_lonlat(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        match &self.kind {
            Kind::LonLat => finite((x, y)),
            Kind::WebMercator => finite(mercator_to_lonlat(x, y)),
            Kind::Proj { native, wgs84 } => reproject(native, wgs84, x, y),
        }
    }

    /// Longitude/latitude degrees to dataset coordinates.
    pub fn from_lonlat(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        match &self.kind {
            Kind::LonLat => finite((lon, lat)),
            Kind::WebMercator => finite(lonlat_to_mercator(lon, lat)),
            Kind::Proj { native, wgs84 } => reproject(wgs84, native, lon, lat),
        }
    }

    /// Dataset coordinates to Web Mercator meters.
    pub fn to_mercator(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        match &self.kind {
            Kind::WebMercator => finite((x, y)),
            _ => {
                let (lon, lat) = self.to_lonlat(x, y)?;
                finite(lonlat_to_mercator(lon, lat))
            }
        }
    }

    /// Web Mercator meters to dataset coordinates.
    pub fn from_mercator(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        match &self.kind {
            Kind::WebMercator => finite((x, y)),
            _ => {
                let (lon, lat) = mercator_to_lonlat(x, y);
                self.from_lonlat(lon, lat)
            }
        }
    }

    /// Longitude/latitude envelope of a native extent.
    ///
    /// Each edge is sampled so curved edges of projected extents are
    /// enclosed. Longitudes are clamped to +/-180 and latitudes to +/-90.
    pub fn bounds_to_lonlat(&self, bounds: &Bounds) -> Option<Bounds> {
        let mut envelope: Option<Bounds> = None;
        for i in 0..EDGE_SAMPLES {
            let t = i as f64 / (EDGE_SAMPLES - 1) as f64;
            let x = bounds.min_x + t * bounds.width();
            let y = bounds.min_y + t * bounds.height();
            let edges = [
                (x, bounds.min_y),
                (x, bounds.max_y),
                (bounds.min_x, y),
                (bounds.max_x, y),
            ];
            for (lon, lat) in edges.into_iter().filter_map(|(x, y)| self.to_lonlat(x, y)) {
                envelope = Some(match envelope {
                    None => Bounds::new(lon, lat, lon, lat),
                    Some(b) => Bounds::new(
                        b.min_x.min(lon),
                        b.min_y.min(lat),
                        b.max_x.max(lon),
                        b.max_y.max(lat),
                    ),
                });
            }
        }
        envelope.map(|b| {
            Bounds::new(
                b.min_x.max(MIN_LON),
                b.min_y.max(-90.0),
                b.max_x.min(MAX_LON),
                b.max_y.min(90.0),
            )
        })
    }
}
