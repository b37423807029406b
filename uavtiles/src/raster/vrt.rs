//! GDAL VRT mosaic documents.
//!
//! Only the mosaic subset is interpreted: raster size, SRS, geotransform,
//! metadata, and per-band source lists. Pixel functions, warped VRTs and
//! overviews are not.

use std::collections::BTreeMap;

use super::xml::{self, XmlNode};
use super::{BandInfo, ColorInterp, Crs, DataType, GeoTransform, RasterError, RasterInfo};
use crate::storage::SourceLocation;

/// Pixel rectangle, possibly fractional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x_off: f64,
    pub y_off: f64,
    pub x_size: f64,
    pub y_size: f64,
}

impl Rect {
    pub fn new(x_off: f64, y_off: f64, x_size: f64, y_size: f64) -> Self {
        Self {
            x_off,
            y_off,
            x_size,
            y_size,
        }
    }

    fn from_node(node: &XmlNode) -> Option<Self> {
        let get = |name: &str| node.attr(name).and_then(|v| v.trim().parse::<f64>().ok());
        Some(Self::new(get("xOff")?, get("yOff")?, get("xSize")?, get("ySize")?))
    }

    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_off && y >= self.y_off && x < self.x_off + self.x_size && y < self.y_off + self.y_size
    }

    /// Whether two rectangles overlap with positive area.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x_off < other.x_off + other.x_size
            && other.x_off < self.x_off + self.x_size
            && self.y_off < other.y_off + other.y_size
            && other.y_off < self.y_off + self.y_size
    }
}

/// Kind of a band source element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Simple,
    Complex,
    Averaged,
}

/// One `*Source` element of a band.
#[derive(Debug, Clone, PartialEq)]
pub struct VrtSource {
    pub kind: SourceKind,
    pub location: SourceLocation,
    /// One-based band of the source file.
    pub source_band: usize,
    /// Missing means the full source.
    pub src_rect: Option<Rect>,
    /// Missing means the same as the source rectangle.
    pub dst_rect: Option<Rect>,
    pub nodata: Option<f64>,
    pub scale_offset: f64,
    pub scale_ratio: f64,
}

impl VrtSource {
    /// Source and destination rectangles once the source size is known.
    pub fn rects(&self, source_width: u32, source_height: u32) -> (Rect, Rect) {
        let src = self
            .src_rect
            .unwrap_or_else(|| Rect::new(0.0, 0.0, source_width as f64, source_height as f64));
        (src, self.dst_rect.unwrap_or(src))
    }

    /// Destination rectangle when it can be known without opening the source.
    pub fn known_dst_rect(&self) -> Option<Rect> {
        self.dst_rect.or(self.src_rect)
    }
}

/// A `VRTRasterBand`.
#[derive(Debug, Clone, PartialEq)]
pub struct VrtBand {
    pub info: BandInfo,
    pub sources: Vec<VrtSource>,
}

/// A parsed VRT document.
#[derive(Debug, Clone, PartialEq)]
pub struct VrtDocument {
    pub info: RasterInfo,
    pub bands: Vec<VrtBand>,
}

fn invalid(location: &SourceLocation, reason: impl Into<String>) -> RasterError {
    RasterError::Vrt {
        location: location.to_string(),
        reason: reason.into(),
    }
}

fn metadata(node: &XmlNode) -> BTreeMap<String, String> {
    node.children_named("Metadata")
        .filter(|m| m.attr("domain").map_or(true, str::is_empty))
        .flat_map(|m| m.children_named("MDI"))
        .filter_map(|mdi| Some((mdi.attr("key")?.to_string(), mdi.text.trim().to_string())))
        .collect()
}

fn parse_nodata(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    text.parse().ok()
}

fn parse_source(
    node: &XmlNode,
    kind: SourceKind,
    vrt: &SourceLocation,
    source_dir: Option<&std::path::Path>,
) -> Result<VrtSource, RasterError> {
    let filename_node = node
        .child("SourceFilename")
        .ok_or_else(|| invalid(vrt, format!("{} without SourceFilename", node.name)))?;
    let filename = filename_node.text.trim();
    if filename.is_empty() {
        return Err(invalid(vrt, "empty SourceFilename"));
    }
    let relative_to_vrt = filename_node
        .attr("relativeToVRT")
        .map(|v| v.trim() == "1")
        .unwrap_or(false);

    let location = if relative_to_vrt {
        vrt.join(filename)
    } else {
        match SourceLocation::parse(filename) {
            SourceLocation::Local(path) if path.is_relative() => match source_dir {
                Some(dir) => SourceLocation::Local(dir.join(path)),
                None => SourceLocation::Local(path),
            },
            other => other,
        }
    };

    let source_band = match node.child_text("SourceBand") {
        Some(text) => text
            .parse::<usize>()
            .ok()
            .filter(|b| *b > 0)
            .ok_or_else(|| invalid(vrt, format!("invalid SourceBand '{}'", text)))?,
        None => 1,
    };

    let nodata = node.child_text("NODATA").and_then(parse_nodata);
    let scale_offset = node
        .child_text("ScaleOffset")
        .and_then(|t| t.parse().ok())
        .unwrap_or(0.0);
    let scale_ratio = node
        .child_text("ScaleRatio")
        .and_then(|t| t.parse().ok())
        .unwrap_or(1.0);

    Ok(VrtSource {
        kind,
        location,
        source_band,
        src_rect: node.child("SrcRect").and_then(Rect::from_node),
        dst_rect: node.child("DstRect").and_then(Rect::from_node),
        nodata,
        scale_offset,
        scale_ratio,
    })
}

/// Parse a VRT document.
///
/// Relative `SourceFilename`s resolve against the VRT when `relativeToVRT="1"`
/// and against `source_dir` otherwise.
pub fn parse(
    text: &str,
    location: &SourceLocation,
    source_dir: Option<&std::path::Path>,
) -> Result<VrtDocument, RasterError> {
    let root = xml::parse(text).map_err(|e| invalid(location, e))?;
    if root.name != "VRTDataset" {
        return Err(invalid(location, format!("root element is <{}>", root.name)));
    }
    if root.attr("subClass").is_some() {
        return Err(RasterError::unsupported(
            location,
            format!("VRT subclass {}", root.attr("subClass").unwrap_or_default()),
        ));
    }

    let size = |name: &str| {
        root.attr(name)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|v| *v > 0)
            .ok_or_else(|| invalid(location, format!("missing or invalid {}", name)))
    };
    let width = size("rasterXSize")?;
    let height = size("rasterYSize")?;

    let crs = root
        .child_text("SRS")
        .map(Crs::from_srs_text)
        .unwrap_or_else(Crs::unknown);
    let geotransform = match root.child_text("GeoTransform") {
        Some(text) => GeoTransform::parse(text)
            .ok_or_else(|| RasterError::unsupported(location, "rotated or malformed GeoTransform"))?,
        None => return Err(RasterError::unsupported(location, "no GeoTransform")),
    };

    let mut bands = Vec::new();
    for (index, band_node) in root.children_named("VRTRasterBand").enumerate() {
        let number = band_node
            .attr("band")
            .and_then(|b| b.trim().parse::<usize>().ok())
            .unwrap_or(index + 1);
        if number != index + 1 {
            return Err(invalid(location, format!("band {} out of order", number)));
        }

        let data_type = band_node
            .attr("dataType")
            .map(|t| {
                DataType::from_gdal_name(t)
                    .ok_or_else(|| RasterError::unsupported(location, format!("data type {}", t)))
            })
            .transpose()?
            .unwrap_or(DataType::UInt8);

        let color_interp = band_node
            .child_text("ColorInterp")
            .map(ColorInterp::from_gdal_name)
            .unwrap_or(if index == 0 {
                ColorInterp::Gray
            } else {
                ColorInterp::Undefined
            });

        let info = BandInfo {
            data_type,
            nodata: band_node.child_text("NoDataValue").and_then(parse_nodata),
            description: band_node
                .child_text("Description")
                .unwrap_or_default()
                .to_string(),
            color_interp,
            metadata: metadata(band_node),
        };

        let mut sources = Vec::new();
        for child in &band_node.children {
            let kind = match child.name.as_str() {
                "SimpleSource" => SourceKind::Simple,
                "ComplexSource" => SourceKind::Complex,
                "AveragedSource" => SourceKind::Averaged,
                "KernelFilteredSource" => {
                    return Err(RasterError::unsupported(location, "KernelFilteredSource"))
                }
                _ => continue,
            };
            sources.push(parse_source(child, kind, location, source_dir)?);
        }

        bands.push(VrtBand { info, sources });
    }
    if bands.is_empty() {
        return Err(invalid(location, "no VRTRasterBand elements"));
    }

    let info = RasterInfo {
        width,
        height,
        bands: bands.iter().map(|b| b.info.clone()).collect(),
        crs,
        geotransform,
        metadata: metadata(&root),
    };
    Ok(VrtDocument { info, bands })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    const MOSAIC: &str = r#"<VRTDataset rasterXSize="200" rasterYSize="100">
  <SRS dataAxisToSRSAxisMapping="1,2">PROJCS["WGS 84 / Pseudo-Mercator",AUTHORITY["EPSG","3857"]]</SRS>
  <GeoTransform> 1.0000000000000000e+03,  5.0000000000000000e-01,  0.0000000000000000e+00,  2.0000000000000000e+03,  0.0000000000000000e+00, -5.0000000000000000e-01</GeoTransform>
  <Metadata><MDI key="FLIGHT">2024-05-01</MDI></Metadata>
  <VRTRasterBand dataType="Byte" band="1">
    <NoDataValue>0</NoDataValue>
    <ColorInterp>Red</ColorInterp>
    <Description>red</Description>
    <SimpleSource>
      <SourceFilename relativeToVRT="1">tiles/west.tif</SourceFilename>
      <SourceBand>1</SourceBand>
      <SrcRect xOff="0" yOff="0" xSize="100" ySize="100" />
      <DstRect xOff="0" yOff="0" xSize="100" ySize="100" />
    </SimpleSource>
    <ComplexSource>
      <SourceFilename relativeToVRT="0">east.tif</SourceFilename>
      <SourceBand>1</SourceBand>
      <SrcRect xOff="0" yOff="0" xSize="100" ySize="100" />
      <DstRect xOff="100" yOff="0" xSize="100" ySize="100" />
      <NODATA>255</NODATA>
      <ScaleRatio>0.5</ScaleRatio>
    </ComplexSource>
  </VRTRasterBand>
  <VRTRasterBand dataType="Byte" band="2">
    <ColorInterp>Alpha</ColorInterp>
    <SimpleSource>
      <SourceFilename>/vsis3/bucket/mask.tif</SourceFilename>
    </SimpleSource>
  </VRTRasterBand>
</VRTDataset>"#;

    fn vrt_location() -> SourceLocation {
        SourceLocation::Local(PathBuf::from("/data/site/mosaic.vrt"))
    }

    #[test]
    fn test_parse_mosaic() {
        let doc = parse(MOSAIC, &vrt_location(), Some(Path::new("/source"))).unwrap();
        assert_eq!((doc.info.width, doc.info.height), (200, 100));
        assert_eq!(doc.info.crs, Crs::WebMercator);
        assert_eq!(doc.info.geotransform.pixel_width, 0.5);
        assert_eq!(doc.info.metadata.get("FLIGHT").map(String::as_str), Some("2024-05-01"));
        assert_eq!(doc.info.alpha_band(), Some(1));

        let red = &doc.bands[0];
        assert_eq!(red.info.nodata, Some(0.0));
        assert_eq!(red.info.description, "red");
        assert_eq!(red.sources.len(), 2);
        assert_eq!(
            red.sources[0].location,
            SourceLocation::Local(PathBuf::from("/data/site/tiles/west.tif"))
        );
        assert_eq!(
            red.sources[1].location,
            SourceLocation::Local(PathBuf::from("/source/east.tif"))
        );
        assert_eq!(red.sources[1].kind, SourceKind::Complex);
        assert_eq!(red.sources[1].nodata, Some(255.0));
        assert_eq!(red.sources[1].scale_ratio, 0.5);
        assert_eq!(
            red.sources[1].known_dst_rect(),
            Some(Rect::new(100.0, 0.0, 100.0, 100.0))
        );

        let mask = &doc.bands[1].sources[0];
        assert!(mask.location.as_local().is_none());
        assert!(mask.known_dst_rect().is_none());
        assert_eq!(
            mask.rects(30, 40),
            (Rect::new(0.0, 0.0, 30.0, 40.0), Rect::new(0.0, 0.0, 30.0, 40.0))
        );
    }

    #[test]
    fn test_missing_dst_rect_defaults_to_src_rect() {
        let source = VrtSource {
            kind: SourceKind::Simple,
            location: vrt_location(),
            source_band: 1,
            src_rect: Some(Rect::new(5.0, 5.0, 10.0, 10.0)),
            dst_rect: None,
            nodata: None,
            scale_offset: 0.0,
            scale_ratio: 1.0,
        };
        let (src, dst) = source.rects(100, 100);
        assert_eq!(src, dst);
    }

    #[test]
    fn test_rejects_non_vrt() {
        let err = parse("<Other/>", &vrt_location(), None).unwrap_err();
        assert!(err.to_string().contains("root element"));
    }

    #[test]
    fn test_requires_geotransform() {
        let text = r#"<VRTDataset rasterXSize="1" rasterYSize="1"><VRTRasterBand band="1"/></VRTDataset>"#;
        let err = parse(text, &vrt_location(), None).unwrap_err();
        assert!(matches!(err, RasterError::Unsupported { .. }));
    }

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Rect::new(9.0, 9.0, 5.0, 5.0)));
        assert!(!a.intersects(&Rect::new(10.0, 0.0, 5.0, 5.0)));
        assert!(a.contains(9.99, 0.0));
        assert!(!a.contains(10.0, 0.0));
    }
}
