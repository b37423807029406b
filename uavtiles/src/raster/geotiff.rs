//! GeoTIFF reading on top of the `tiff` decoder.
//!
//! Only the georeferencing tags needed to place pixels are interpreted:
//! ModelPixelScale + ModelTiepoint or ModelTransformation, the
//! GeoKeyDirectory CRS keys, `GDAL_NODATA` and `GDAL_METADATA`.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek};
use std::sync::Arc;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;

use super::xml;
use super::window::PixelWindow;
use super::{BandInfo, ColorInterp, Crs, DataType, GeoTransform, RasterError, RasterInfo};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_METADATA: u16 = 42112;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u32 = 1024;
const GT_RASTER_TYPE_KEY: u32 = 1025;
const GEOGRAPHIC_TYPE_KEY: u32 = 2048;
const PROJECTED_CS_TYPE_KEY: u32 = 3072;
const USER_DEFINED: u32 = 32767;
const RASTER_PIXEL_IS_POINT: u32 = 2;
const MODEL_TYPE_GEOGRAPHIC: u32 = 2;

const PHOTOMETRIC_RGB: u32 = 2;
const PLANAR_SEPARATE: u32 = 2;

/// Largest decoded strip, tile or tag value accepted.
const DECODE_LIMIT: usize = 1024 * 1024 * 1024;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Decoded pixels, kept in their storage type.
#[derive(Debug, Clone)]
pub enum SampleBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    F32(Vec<f32>),
}

impl SampleBuffer {
    fn from_decoded(result: DecodingResult) -> Self {
        match result {
            DecodingResult::U8(data) => SampleBuffer::U8(data),
            DecodingResult::U16(data) => SampleBuffer::U16(data),
            DecodingResult::I16(data) => SampleBuffer::I16(data),
            DecodingResult::F32(data) => SampleBuffer::F32(data),
            DecodingResult::F64(data) => SampleBuffer::F32(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I8(data) => SampleBuffer::I16(data.into_iter().map(i16::from).collect()),
            DecodingResult::I32(data) => SampleBuffer::F32(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U32(data) => SampleBuffer::F32(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U64(data) => SampleBuffer::F32(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I64(data) => SampleBuffer::F32(data.into_iter().map(|v| v as f32).collect()),
        }
    }

    fn len(&self) -> usize {
        match self {
            SampleBuffer::U8(d) => d.len(),
            SampleBuffer::U16(d) => d.len(),
            SampleBuffer::I16(d) => d.len(),
            SampleBuffer::F32(d) => d.len(),
        }
    }

    fn size_bytes(&self) -> usize {
        match self {
            SampleBuffer::U8(d) => d.len(),
            SampleBuffer::U16(d) => d.len() * 2,
            SampleBuffer::I16(d) => d.len() * 2,
            SampleBuffer::F32(d) => d.len() * 4,
        }
    }
}

/// Decoded, pixel-interleaved samples of one strip or tile.
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    pub width: u32,
    pub height: u32,
    pub samples: usize,
    buffer: SampleBuffer,
}

impl DecodedRaster {
    pub fn new(width: u32, height: u32, samples: usize, buffer: SampleBuffer) -> Option<Self> {
        (buffer.len() == width as usize * height as usize * samples).then_some(Self {
            width,
            height,
            samples,
            buffer,
        })
    }

    /// Value of `band` (zero-based) at a pixel. The caller checks bounds.
    #[inline]
    pub fn value(&self, col: u32, row: u32, band: usize) -> f64 {
        let idx = (row as usize * self.width as usize + col as usize) * self.samples + band;
        match &self.buffer {
            SampleBuffer::U8(d) => d[idx] as f64,
            SampleBuffer::U16(d) => d[idx] as f64,
            SampleBuffer::I16(d) => d[idx] as f64,
            SampleBuffer::F32(d) => d[idx] as f64,
        }
    }

    #[inline]
    pub fn contains(&self, col: i64, row: i64) -> bool {
        col >= 0 && row >= 0 && col < self.width as i64 && row < self.height as i64
    }

    pub fn size_bytes(&self) -> usize {
        self.buffer.size_bytes()
    }
}

/// How a TIFF image is cut into strips or tiles.
///
/// Strips are chunks as wide as the image. Chunks are numbered row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    pub width: u32,
    pub height: u32,
    pub samples: usize,
    pub chunk_width: u32,
    pub chunk_height: u32,
}

impl ChunkLayout {
    pub fn chunks_across(&self) -> u32 {
        self.width.div_ceil(self.chunk_width)
    }

    pub fn chunks_down(&self) -> u32 {
        self.height.div_ceil(self.chunk_height)
    }

    /// Chunk index and position inside the chunk of an image pixel.
    #[inline]
    fn locate(&self, col: u32, row: u32) -> (u32, u32, u32) {
        let index = (row / self.chunk_height) * self.chunks_across() + col / self.chunk_width;
        (index, col % self.chunk_width, row % self.chunk_height)
    }

    /// Indexes of the chunks overlapping `region`, clipped to the image.
    pub fn chunks_in(&self, region: PixelWindow) -> Vec<u32> {
        let Some(region) = PixelWindow::covering(
            region.col_off as f64,
            region.row_off as f64,
            region.col_off as f64 + region.width as f64,
            region.row_off as f64 + region.height as f64,
            self.width,
            self.height,
        ) else {
            return Vec::new();
        };
        let first_x = region.col_off as u32 / self.chunk_width;
        let last_x = (region.col_off as u32 + region.width - 1) / self.chunk_width;
        let first_y = region.row_off as u32 / self.chunk_height;
        let last_y = (region.row_off as u32 + region.height - 1) / self.chunk_height;
        let across = self.chunks_across();
        (first_y..=last_y)
            .flat_map(|cy| (first_x..=last_x).map(move |cx| cy * across + cx))
            .collect()
    }
}

/// The decoded chunks of one source file covering a requested region.
#[derive(Debug, Clone)]
pub struct SourceRegion {
    layout: ChunkLayout,
    chunks: HashMap<u32, Arc<DecodedRaster>>,
}

impl SourceRegion {
    pub fn new(layout: ChunkLayout, chunks: HashMap<u32, Arc<DecodedRaster>>) -> Self {
        Self { layout, chunks }
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Value of `band` (zero-based) at an image pixel. `None` outside the
    /// image or the decoded chunks.
    #[inline]
    pub fn value(&self, col: i64, row: i64, band: usize) -> Option<f64> {
        if col < 0 || row < 0 || col >= self.layout.width as i64 || row >= self.layout.height as i64 {
            return None;
        }
        let (index, x, y) = self.layout.locate(col as u32, row as u32);
        let chunk = self.chunks.get(&index)?;
        chunk.contains(x as i64, y as i64).then(|| chunk.value(x, y, band))
    }
}

fn tiff_error(location: &str) -> impl Fn(tiff::TiffError) -> RasterError + '_ {
    move |source| RasterError::Tiff {
        location: location.to_string(),
        source,
    }
}

fn open_decoder<R: Read + Seek>(reader: R, location: &str) -> Result<Decoder<R>, RasterError> {
    let mut limits = Limits::default();
    limits.decoding_buffer_size = DECODE_LIMIT;
    limits.intermediate_buffer_size = DECODE_LIMIT;
    limits.ifd_value_size = DECODE_LIMIT;
    Ok(Decoder::new(reader)
        .map_err(tiff_error(location))?
        .with_limits(limits))
}

fn data_type(bits: u32, format: u32) -> Option<DataType> {
    Some(match (format, bits) {
        (1, 8) => DataType::UInt8,
        (1, 16) => DataType::UInt16,
        (1, 32) => DataType::UInt32,
        (2, 8) => DataType::Int8,
        (2, 16) => DataType::Int16,
        (2, 32) => DataType::Int32,
        (3, 32) => DataType::Float32,
        (3, 64) => DataType::Float64,
        _ => return None,
    })
}

/// Read `(key, value)` pairs stored inline in the GeoKeyDirectory.
fn geo_keys<R: Read + Seek>(decoder: &mut Decoder<R>) -> BTreeMap<u32, u32> {
    let mut keys = BTreeMap::new();
    let Ok(dir) = decoder.get_tag_u32_vec(tag(GEO_KEY_DIRECTORY)) else {
        return keys;
    };
    if dir.len() < 4 {
        return keys;
    }
    let count = dir[3] as usize;
    for entry in dir[4..].chunks_exact(4).take(count) {
        // Location 0 means the value is stored in the entry itself
        if entry[1] == 0 {
            keys.insert(entry[0], entry[3]);
        }
    }
    keys
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>, keys: &BTreeMap<u32, u32>) -> Crs {
    let projected = keys.get(&PROJECTED_CS_TYPE_KEY).copied();
    let geographic = keys.get(&GEOGRAPHIC_TYPE_KEY).copied();
    let model = keys.get(&GT_MODEL_TYPE_KEY).copied();

    match (projected, geographic) {
        (Some(code), _) if code != USER_DEFINED => Crs::from_epsg(code),
        (None, Some(code)) if code != USER_DEFINED && model != Some(1) => Crs::from_epsg(code),
        (None, None) if model == Some(MODEL_TYPE_GEOGRAPHIC) => Crs::Wgs84,
        _ => match decoder.get_tag_ascii_string(tag(GEO_ASCII_PARAMS)) {
            Ok(citation) => Crs::from_srs_text(citation.trim_end_matches(['|', '\0'])),
            Err(_) => Crs::unknown(),
        },
    }
}

fn read_geotransform<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    location: &str,
) -> Result<Option<GeoTransform>, RasterError> {
    if let Ok(m) = decoder.get_tag_f64_vec(tag(MODEL_TRANSFORMATION)) {
        if m.len() >= 8 {
            return GeoTransform::from_coefficients([m[3], m[0], m[1], m[7], m[4], m[5]])
                .map(Some)
                .ok_or_else(|| RasterError::unsupported(location, "rotated geotransform"));
        }
    }

    let tiepoint = decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT));
    let scale = decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE));
    if let (Ok(tie), Ok(scale)) = (tiepoint, scale) {
        if tie.len() >= 6 && scale.len() >= 2 {
            // Tiepoint: [i, j, k, x, y, z] maps pixel (i, j) to model (x, y)
            let origin_x = tie[3] - tie[0] * scale[0];
            let origin_y = tie[4] + tie[1] * scale[1];
            return GeoTransform::from_coefficients([origin_x, scale[0], 0.0, origin_y, 0.0, -scale[1]])
                .map(Some)
                .ok_or_else(|| RasterError::unsupported(location, "degenerate pixel scale"));
        }
    }
    Ok(None)
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(tag(GDAL_NODATA)).ok()?;
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match text.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

/// Apply `GDAL_METADATA` items: dataset metadata, band metadata and band
/// descriptions.
fn apply_gdal_metadata(text: &str, info: &mut RasterInfo) {
    let Ok(root) = xml::parse(text.trim_end_matches('\0')) else {
        return;
    };
    for item in root.children_named("Item") {
        let Some(name) = item.attr("name") else {
            continue;
        };
        let value = item.text.trim().to_string();
        let band = item.attr("sample").and_then(|s| s.parse::<usize>().ok());
        match (band, item.attr("role")) {
            (Some(b), Some("description")) => {
                if let Some(band) = info.bands.get_mut(b) {
                    band.description = value;
                }
            }
            (Some(b), None) => {
                if let Some(band) = info.bands.get_mut(b) {
                    band.metadata.insert(name.to_string(), value);
                }
            }
            (None, None) => {
                info.metadata.insert(name.to_string(), value);
            }
            _ => {}
        }
    }
}

fn read_info_from<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    location: &str,
) -> Result<RasterInfo, RasterError> {
    let (width, height) = decoder.dimensions().map_err(tiff_error(location))?;
    let samples = decoder
        .get_tag_u32(Tag::SamplesPerPixel)
        .unwrap_or(1)
        .max(1) as usize;

    if decoder.get_tag_u32(Tag::PlanarConfiguration).ok() == Some(PLANAR_SEPARATE) {
        return Err(RasterError::unsupported(
            location,
            "band-separate planar layout",
        ));
    }

    let bits = decoder
        .get_tag_u32_vec(Tag::BitsPerSample)
        .ok()
        .and_then(|v| v.first().copied())
        .unwrap_or(8);
    let format = decoder
        .get_tag_u32_vec(Tag::SampleFormat)
        .ok()
        .and_then(|v| v.first().copied())
        .unwrap_or(1);
    let data_type = data_type(bits, format).ok_or_else(|| {
        RasterError::unsupported(location, format!("{}-bit samples of format {}", bits, format))
    })?;

    let photometric = decoder.get_tag_u32(Tag::PhotometricInterpretation).unwrap_or(1);
    let extra = decoder.get_tag_u32_vec(Tag::ExtraSamples).unwrap_or_default();

    let mut interps: Vec<ColorInterp> = (0..samples)
        .map(|i| match (photometric, i) {
            (PHOTOMETRIC_RGB, 0) => ColorInterp::Red,
            (PHOTOMETRIC_RGB, 1) => ColorInterp::Green,
            (PHOTOMETRIC_RGB, 2) => ColorInterp::Blue,
            (0 | 1, 0) => ColorInterp::Gray,
            (3, 0) => ColorInterp::Palette,
            _ => ColorInterp::Undefined,
        })
        .collect();

    // ExtraSamples 1 (associated) and 2 (unassociated) are alpha
    let first_extra = samples.saturating_sub(extra.len());
    for (i, kind) in extra.iter().enumerate() {
        if matches!(kind, 1 | 2) {
            if let Some(interp) = interps.get_mut(first_extra + i) {
                *interp = ColorInterp::Alpha;
            }
        }
    }
    if extra.is_empty() && photometric == PHOTOMETRIC_RGB && samples == 4 {
        interps[3] = ColorInterp::Alpha;
    }

    let keys = geo_keys(decoder);
    let crs = read_crs(decoder, &keys);
    let mut geotransform = read_geotransform(decoder, location)?
        .ok_or_else(|| RasterError::unsupported(location, "no georeferencing tags"))?;
    if keys.get(&GT_RASTER_TYPE_KEY) == Some(&RASTER_PIXEL_IS_POINT) {
        geotransform = geotransform.shifted_half_pixel();
    }

    let nodata = read_nodata(decoder);
    let bands = interps
        .into_iter()
        .map(|interp| BandInfo {
            nodata,
            ..BandInfo::new(data_type, interp)
        })
        .collect();

    let mut info = RasterInfo {
        width,
        height,
        bands,
        crs,
        geotransform,
        metadata: BTreeMap::new(),
    };
    if let Ok(text) = decoder.get_tag_ascii_string(tag(GDAL_METADATA)) {
        apply_gdal_metadata(&text, &mut info);
    }
    Ok(info)
}

/// Read dataset properties without decoding pixels.
pub fn read_info<R: Read + Seek>(reader: R, location: &str) -> Result<RasterInfo, RasterError> {
    let mut decoder = open_decoder(reader, location)?;
    read_info_from(&mut decoder, location)
}

/// Read the strip or tile layout of the first image.
pub fn read_layout<R: Read + Seek>(reader: R, location: &str) -> Result<ChunkLayout, RasterError> {
    let mut decoder = open_decoder(reader, location)?;
    layout_of(&mut decoder, location)
}

fn layout_of<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    location: &str,
) -> Result<ChunkLayout, RasterError> {
    let (width, height) = decoder.dimensions().map_err(tiff_error(location))?;
    let samples = decoder
        .get_tag_u32(Tag::SamplesPerPixel)
        .unwrap_or(1)
        .max(1) as usize;
    if decoder.get_tag_u32(Tag::PlanarConfiguration).ok() == Some(PLANAR_SEPARATE) {
        return Err(RasterError::unsupported(location, "band-separate planar layout"));
    }
    let (chunk_width, chunk_height) = decoder.chunk_dimensions();
    if chunk_width == 0 || chunk_height == 0 {
        return Err(RasterError::unsupported(location, "empty strip or tile size"));
    }
    Ok(ChunkLayout {
        width,
        height,
        samples,
        chunk_width,
        chunk_height,
    })
}

/// Decode the given strips or tiles of the first image.
///
/// `layout` must be the file's current layout. Each chunk comes back cropped
/// to the part inside the image.
pub fn decode_chunks<R: Read + Seek>(
    reader: R,
    location: &str,
    layout: &ChunkLayout,
    indexes: &[u32],
) -> Result<Vec<(u32, DecodedRaster)>, RasterError> {
    let mut decoder = open_decoder(reader, location)?;
    if layout_of(&mut decoder, location)? != *layout {
        return Err(RasterError::unsupported(location, "file changed while reading"));
    }
    let count = layout.chunks_across() * layout.chunks_down();
    indexes
        .iter()
        .map(|&index| {
            if index >= count {
                return Err(RasterError::unsupported(
                    location,
                    format!("chunk {} out of {}", index, count),
                ));
            }
            let (width, height) = decoder.chunk_data_dimensions(index);
            let data = decoder.read_chunk(index).map_err(tiff_error(location))?;
            let raster = DecodedRaster::new(width, height, layout.samples, SampleBuffer::from_decoded(data))
                .ok_or_else(|| {
                    RasterError::unsupported(location, "sample count does not match chunk size")
                })?;
            Ok((index, raster))
        })
        .collect()
}

/// Whether the bytes start with a TIFF or BigTIFF signature.
pub fn is_tiff(header: &[u8]) -> bool {
    matches!(
        header.get(..4),
        Some([b'I', b'I', 42, 0]) | Some([b'M', b'M', 0, 42]) | Some([b'I', b'I', 43, 0]) | Some([b'M', b'M', 0, 43])
    )
}
