//! Image encoders for rendered tiles.

use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use super::{RenderError, TileFormat};

/// JPEG quality used for tiles.
pub const JPEG_QUALITY: u8 = 85;

/// Encodes a rendered RGBA tile into an image file.
///
/// Implementations must be `Send + Sync`; encoders are shared across render
/// workers.
pub trait TileEncoder: Send + Sync {
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, RenderError>;

    fn format(&self) -> TileFormat;
}

impl<T: TileEncoder + ?Sized> TileEncoder for Arc<T> {
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
        (**self).encode(image)
    }

    fn format(&self) -> TileFormat {
        (**self).format()
    }
}

fn encode_error(format: TileFormat) -> impl Fn(image::ImageError) -> RenderError {
    move |source| RenderError::Encode { format, source }
}

/// PNG with the alpha channel preserved.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngTileEncoder;

impl TileEncoder for PngTileEncoder {
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(encode_error(TileFormat::Png))?;
        Ok(out)
    }

    fn format(&self) -> TileFormat {
        TileFormat::Png
    }
}

/// JPEG. The mask is dropped; transparent pixels come out black.
#[derive(Debug, Clone, Copy)]
pub struct JpegTileEncoder {
    quality: u8,
}

impl JpegTileEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for JpegTileEncoder {
    fn default() -> Self {
        Self::new(JPEG_QUALITY)
    }
}

impl TileEncoder for JpegTileEncoder {
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
        let rgb: Vec<u8> = image
            .pixels()
            .flat_map(|p| [p[0], p[1], p[2]])
            .collect();
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .write_image(&rgb, image.width(), image.height(), ExtendedColorType::Rgb8)
            .map_err(encode_error(TileFormat::Jpeg))?;
        Ok(out)
    }

    fn format(&self) -> TileFormat {
        TileFormat::Jpeg
    }
}

/// Lossless WebP with alpha.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebpTileEncoder;

impl TileEncoder for WebpTileEncoder {
    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::new();
        WebPEncoder::new_lossless(&mut out)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(encode_error(TileFormat::Webp))?;
        Ok(out)
    }

    fn format(&self) -> TileFormat {
        TileFormat::Webp
    }
}

/// Encoder for a tile format with the default settings.
pub fn encoder_for(format: TileFormat) -> Arc<dyn TileEncoder> {
    match format {
        TileFormat::Png => Arc::new(PngTileEncoder),
        TileFormat::Jpeg => Arc::new(JpegTileEncoder::default()),
        TileFormat::Webp => Arc::new(WebpTileEncoder),
    }
}
