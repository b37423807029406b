use std::fmt;
use std::str::FromStr;

/// Encoded tile image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl TileFormat {
    /// Format for a file extension (`png`, `jpg`/`jpeg`, `webp`).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().to_ascii_lowercase().as_str() {
            "png" => Some(TileFormat::Png),
            "jpg" | "jpeg" => Some(TileFormat::Jpeg),
            "webp" => Some(TileFormat::Webp),
            _ => None,
        }
    }

    /// Like [`TileFormat::from_extension`], falling back to PNG.
    pub fn from_extension_or_png(ext: &str) -> Self {
        Self::from_extension(ext).unwrap_or_default()
    }

    pub fn extension(&self) -> &'static str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Jpeg => "jpg",
            TileFormat::Webp => "webp",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            TileFormat::Png => "image/png",
            TileFormat::Jpeg => "image/jpeg",
            TileFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for TileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("unknown tile format '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        assert_eq!(TileFormat::from_extension("JPEG"), Some(TileFormat::Jpeg));
        assert_eq!(TileFormat::from_extension("jpg"), Some(TileFormat::Jpeg));
        assert_eq!(TileFormat::from_extension("tif"), None);
        assert_eq!(TileFormat::from_extension_or_png("tif"), TileFormat::Png);
        assert_eq!(TileFormat::Jpeg.extension(), "jpg");
    }

    #[test]
    fn test_media_types() {
        assert_eq!(TileFormat::Png.media_type(), "image/png");
        assert_eq!(TileFormat::Webp.media_type(), "image/webp");
        assert!("gif".parse::<TileFormat>().is_err());
    }
}
