//! Byte sizes for the cache settings.
//!
//! `TILE_CACHE_SIZE` takes plain byte counts or a binary unit (`256MB`,
//! `1g`). `GDAL_CACHEMAX` reads the same forms, except that a bare number
//! below [`CACHEMAX_MB_LIMIT`] counts megabytes.

use thiserror::Error;

/// Bare `GDAL_CACHEMAX` values below this are megabytes.
pub const CACHEMAX_MB_LIMIT: usize = 100_000;

/// Binary units, largest first. Single letters are accepted on input only.
const UNITS: [(&str, &str, u32); 4] = [("TB", "T", 40), ("GB", "G", 30), ("MB", "M", 20), ("KB", "K", 10)];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SizeError {
    #[error("Empty size value")]
    Empty,

    #[error("Invalid size '{0}': expected a whole number with an optional KB, MB, GB or TB unit")]
    Malformed(String),

    #[error("Size '{0}' does not fit in memory")]
    TooLarge(String),
}

/// A whole number followed by an optional unit shift.
struct Quantity {
    count: usize,
    shift: Option<u32>,
}

impl Quantity {
    fn parse(input: &str) -> Result<Self, SizeError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(SizeError::Empty);
        }

        let digits = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
        let (number, unit) = text.split_at(digits);
        let count = number
            .parse::<usize>()
            .map_err(|_| SizeError::Malformed(input.to_string()))?;

        let unit = unit.trim().to_ascii_uppercase();
        let shift = match unit.as_str() {
            "" => None,
            "B" => Some(0),
            _ => Some(
                UNITS
                    .iter()
                    .find(|(long, short, _)| unit == *long || unit == *short)
                    .map(|(_, _, shift)| *shift)
                    .ok_or_else(|| SizeError::Malformed(input.to_string()))?,
            ),
        };
        Ok(Self { count, shift })
    }

    fn bytes(&self, shift: u32, input: &str) -> Result<usize, SizeError> {
        1usize
            .checked_shl(shift)
            .and_then(|unit| self.count.checked_mul(unit))
            .ok_or_else(|| SizeError::TooLarge(input.to_string()))
    }
}

/// Parse a byte count such as `1024`, `500 MB` or `2g`.
///
/// ```
/// use uavtiles::config::parse_size;
///
/// assert_eq!(parse_size("1 KB").unwrap(), 1024);
/// assert_eq!(parse_size("3m").unwrap(), 3 << 20);
/// ```
pub fn parse_size(input: &str) -> Result<usize, SizeError> {
    let quantity = Quantity::parse(input)?;
    quantity.bytes(quantity.shift.unwrap_or(0), input)
}

/// Parse `GDAL_CACHEMAX`: bare numbers under [`CACHEMAX_MB_LIMIT`] are
/// megabytes, larger bare numbers are bytes.
pub fn parse_cache_max(input: &str) -> Result<usize, SizeError> {
    let quantity = Quantity::parse(input)?;
    let shift = match quantity.shift {
        Some(shift) => shift,
        None if quantity.count < CACHEMAX_MB_LIMIT => 20,
        None => 0,
    };
    quantity.bytes(shift, input)
}

/// Render bytes in the largest unit that divides them evenly, so the
/// result parses back to the same value.
///
/// ```
/// use uavtiles::config::format_size;
///
/// assert_eq!(format_size(512 << 20), "512MB");
/// assert_eq!(format_size(1000), "1000");
/// ```
pub fn format_size(bytes: usize) -> String {
    if bytes == 0 {
        return "0".to_string();
    }
    UNITS
        .iter()
        .find(|(_, _, shift)| {
            let unit = 1u64 << shift;
            bytes as u64 >= unit && bytes as u64 % unit == 0
        })
        .map(|(long, _, shift)| format!("{}{}", bytes as u64 >> shift, long))
        .unwrap_or_else(|| bytes.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_and_spacing() {
        assert_eq!(parse_size("0"), Ok(0));
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("512b"), Ok(512));
        assert_eq!(parse_size("64k"), Ok(64 << 10));
        assert_eq!(parse_size(" 256 MB "), Ok(256 << 20));
        assert_eq!(parse_size("2G"), Ok(2 << 30));
    }

    #[test]
    fn test_rejected_values() {
        assert_eq!(parse_size("   "), Err(SizeError::Empty));
        for bad in ["MB", "1.5GB", "-1", "10 PB", "12 MBB", "25%"] {
            assert_eq!(parse_size(bad), Err(SizeError::Malformed(bad.to_string())), "{bad}");
        }
        let huge = format!("{}TB", usize::MAX);
        assert_eq!(parse_size(&huge), Err(SizeError::TooLarge(huge.clone())));
    }

    #[test]
    fn test_cache_max_bare_numbers() {
        assert_eq!(parse_cache_max("512"), Ok(512 << 20));
        assert_eq!(parse_cache_max("99999"), Ok(99_999 << 20));
        assert_eq!(parse_cache_max("100000"), Ok(100_000));
        assert_eq!(parse_cache_max("1GB"), Ok(1 << 30));
        assert_eq!(parse_cache_max("64 kb"), Ok(64 << 10));
        assert!(parse_cache_max("25%").is_err());
    }

    #[test]
    fn test_formatted_sizes_parse_back() {
        for bytes in [0, 1000, 1536, 3 << 20, 5 << 30, (1 << 30) + (1 << 20)] {
            assert_eq!(parse_size(&format_size(bytes)), Ok(bytes));
        }
        assert_eq!(format_size(1536), "1536");
        assert_eq!(format_size(1025 << 20), "1025MB");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(SizeError::Empty.to_string(), "Empty size value");
        assert!(SizeError::Malformed("x".into()).to_string().starts_with("Invalid size 'x'"));
    }
}
