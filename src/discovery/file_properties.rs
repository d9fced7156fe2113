//! Year and month encoded in raster file names.

use once_cell::sync::Lazy;
use regex::Regex;

/// `_5.tif`, `_12.tif`: the month is the 1-2 digit suffix.
static MONTH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_([0-9]{1,2})\.tif$").unwrap());

static YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])((?:19|20)[0-9]{2})(?:[^0-9]|$)").unwrap());

#[derive(Debug, Clone, PartialEq)]
/// Represents the period a raster covers, as read from its file name.
pub struct FileProperties {
    pub stem: String,
    pub year: Option<u16>,
    pub month: Option<u8>,
}

impl FileProperties {
    /// Parses a file name. Returns `None` for anything that is not a `.tif`,
    /// and for a month suffix outside `1..=12`.
    pub fn from_file(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".tif")?.to_string();

        let month = match MONTH_PATTERN.captures(file_name) {
            Some(caps) => match caps[1].parse::<u8>() {
                Ok(month @ 1..=12) => Some(month),
                _ => return None,
            },
            None => None,
        };

        let year = YEAR_PATTERN
            .captures(file_name)
            .and_then(|caps| caps[1].parse::<u16>().ok());

        Some(FileProperties { stem, year, month })
    }
}
