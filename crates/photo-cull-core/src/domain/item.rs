//! Photo item snapshot types.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Supported raster formats (upper-case file extensions).
pub const RASTER_FORMATS: &[&str] = &[
    "JPG", "JPEG", "PNG", "TIFF", "TIF", "WEBP", "BMP", "GIF", "HEIC",
];

/// Supported RAW formats (upper-case file extensions).
pub const RAW_FORMATS: &[&str] = &["CR2", "CR3", "NEF", "ARW", "RAF", "DNG", "ORF", "RW2"];

/// Opaque, stable identifier of a photo in the host catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Metadata snapshot of one photograph.
///
/// Captured once before a batch starts and never mutated while the batch
/// runs. Only the fields the scoring and grouping code actually reads are
/// carried here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoItem {
    /// Catalog identity.
    pub id: ItemId,
    /// Location of the image bytes, handed to the AI backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// File format, usually the file extension (e.g. `"JPG"`, `"NEF"`).
    pub file_format: String,
    /// Capture time from EXIF.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub capture_time: Option<OffsetDateTime>,
    /// ISO sensitivity.
    #[serde(default)]
    pub iso: Option<u32>,
    /// Aperture as f-number.
    #[serde(default)]
    pub aperture: Option<f32>,
    /// Focal length in millimetres.
    #[serde(default)]
    pub focal_length: Option<f32>,
    /// File size in bytes.
    #[serde(default)]
    pub file_size: u64,
    /// Histogram buckets as fractions of the pixel count, channels summed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram: Option<Vec<f32>>,
    /// Saturation from the edit settings.
    #[serde(default)]
    pub saturation: Option<f32>,
    /// Contrast from the edit settings.
    #[serde(default)]
    pub contrast: Option<f32>,
}

impl PhotoItem {
    /// Creates an item with the given identity, dimensions and format.
    ///
    /// All optional metadata starts empty.
    #[must_use]
    pub fn new(id: impl Into<ItemId>, width: u32, height: u32, file_format: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: None,
            width,
            height,
            file_format: file_format.into(),
            capture_time: None,
            iso: None,
            aperture: None,
            focal_length: None,
            file_size: 0,
            histogram: None,
            saturation: None,
            contrast: None,
        }
    }

    /// Returns the normalized (upper-case, no leading dot) file format.
    #[must_use]
    pub fn normalized_format(&self) -> String {
        self.file_format.trim().trim_start_matches('.').to_uppercase()
    }

    /// Returns true if the file format is in the raster or RAW allow-list.
    #[must_use]
    pub fn has_supported_format(&self) -> bool {
        let format = self.normalized_format();
        RASTER_FORMATS.contains(&format.as_str()) || RAW_FORMATS.contains(&format.as_str())
    }

    /// Returns true if the format is a camera RAW format.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        RAW_FORMATS.contains(&self.normalized_format().as_str())
    }
}
