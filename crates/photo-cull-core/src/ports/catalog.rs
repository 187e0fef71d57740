//! Host catalog port.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{ItemId, PhotoItem};

/// Metadata keys understood by the core.
pub mod keys {
    /// Width in pixels.
    pub const WIDTH: &str = "width";
    /// Height in pixels.
    pub const HEIGHT: &str = "height";
    /// File format / extension.
    pub const FILE_FORMAT: &str = "fileFormat";
    /// EXIF capture time.
    pub const CAPTURE_TIME: &str = "captureTime";
    /// ISO sensitivity.
    pub const ISO: &str = "iso";
    /// Aperture (f-number).
    pub const APERTURE: &str = "aperture";
    /// Focal length in mm.
    pub const FOCAL_LENGTH: &str = "focalLength";
    /// File size in bytes.
    pub const FILE_SIZE: &str = "fileSize";
    /// Histogram buckets.
    pub const HISTOGRAM: &str = "histogram";
    /// Edit-settings saturation.
    pub const SATURATION: &str = "saturation";
    /// Edit-settings contrast.
    pub const CONTRAST: &str = "contrast";
    /// Path to the image bytes.
    pub const PATH: &str = "path";
    /// Star rating (0-5), written back.
    pub const RATING: &str = "rating";
    /// Color label, written back.
    pub const LABEL: &str = "label";
}

/// A metadata value stored in the host catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Boolean flag.
    Bool(bool),
    /// Whole number.
    Integer(i64),
    /// Floating point number.
    Number(f64),
    /// Point in time.
    #[serde(with = "time::serde::rfc3339")]
    Timestamp(OffsetDateTime),
    /// Free text.
    Text(String),
    /// Histogram or other numeric series.
    Buckets(Vec<f32>),
}

impl MetadataValue {
    /// Numeric view of the value.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Integer view of the value, rounding numbers.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Number(n) if n.is_finite() => Some(n.round() as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text view of the value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Port to the host photo catalog.
///
/// Reads per-item metadata and optionally writes back a rating or label.
pub trait Catalog: Send + Sync {
    /// Reads one metadata value.
    fn get_metadata(&self, id: &ItemId, key: &str) -> Option<MetadataValue>;

    /// Writes one metadata value.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog rejects or cannot persist the value.
    fn set_metadata(&self, id: &ItemId, key: &str, value: MetadataValue) -> anyhow::Result<()>;
}

impl PhotoItem {
    /// Builds a snapshot of an item from the catalog.
    ///
    /// Missing numeric fields become zero and missing optional fields stay
    /// empty; validation happens later, in the batch's preparing phase.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn from_catalog(catalog: &dyn Catalog, id: ItemId) -> Self {
        let get = |key: &str| catalog.get_metadata(&id, key);
        let unsigned = |key: &str| {
            get(key)
                .and_then(|v| v.as_i64())
                .and_then(|v| u64::try_from(v).ok())
        };
        let float = |key: &str| get(key).and_then(|v| v.as_f64()).map(|v| v as f32);

        let width = unsigned(keys::WIDTH).map_or(0, |v| u32::try_from(v).unwrap_or(u32::MAX));
        let height = unsigned(keys::HEIGHT).map_or(0, |v| u32::try_from(v).unwrap_or(u32::MAX));
        let file_format = get(keys::FILE_FORMAT)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        let capture_time = match get(keys::CAPTURE_TIME) {
            Some(MetadataValue::Timestamp(t)) => Some(t),
            _ => None,
        };
        let histogram = match get(keys::HISTOGRAM) {
            Some(MetadataValue::Buckets(b)) => Some(b),
            _ => None,
        };
        let source = get(keys::PATH)
            .and_then(|v| v.as_str().map(PathBuf::from));

        Self {
            source,
            capture_time,
            iso: unsigned(keys::ISO).and_then(|v| u32::try_from(v).ok()),
            aperture: float(keys::APERTURE),
            focal_length: float(keys::FOCAL_LENGTH),
            file_size: unsigned(keys::FILE_SIZE).unwrap_or(0),
            histogram,
            saturation: float(keys::SATURATION),
            contrast: float(keys::CONTRAST),
            ..Self::new(id.clone(), width, height, file_format)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct MapCatalog(HashMap<&'static str, MetadataValue>);

    impl Catalog for MapCatalog {
        fn get_metadata(&self, _id: &ItemId, key: &str) -> Option<MetadataValue> {
            self.0.get(key).cloned()
        }

        fn set_metadata(&self, _id: &ItemId, _key: &str, _value: MetadataValue) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_from_catalog_reads_fields() {
        let catalog = MapCatalog(HashMap::from([
            (keys::WIDTH, MetadataValue::Integer(6000)),
            (keys::HEIGHT, MetadataValue::Number(4000.0)),
            (keys::FILE_FORMAT, MetadataValue::Text("NEF".into())),
            (keys::ISO, MetadataValue::Text("400".into())),
            (keys::APERTURE, MetadataValue::Number(2.8)),
            (keys::FOCAL_LENGTH, MetadataValue::Integer(85)),
            (keys::PATH, MetadataValue::Text("/photos/a.nef".into())),
        ]));

        let item = PhotoItem::from_catalog(&catalog, ItemId::new("a"));
        assert_eq!(item.width, 6000);
        assert_eq!(item.height, 4000);
        assert_eq!(item.file_format, "NEF");
        assert_eq!(item.iso, Some(400));
        assert_eq!(item.focal_length, Some(85.0));
        assert_eq!(item.source, Some(PathBuf::from("/photos/a.nef")));
        assert!(item.capture_time.is_none());
    }

    #[test]
    fn test_from_catalog_missing_fields() {
        let catalog = MapCatalog(HashMap::new());
        let item = PhotoItem::from_catalog(&catalog, ItemId::new("empty"));
        assert_eq!(item.width, 0);
        assert_eq!(item.file_format, "");
        assert!(item.histogram.is_none());
    }
}
