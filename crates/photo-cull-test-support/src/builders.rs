//! Photo item fixtures and synthetic image builders.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, Luma, RgbImage};
use photo_cull_core::domain::{ItemId, PhotoItem};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

/// Capture time of the first shot in generated fixtures.
pub const SHOOT_START: OffsetDateTime = datetime!(2024-06-01 14:00:00 UTC);

/// Fluent builder for [`PhotoItem`] fixtures.
///
/// Defaults to a 6000x4000 NEF with a well exposed histogram and a source
/// path derived from the id.
#[derive(Debug, Clone)]
pub struct PhotoItemBuilder {
    item: PhotoItem,
}

impl PhotoItemBuilder {
    /// Starts a builder for the given id.
    #[must_use]
    pub fn new(id: impl Into<ItemId>) -> Self {
        let id = id.into();
        let mut item = PhotoItem::new(id.clone(), 6000, 4000, "NEF");
        item.source = Some(PathBuf::from(format!("/shoot/{id}.nef")));
        item.file_size = 25_000_000;
        item.histogram = Some(flat_histogram());
        Self { item }
    }

    /// Sets the dimensions.
    #[must_use]
    pub const fn size(mut self, width: u32, height: u32) -> Self {
        self.item.width = width;
        self.item.height = height;
        self
    }

    /// Sets the file format.
    #[must_use]
    pub fn format(mut self, format: &str) -> Self {
        self.item.file_format = format.to_string();
        self
    }

    /// Sets the capture time.
    #[must_use]
    pub const fn captured_at(mut self, time: OffsetDateTime) -> Self {
        self.item.capture_time = Some(time);
        self
    }

    /// Sets the capture time relative to [`SHOOT_START`].
    #[must_use]
    pub fn captured_after_ms(self, offset_ms: i64) -> Self {
        self.captured_at(SHOOT_START + Duration::milliseconds(offset_ms))
    }

    /// Sets exposure settings.
    #[must_use]
    pub const fn exposure(mut self, iso: u32, aperture: f32, focal_length: f32) -> Self {
        self.item.iso = Some(iso);
        self.item.aperture = Some(aperture);
        self.item.focal_length = Some(focal_length);
        self
    }

    /// Sets the histogram.
    #[must_use]
    pub fn histogram(mut self, histogram: Vec<f32>) -> Self {
        self.item.histogram = Some(histogram);
        self
    }

    /// Removes the histogram.
    #[must_use]
    pub fn no_histogram(mut self) -> Self {
        self.item.histogram = None;
        self
    }

    /// Histogram with heavy shadow clipping.
    #[must_use]
    pub fn underexposed(self) -> Self {
        let mut histogram = vec![0.0; 256];
        histogram[0] = 1.5;
        histogram[128] = 1.5;
        self.histogram(histogram)
    }

    /// Sets the edit-settings saturation and contrast.
    #[must_use]
    pub const fn settings(mut self, saturation: f32, contrast: f32) -> Self {
        self.item.saturation = Some(saturation);
        self.item.contrast = Some(contrast);
        self
    }

    /// Sets the image source path.
    #[must_use]
    pub fn source(mut self, path: impl AsRef<Path>) -> Self {
        self.item.source = Some(path.as_ref().to_path_buf());
        self
    }

    /// Removes the image source path.
    #[must_use]
    pub fn no_source(mut self) -> Self {
        self.item.source = None;
        self
    }

    /// Builds the item.
    #[must_use]
    pub fn build(self) -> PhotoItem {
        self.item
    }
}

/// Evenly spread histogram (3 channels, no clipping).
#[must_use]
pub fn flat_histogram() -> Vec<f32> {
    vec![3.0 / 256.0; 256]
}

/// A burst of `count` shots `interval_ms` apart, starting `start_ms` after
/// [`SHOOT_START`].
#[must_use]
pub fn burst_series(prefix: &str, count: usize, start_ms: i64, interval_ms: i64) -> Vec<PhotoItem> {
    (0..count)
        .map(|i| {
            let offset = start_ms + interval_ms * i64::try_from(i).unwrap_or(i64::MAX / 2);
            PhotoItemBuilder::new(format!("{prefix}_{i:04}"))
                .captured_after_ms(offset)
                .exposure(400, 2.8, 85.0)
                .build()
        })
        .collect()
}

/// A mixed wedding shoot of `count` items.
///
/// Every fifth item starts a new scene two minutes after the previous one;
/// within a scene shots are two seconds apart, so scenes form bursts. Every
/// third item is underexposed and every seventh has strong edits.
#[must_use]
pub fn wedding_set(count: usize) -> Vec<PhotoItem> {
    (0..count)
        .map(|i| {
            let scene = i64::try_from(i / 5).unwrap_or(0);
            let shot = i64::try_from(i % 5).unwrap_or(0);
            let mut builder = PhotoItemBuilder::new(format!("WED_{i:04}"))
                .captured_after_ms(scene * 120_000 + shot * 2_000)
                .exposure(800, 1.8, if scene % 2 == 0 { 50.0 } else { 85.0 });
            if i % 3 == 0 {
                builder = builder.underexposed();
            }
            if i % 7 == 0 {
                builder = builder.settings(55.0, -60.0);
            }
            builder.build()
        })
        .collect()
}

/// Builder for synthetic images written to disk by adapter and CLI tests.
pub struct SyntheticImageBuilder;

impl SyntheticImageBuilder {
    /// High-contrast checkerboard (very sharp edges).
    #[must_use]
    pub fn checkerboard(width: u32, height: u32, cell_size: u32) -> DynamicImage {
        let cell = cell_size.max(1);
        let img = GrayImage::from_fn(width, height, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        DynamicImage::ImageLuma8(img)
    }

    /// Uniform gray image (no edges, simulates severe blur).
    #[must_use]
    pub fn uniform_gray(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value])))
    }

    /// Uniform color image.
    #[must_use]
    pub fn rgb_uniform(width: u32, height: u32, r: u8, g: u8, b: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([r, g, b])))
    }

    /// Saves `image` as `dir/name`, inferring the format from the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn save(image: &DynamicImage, dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
        let path = dir.join(name);
        image.save(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let item = PhotoItemBuilder::new("a").build();
        assert_eq!(item.width, 6000);
        assert!(item.has_supported_format());
        assert!(item.source.is_some());
    }

    #[test]
    fn test_burst_spacing() {
        let burst = burst_series("B", 3, 0, 200);
        assert_eq!(burst.len(), 3);
        let gap = burst[2].capture_time.zip(burst[0].capture_time).map(|(a, b)| a - b);
        assert_eq!(gap, Some(Duration::milliseconds(400)));
    }

    #[test]
    fn test_wedding_set_ids_unique() {
        let set = wedding_set(20);
        let mut ids: Vec<_> = set.iter().map(|i| i.id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }
}
