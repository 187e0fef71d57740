//! Offline assessor that measures blur from the decoded image.

use std::path::Path;

use async_trait::async_trait;
use image::GrayImage;
use photo_cull_core::{AiScore, BackendError, BlurMeasurement, FaceDetection, QualityAssessor};
use tracing::debug;

/// Variance below which an image is reported blurry.
pub const DEFAULT_LOCAL_BLUR_THRESHOLD: f32 = 100.0;

/// Longest edge the image is downscaled to before measuring.
const ANALYSIS_EDGE: u32 = 1024;

/// Assessor that needs no network service.
///
/// Only blur is measured, as the variance of the 3x3 Laplacian over the
/// grayscale image. Quality, faces and similarity report `Unavailable`, so
/// scoring falls back to technical signals and composition.
#[derive(Debug, Clone)]
pub struct LocalAssessor {
    blur_threshold: f32,
}

impl LocalAssessor {
    /// Creates an assessor with the default blur threshold.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            blur_threshold: DEFAULT_LOCAL_BLUR_THRESHOLD,
        }
    }

    /// Overrides the threshold used for `is_blurry`.
    #[must_use]
    pub const fn with_blur_threshold(mut self, threshold: f32) -> Self {
        self.blur_threshold = threshold;
        self
    }
}

impl Default for LocalAssessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QualityAssessor for LocalAssessor {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn assess_quality(&self, _image: &Path) -> Result<AiScore, BackendError> {
        Err(BackendError::Unavailable("quality assessment"))
    }

    async fn detect_faces(&self, _image: &Path) -> Result<Vec<FaceDetection>, BackendError> {
        Err(BackendError::Unavailable("face detection"))
    }

    async fn detect_blur(&self, image: &Path) -> Result<BlurMeasurement, BackendError> {
        let path = image.to_path_buf();
        let variance = tokio::task::spawn_blocking(move || measure_blur(&path))
            .await
            .map_err(|e| {
                debug!("blur task failed: {e}");
                BackendError::Unavailable("blur measurement")
            })??;

        debug!(image = %image.display(), variance, "measured blur");
        Ok(BlurMeasurement {
            score: variance,
            is_blurry: variance < self.blur_threshold,
        })
    }

    async fn compare_similarity(&self, _a: &Path, _b: &Path) -> Result<f32, BackendError> {
        Err(BackendError::Unavailable("similarity"))
    }
}

fn measure_blur(path: &Path) -> Result<f32, BackendError> {
    // RAW and HEIC files are not decodable here; scoring proceeds without blur.
    let image = image::open(path).map_err(|e| {
        debug!("cannot decode {} for blur: {e}", path.display());
        BackendError::Unavailable("blur measurement")
    })?;
    let gray = if image.width() > ANALYSIS_EDGE || image.height() > ANALYSIS_EDGE {
        image.thumbnail(ANALYSIS_EDGE, ANALYSIS_EDGE).to_luma8()
    } else {
        image.to_luma8()
    };
    Ok(laplacian_variance(&gray))
}

/// Variance of the 3x3 Laplacian response.
///
/// Sharp images have strong edges and a high variance; images smaller than
/// 3x3 yield 0.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
#[must_use]
pub fn laplacian_variance(image: &GrayImage) -> f32 {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let at = |x: u32, y: u32| f64::from(image.get_pixel(x, y)[0]);
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut count = 0_u64;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let response =
                at(x, y - 1) + at(x, y + 1) + at(x - 1, y) + at(x + 1, y) - 4.0 * at(x, y);
            sum += response;
            sum_sq += response * response;
            count += 1;
        }
    }

    let n = count as f64;
    let mean = sum / n;
    ((sum_sq / n) - mean * mean).max(0.0) as f32
}
