//! AI assessor port for remote quality scoring.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{AiScore, BackendError, FaceDetection};

/// Blur measurement returned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlurMeasurement {
    /// Laplacian variance; higher is sharper.
    pub score: f32,
    /// Backend's own verdict.
    pub is_blurry: bool,
}

/// Port to the AI/CV scoring service.
///
/// Implementations are expected to return scores already normalized to
/// 0.0-1.0. Retries and timeouts are applied by the caller, so a single call
/// should make a single attempt.
#[async_trait]
pub trait QualityAssessor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Aesthetic and technical quality of an image.
    ///
    /// # Errors
    ///
    /// Returns a `BackendError` if the call fails.
    async fn assess_quality(&self, image: &Path) -> Result<AiScore, BackendError>;

    /// Faces found in an image.
    ///
    /// # Errors
    ///
    /// Returns a `BackendError` if the call fails.
    async fn detect_faces(&self, image: &Path) -> Result<Vec<FaceDetection>, BackendError>;

    /// Blur variance of an image.
    ///
    /// # Errors
    ///
    /// Returns a `BackendError` if the call fails.
    async fn detect_blur(&self, image: &Path) -> Result<BlurMeasurement, BackendError>;

    /// Visual similarity of two images (0.0 to 1.0).
    ///
    /// # Errors
    ///
    /// Returns a `BackendError` if the call fails.
    async fn compare_similarity(&self, a: &Path, b: &Path) -> Result<f32, BackendError>;
}
