//! Score types produced by the scoring pipeline.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::ItemId;

/// Deterministic technical quality signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalScore {
    /// Blur signal (1.0 sharp, 0.0 blurry, 0.5 unmeasured).
    pub blur: f32,
    /// Exposure signal from histogram clipping.
    pub exposure: f32,
    /// Saturation signal from the edit settings.
    pub saturation: f32,
    /// Contrast signal from the edit settings.
    pub contrast: f32,
    /// Weighted technical score (0.0 to 1.0).
    pub overall: f32,
}

impl TechnicalScore {
    /// Score given to items that fail the validity gate.
    pub const REJECTED: Self = Self {
        blur: 0.0,
        exposure: 0.0,
        saturation: 0.0,
        contrast: 0.0,
        overall: 0.0,
    };
}

/// Scores returned by the AI backend, normalized to 0.0-1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AiScore {
    /// Aesthetic quality.
    pub aesthetic: f32,
    /// Technical quality as judged by the model.
    pub technical: f32,
    /// Combined model score.
    pub overall: f32,
}

/// Cheap aesthetic proxy used when no AI score is available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositionScore {
    /// Composition score (0.0 to 1.0).
    pub overall: f32,
}

/// Bounding box in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

/// Per-face quality rating from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceQuality {
    /// Sharp, well lit, eyes open.
    Good,
    /// Acceptable.
    Medium,
    /// Blurred, eyes closed or badly lit.
    Poor,
}

impl FaceQuality {
    /// Numeric weight used when averaging face quality.
    #[must_use]
    pub const fn weight(self) -> f32 {
        match self {
            Self::Good => 1.0,
            Self::Medium => 0.6,
            Self::Poor => 0.2,
        }
    }
}

/// A single detected face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    /// Face location.
    pub bbox: BoundingBox,
    /// Detection confidence (0.0 to 1.0).
    pub confidence: f32,
    /// Quality rating.
    pub quality: FaceQuality,
}

/// Summary of all faces found in an image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceSummary {
    /// Number of faces.
    pub count: usize,
    /// Mean face quality (1.0 when there are no faces).
    pub quality: f32,
    /// True if any face was rated poor.
    pub has_issues: bool,
}

impl FaceSummary {
    /// Summarizes a list of detections.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_detections(faces: &[FaceDetection]) -> Self {
        if faces.is_empty() {
            return Self {
                count: 0,
                quality: 1.0,
                has_issues: false,
            };
        }
        let total: f32 = faces.iter().map(|f| f.quality.weight()).sum();
        Self {
            count: faces.len(),
            quality: total / faces.len() as f32,
            has_issues: faces.iter().any(|f| f.quality == FaceQuality::Poor),
        }
    }
}

/// Complete scoring outcome for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Item the result belongs to.
    pub item_id: ItemId,
    /// False when the item was rejected before scoring.
    pub valid: bool,
    /// Per-item error, if scoring could not be completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Technical signals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical: Option<TechnicalScore>,
    /// AI scores, absent when the backend was unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai: Option<AiScore>,
    /// Composition fallback score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composition: Option<CompositionScore>,
    /// Face summary, absent when detection was unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faces: Option<FaceSummary>,
    /// Blended score (0.0 to 1.0).
    pub overall: f32,
    /// Whether `overall` reached the pass threshold.
    pub passed: bool,
    /// When the result was computed.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Similarity group this item belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// True for the representative of its group.
    pub is_group_best: bool,
    /// Non-fatal degradation notes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ScoreResult {
    /// Placeholder for an item rejected during preparation.
    #[must_use]
    pub fn invalid(item_id: ItemId, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            ..Self::failed(item_id, error)
        }
    }

    /// Result for a valid item whose scoring failed.
    #[must_use]
    pub fn failed(item_id: ItemId, error: impl Into<String>) -> Self {
        Self {
            item_id,
            valid: true,
            error: Some(error.into()),
            technical: None,
            ai: None,
            composition: None,
            faces: None,
            overall: 0.0,
            passed: false,
            timestamp: OffsetDateTime::now_utc(),
            group_id: None,
            is_group_best: false,
            warnings: Vec::new(),
        }
    }

    /// True for valid results that were scored without error.
    #[must_use]
    pub const fn is_scored(&self) -> bool {
        self.valid && self.error.is_none()
    }

    /// Aesthetic component that went into `overall`.
    #[must_use]
    pub fn aesthetic(&self) -> Option<f32> {
        self.ai
            .map(|ai| ai.overall)
            .or_else(|| self.composition.map(|c| c.overall))
    }
}
