//! Deterministic technical quality signals.
//!
//! Blur comes from a variance measurement supplied by the assessor; exposure
//! is read from the catalog histogram; saturation and contrast come from the
//! item's edit settings.

use crate::domain::{PhotoItem, TechnicalScore};
use crate::ports::BlurMeasurement;

/// Images smaller than this on either side fail the validity gate.
pub const MIN_DIMENSION: u32 = 100;

/// Configuration for technical evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct TechnicalConfig {
    /// Blur variance at or above which an image counts as sharp.
    pub blur_threshold: f32,
    /// Number of darkest buckets checked for shadow clipping.
    pub shadow_buckets: usize,
    /// Number of brightest buckets checked for highlight clipping.
    pub highlight_buckets: usize,
    /// Clipped fraction above which a side counts as clipped (5% x 3 channels).
    pub clip_fraction: f32,
    /// Saturation magnitude considered neutral.
    pub saturation_optimal: f32,
    /// Contrast magnitude considered neutral.
    pub contrast_optimal: f32,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            blur_threshold: 100.0,
            shadow_buckets: 20,
            highlight_buckets: 21,
            clip_fraction: 0.15,
            saturation_optimal: 20.0,
            contrast_optimal: 25.0,
        }
    }
}

/// Computes [`TechnicalScore`]s.
#[derive(Debug, Clone, Default)]
pub struct TechnicalEvaluator {
    config: TechnicalConfig,
}

impl TechnicalEvaluator {
    const BLUR_WEIGHT: f32 = 0.35;
    const EXPOSURE_WEIGHT: f32 = 0.35;
    const SATURATION_WEIGHT: f32 = 0.15;
    const CONTRAST_WEIGHT: f32 = 0.15;

    /// Creates an evaluator with the given configuration.
    #[must_use]
    pub const fn new(config: TechnicalConfig) -> Self {
        Self { config }
    }

    /// Creates an evaluator with default settings and a custom blur threshold.
    #[must_use]
    pub fn with_blur_threshold(blur_threshold: f32) -> Self {
        Self::new(TechnicalConfig {
            blur_threshold,
            ..TechnicalConfig::default()
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &TechnicalConfig {
        &self.config
    }

    /// Returns true if the item is large enough to be scored at all.
    #[must_use]
    pub const fn passes_gate(item: &PhotoItem) -> bool {
        item.width >= MIN_DIMENSION && item.height >= MIN_DIMENSION
    }

    /// Evaluates an item.
    ///
    /// `blur` is `None` when no measurement could be obtained, which yields a
    /// neutral blur signal of 0.5. Items failing the validity gate score zero
    /// on every signal.
    #[must_use]
    pub fn evaluate(&self, item: &PhotoItem, blur: Option<&BlurMeasurement>) -> TechnicalScore {
        if !Self::passes_gate(item) {
            return TechnicalScore::REJECTED;
        }

        let blur = blur.map_or(0.5, |m| self.blur_signal(m));
        let exposure = item
            .histogram
            .as_deref()
            .map_or(1.0, |h| self.exposure_signal(h));
        let saturation = setting_signal(item.saturation.unwrap_or(0.0), self.config.saturation_optimal);
        let contrast = setting_signal(item.contrast.unwrap_or(0.0), self.config.contrast_optimal);

        let overall = Self::BLUR_WEIGHT * blur
            + Self::EXPOSURE_WEIGHT * exposure
            + Self::SATURATION_WEIGHT * saturation
            + Self::CONTRAST_WEIGHT * contrast;

        TechnicalScore {
            blur,
            exposure,
            saturation,
            contrast,
            overall: overall.clamp(0.0, 1.0),
        }
    }

    /// 1.0 for a sharp image, 0.0 for a blurry one.
    #[must_use]
    pub fn blur_signal(&self, measurement: &BlurMeasurement) -> f32 {
        if measurement.score >= self.config.blur_threshold {
            1.0
        } else {
            0.0
        }
    }

    /// Exposure signal from histogram clipping.
    ///
    /// 1.0 with no clipping, 0.7 with one clipped side, 0.3 with both.
    #[must_use]
    pub fn exposure_signal(&self, histogram: &[f32]) -> f32 {
        let len = histogram.len();
        let shadows: f32 = histogram[..self.config.shadow_buckets.min(len)].iter().sum();
        let highlights: f32 = histogram[len.saturating_sub(self.config.highlight_buckets)..]
            .iter()
            .sum();

        let under = shadows > self.config.clip_fraction;
        let over = highlights > self.config.clip_fraction;
        match (under, over) {
            (true, true) => 0.3,
            (true, false) | (false, true) => 0.7,
            (false, false) => 1.0,
        }
    }
}

/// Signal for an edit-settings slider: neutral values score highest.
fn setting_signal(value: f32, optimal: f32) -> f32 {
    let magnitude = value.abs();
    if magnitude <= optimal {
        1.0
    } else if magnitude <= 2.0 * optimal {
        0.7
    } else {
        0.4
    }
}
