//! Blends technical, aesthetic and face signals into one verdict.

use serde::{Deserialize, Serialize};

use crate::domain::{AiScore, CompositionScore, FaceSummary, TechnicalScore};

/// Multiplier applied when any detected face was rated poor.
pub const FACE_PENALTY: f32 = 0.9;

/// Relative weights of the technical and aesthetic components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Technical weight.
    pub technical: f32,
    /// Aesthetic weight.
    pub aesthetic: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            technical: 0.5,
            aesthetic: 0.5,
        }
    }
}

impl ScoreWeights {
    /// Creates weights from raw (not necessarily normalized) values.
    #[must_use]
    pub const fn new(technical: f32, aesthetic: f32) -> Self {
        Self {
            technical,
            aesthetic,
        }
    }

    /// Returns the weights scaled to sum to one.
    ///
    /// Falls back to an even split if the sum is not a positive number.
    #[must_use]
    pub fn normalized(self) -> Self {
        let sum = self.technical + self.aesthetic;
        if !sum.is_finite() || sum <= 0.0 {
            return Self::default();
        }
        Self {
            technical: self.technical / sum,
            aesthetic: self.aesthetic / sum,
        }
    }
}

/// Final score and pass/fail decision for one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    /// Blended score (0.0 to 1.0).
    pub overall: f32,
    /// `overall >= threshold`.
    pub passed: bool,
}

/// Combines the component scores.
///
/// The aesthetic component is the AI overall score when present, otherwise
/// the composition proxy.
#[must_use]
pub fn aggregate(
    technical: &TechnicalScore,
    ai: Option<&AiScore>,
    composition: &CompositionScore,
    faces: Option<&FaceSummary>,
    weights: ScoreWeights,
    threshold: f32,
) -> Verdict {
    let weights = weights.normalized();
    let aesthetic = ai.map_or(composition.overall, |ai| ai.overall);

    let mut overall = technical.overall * weights.technical + aesthetic * weights.aesthetic;
    if faces.is_some_and(|f| f.has_issues) {
        overall *= FACE_PENALTY;
    }
    let overall = if overall.is_nan() {
        0.0
    } else {
        overall.clamp(0.0, 1.0)
    };

    Verdict {
        overall,
        passed: overall >= threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn technical(overall: f32) -> TechnicalScore {
        TechnicalScore {
            blur: 1.0,
            exposure: 1.0,
            saturation: 1.0,
            contrast: 1.0,
            overall,
        }
    }

    fn ai(overall: f32) -> AiScore {
        AiScore {
            aesthetic: overall,
            technical: overall,
            overall,
        }
    }

    #[test]
    fn test_normalized_weights_sum_to_one() {
        for (t, a) in [(0.3, 0.7), (1.0, 1.0), (2.0, 6.0), (0.01, 5.0)] {
            let w = ScoreWeights::new(t, a).normalized();
            assert!((w.technical + w.aesthetic - 1.0).abs() < 1e-6);
        }
        let w = ScoreWeights::new(0.0, 0.0).normalized();
        assert_eq!(w, ScoreWeights::default());
    }

    #[test]
    fn test_ai_preferred_over_composition() {
        let verdict = aggregate(
            &technical(0.8),
            Some(&ai(0.6)),
            &CompositionScore { overall: 0.0 },
            None,
            ScoreWeights::new(0.3, 0.7),
            0.6,
        );
        assert!((verdict.overall - 0.66).abs() < 1e-6);
        assert!(verdict.passed);
    }

    #[test]
    fn test_composition_fallback() {
        let verdict = aggregate(
            &technical(1.0),
            None,
            &CompositionScore { overall: 0.5 },
            None,
            ScoreWeights::default(),
            0.8,
        );
        assert!((verdict.overall - 0.75).abs() < 1e-6);
        assert!(!verdict.passed);
    }

    #[test]
    fn test_face_penalty() {
        let faces = FaceSummary {
            count: 2,
            quality: 0.6,
            has_issues: true,
        };
        let verdict = aggregate(
            &technical(1.0),
            Some(&ai(1.0)),
            &CompositionScore { overall: 1.0 },
            Some(&faces),
            ScoreWeights::default(),
            0.95,
        );
        assert!((verdict.overall - 0.9).abs() < 1e-6);
        assert!(!verdict.passed);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let verdict = aggregate(
            &technical(0.5),
            Some(&ai(0.5)),
            &CompositionScore { overall: 0.5 },
            None,
            ScoreWeights::default(),
            0.5,
        );
        assert!(verdict.passed);
    }

    #[test]
    fn test_overall_clamped() {
        let verdict = aggregate(
            &technical(1.5),
            Some(&ai(2.0)),
            &CompositionScore { overall: 1.0 },
            None,
            ScoreWeights::default(),
            0.5,
        );
        assert!((verdict.overall - 1.0).abs() < f32::EPSILON);
    }
}
