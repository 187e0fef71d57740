//! Aspect-ratio composition proxy.

use crate::domain::CompositionScore;

/// Target ratios: golden ratio, 3:2, 4:3, 1:1.
const TARGET_RATIOS: [f32; 4] = [1.618, 1.5, 4.0 / 3.0, 1.0];

/// Scores how close the image's aspect ratio is to a classic print ratio.
///
/// The ratio is taken as long side over short side, so orientation does not
/// matter. Degenerate dimensions score zero.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn composition_score(width: u32, height: u32) -> CompositionScore {
    if width == 0 || height == 0 {
        return CompositionScore { overall: 0.0 };
    }
    let (long, short) = if width >= height {
        (width, height)
    } else {
        (height, width)
    };
    let ratio = long as f32 / short as f32;
    let distance = TARGET_RATIOS
        .iter()
        .map(|target| (ratio - target).abs())
        .fold(f32::INFINITY, f32::min);

    CompositionScore {
        overall: 2.0f32.mul_add(-distance, 1.0).clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_ratios_score_full() {
        assert!((composition_score(6000, 4000).overall - 1.0).abs() < 1e-6);
        assert!((composition_score(4000, 3000).overall - 1.0).abs() < 1e-5);
        assert!((composition_score(1000, 1000).overall - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orientation_independent() {
        assert_eq!(composition_score(4000, 6000), composition_score(6000, 4000));
    }

    #[test]
    fn test_panorama_scores_zero() {
        assert!(composition_score(9000, 2000).overall.abs() < f32::EPSILON);
    }

    #[test]
    fn test_degenerate_dimensions() {
        assert!(composition_score(0, 100).overall.abs() < f32::EPSILON);
    }

    #[test]
    fn test_in_between_ratio() {
        // 16:9 is 0.1598 away from the golden ratio.
        let score = composition_score(1920, 1080).overall;
        assert!(score > 0.6 && score < 0.7, "score = {score}");
    }
}
