//! Metadata-based near-duplicate grouping.
//!
//! Greedy and input-order dependent: each item that is not yet grouped opens
//! a candidate group and absorbs every later ungrouped item whose similarity
//! to it exceeds the threshold. Candidate groups with fewer than two members
//! are discarded.

use crate::domain::{Group, ItemId, PhotoItem};

/// Similarity for captures less than five seconds apart.
const BURST_SIMILARITY: f32 = 0.9;
/// Similarity for captures less than thirty seconds apart.
const SEQUENCE_SIMILARITY: f32 = 0.7;
/// Similarity for matching focal length and aperture.
const SETTINGS_SIMILARITY: f32 = 0.6;
/// Similarity when nothing matches.
const BASE_SIMILARITY: f32 = 0.3;

const BURST_WINDOW_SECS: f64 = 5.0;
const SEQUENCE_WINDOW_SECS: f64 = 30.0;

/// An item offered to the grouper together with its overall score.
#[derive(Debug, Clone, Copy)]
pub struct GroupCandidate<'a> {
    /// Item metadata.
    pub item: &'a PhotoItem,
    /// Overall score, used to pick the group's best member.
    pub overall: f32,
}

/// Result of a grouping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingOutcome {
    /// Groups kept, in creation order.
    pub groups: Vec<Group>,
    /// True if the pass was stopped before every item was visited.
    pub stopped: bool,
}

/// Clusters near-duplicate photos by capture metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityGrouper;

impl SimilarityGrouper {
    /// Heuristic similarity of two items (0.0 to 1.0).
    ///
    /// Capture-time proximity wins when both times are known; otherwise
    /// identical focal length and aperture count as a weaker match.
    #[must_use]
    pub fn similarity(a: &PhotoItem, b: &PhotoItem) -> f32 {
        if let (Some(ta), Some(tb)) = (a.capture_time, b.capture_time) {
            let gap = (ta - tb).abs().as_seconds_f64();
            if gap < BURST_WINDOW_SECS {
                return BURST_SIMILARITY;
            }
            if gap < SEQUENCE_WINDOW_SECS {
                return SEQUENCE_SIMILARITY;
            }
        }

        let same_focal = matches!((a.focal_length, b.focal_length), (Some(x), Some(y)) if same(x, y));
        let same_aperture = matches!((a.aperture, b.aperture), (Some(x), Some(y)) if same(x, y));
        if same_focal && same_aperture {
            SETTINGS_SIMILARITY
        } else {
            BASE_SIMILARITY
        }
    }

    /// Groups candidates whose similarity strictly exceeds `threshold`.
    #[must_use]
    pub fn group(candidates: &[GroupCandidate<'_>], threshold: f32) -> Vec<Group> {
        Self::group_until(candidates, threshold, |_, _| true).groups
    }

    /// Like [`SimilarityGrouper::group`], asking `should_continue(done, total)`
    /// before each anchor item. Returning `false` stops the pass and keeps the
    /// groups formed so far.
    pub fn group_until<F>(
        candidates: &[GroupCandidate<'_>],
        threshold: f32,
        mut should_continue: F,
    ) -> GroupingOutcome
    where
        F: FnMut(usize, usize) -> bool,
    {
        let total = candidates.len();
        let mut processed = vec![false; total];
        let mut outcome = GroupingOutcome::default();

        for (i, anchor) in candidates.iter().enumerate() {
            if !should_continue(i, total) {
                outcome.stopped = true;
                break;
            }
            if processed[i] {
                continue;
            }
            processed[i] = true;

            let mut members = vec![i];
            for (j, other) in candidates.iter().enumerate().skip(i + 1) {
                if processed[j] {
                    continue;
                }
                if Self::similarity(anchor.item, other.item) > threshold {
                    members.push(j);
                    processed[j] = true;
                }
            }

            if members.len() >= 2 {
                let id = format!("group-{}", outcome.groups.len() + 1);
                outcome.groups.push(build_group(id, candidates, &members));
            }
        }

        outcome
    }
}

/// Builds a group from candidate indices; the best member is the first one
/// with the highest overall score.
pub(crate) fn build_group(id: String, candidates: &[GroupCandidate<'_>], members: &[usize]) -> Group {
    let mut best = members[0];
    for &m in &members[1..] {
        if candidates[m].overall > candidates[best].overall {
            best = m;
        }
    }
    Group {
        id,
        members: members
            .iter()
            .map(|&m| candidates[m].item.id.clone())
            .collect::<Vec<ItemId>>(),
        best: candidates[best].item.id.clone(),
    }
}

fn same(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}
