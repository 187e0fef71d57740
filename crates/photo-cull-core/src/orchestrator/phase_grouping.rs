//! Phase 3: GROUPING
//!
//! Clusters scored items by capture metadata, optionally confirms each group
//! with the backend's visual similarity, and marks the best member.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::run::{BatchRun, Halt};
use crate::domain::{Group, ItemId, Phase};
use crate::grouping::{build_group, GroupCandidate, SimilarityGrouper};

impl BatchRun {
    pub(super) async fn phase_grouping(&mut self) -> Result<(), Halt> {
        if !self.options.enable_grouping {
            return self.checkpoint(Phase::Grouping, 0, 0, "Grouping disabled");
        }

        let eligible: Vec<usize> = self
            .results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().filter(|r| r.is_scored()).map(|_| i))
            .collect();
        let total = eligible.len();
        self.checkpoint(Phase::Grouping, 0, total, format!("Grouping {total} items"))?;

        let (groups, stopped) = {
            let candidates: Vec<GroupCandidate<'_>> = eligible
                .iter()
                .map(|&i| GroupCandidate {
                    item: &self.items[i],
                    overall: self.results[i].as_ref().map_or(0.0, |r| r.overall),
                })
                .collect();

            let outcome = SimilarityGrouper::group_until(
                &candidates,
                self.options.similarity_threshold,
                |done, total| {
                    let message = format!("Compared {done}/{total}");
                    self.checkpoint(Phase::Grouping, done, total, message).is_ok()
                },
            );

            if outcome.stopped || !self.options.visual_check {
                (outcome.groups, outcome.stopped)
            } else {
                self.confirm_visually(outcome.groups, &candidates).await
            }
        };

        self.apply_groups(&eligible, groups);
        if stopped {
            return Err(Halt::Cancelled);
        }

        let grouped: usize = self.groups.iter().map(Group::len).sum();
        info!(batch = self.id, groups = self.groups.len(), grouped, "Grouping done");
        self.checkpoint(
            Phase::Grouping,
            total,
            total,
            format!("{} groups", self.groups.len()),
        )
    }

    /// Keeps only members whose visual similarity to the group's first
    /// member reaches the threshold. Groups left with fewer than two members
    /// are dropped and the rest renumbered.
    ///
    /// Returns the confirmed groups and whether the pass was stopped. A
    /// stopped pass keeps the groups confirmed before the stop.
    async fn confirm_visually(
        &self,
        groups: Vec<Group>,
        candidates: &[GroupCandidate<'_>],
    ) -> (Vec<Group>, bool) {
        let position: HashMap<&ItemId, usize> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (&c.item.id, i))
            .collect();
        let threshold = self.options.similarity_threshold;
        let comparisons: usize = groups.iter().map(|g| g.len().saturating_sub(1)).sum();
        let mut compared = 0;
        let mut kept = Vec::with_capacity(groups.len());

        for group in groups {
            let indices: Vec<usize> = group
                .members
                .iter()
                .filter_map(|id| position.get(id).copied())
                .collect();
            let Some((&anchor, rest)) = indices.split_first() else {
                continue;
            };
            let Some(anchor_path) = candidates[anchor].item.source.as_deref() else {
                debug!(batch = self.id, group = %group.id, "Anchor has no image source");
                continue;
            };

            let mut members = vec![anchor];
            for &index in rest {
                let message = format!("Confirmed {compared}/{comparisons}");
                if self
                    .checkpoint(Phase::Grouping, compared, comparisons, message)
                    .is_err()
                {
                    return (kept, true);
                }
                compared += 1;

                let item = candidates[index].item;
                let Some(path) = item.source.as_deref() else {
                    continue;
                };
                match self.scorer.compare(anchor_path, path).await {
                    Ok(score) if score >= threshold => members.push(index),
                    Ok(score) => {
                        debug!(batch = self.id, item = %item.id, score, "Not visually similar");
                    }
                    Err(err) => {
                        warn!(batch = self.id, item = %item.id, error = %err, "Similarity check failed");
                    }
                }
            }

            if members.len() >= 2 {
                let id = format!("group-{}", kept.len() + 1);
                kept.push(build_group(id, candidates, &members));
            }
        }

        (kept, false)
    }

    fn apply_groups(&mut self, eligible: &[usize], groups: Vec<Group>) {
        let index_of: HashMap<ItemId, usize> = eligible
            .iter()
            .map(|&i| (self.items[i].id.clone(), i))
            .collect();

        for group in &groups {
            for member in &group.members {
                let Some(result) = index_of
                    .get(member)
                    .and_then(|&i| self.results[i].as_mut())
                else {
                    continue;
                };
                result.group_id = Some(group.id.clone());
                result.is_group_best = *member == group.best;
            }
        }

        self.groups = groups;
    }
}
