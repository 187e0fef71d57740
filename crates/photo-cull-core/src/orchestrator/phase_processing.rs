//! Phase 2: PROCESSING
//!
//! Scores valid items in chunks, reporting progress before each item.
//! Writes ratings and labels back to the catalog for passed items, and
//! pauses between chunks.

use tracing::{debug, warn};

use super::run::{BatchRun, Halt};
use crate::domain::{Phase, ScoreResult};
use crate::ports::{keys, MetadataValue};
use crate::scoring::ScorerConfig;

impl BatchRun {
    pub(super) async fn phase_processing(&mut self) -> Result<(), Halt> {
        let valid = self.valid_indices();
        let total = valid.len();
        let config = ScorerConfig::from(&self.options);
        let force = self.options.force;

        self.checkpoint(Phase::Processing, 0, total, format!("Scoring {total} items"))?;

        let chunks: Vec<Vec<usize>> = valid
            .chunks(self.options.batch_size)
            .map(<[usize]>::to_vec)
            .collect();
        let chunk_count = chunks.len();

        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            for index in chunk {
                self.checkpoint(
                    Phase::Processing,
                    self.processed,
                    total,
                    format!("Scoring {}", self.items[index].id),
                )?;

                let mut result = self.scorer.score_with(&self.items[index], &config, force).await;
                if result.passed {
                    self.write_back(&mut result);
                }
                self.results[index] = Some(result);
                self.processed += 1;
            }

            debug!(
                batch = self.id,
                chunk = chunk_index + 1,
                chunk_count,
                processed = self.processed,
                "Chunk done"
            );

            if chunk_index + 1 < chunk_count {
                self.pause().await;
            }
        }

        self.checkpoint(
            Phase::Processing,
            self.processed,
            total,
            format!("Scored {}/{total}", self.processed),
        )
    }

    /// Applies `auto_rate` / `auto_label` through the catalog. Failures are
    /// recorded as warnings on the result.
    fn write_back(&self, result: &mut ScoreResult) {
        let Some(catalog) = self.catalog.as_ref() else {
            return;
        };

        let mut writes = Vec::with_capacity(2);
        if self.options.auto_rate {
            writes.push((keys::RATING, MetadataValue::Integer(star_rating(result.overall))));
        }
        if self.options.auto_label {
            writes.push((keys::LABEL, MetadataValue::Text(self.options.passed_label.clone())));
        }

        for (key, value) in writes {
            if let Err(err) = catalog.set_metadata(&result.item_id, key, value) {
                warn!(batch = self.id, item = %result.item_id, key, error = %err, "Catalog write failed");
                result.warnings.push(format!("failed to write {key}: {err:#}"));
            }
        }
    }

    async fn pause(&self) {
        if self.chunk_pause.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                () = tokio::time::sleep(self.chunk_pause) => {}
                () = self.token.cancelled() => {}
            }
        }
    }
}

/// Star rating (0-5) for an overall score.
#[allow(clippy::cast_possible_truncation)]
pub(super) fn star_rating(overall: f32) -> i64 {
    (overall.clamp(0.0, 1.0) * 5.0).round() as i64
}
