//! Phase 4: FINALIZING
//!
//! Computes the batch summary.

use tracing::info;

use super::run::{BatchRun, Halt};
use crate::domain::{BatchSummary, Phase};

impl BatchRun {
    pub(super) fn phase_finalizing(&self) -> Result<(), Halt> {
        self.checkpoint(Phase::Finalizing, 0, 1, "Computing summary")?;
        let summary = self.summary();
        info!(
            batch = self.id,
            total = summary.total,
            processed = summary.processed,
            passed = summary.passed,
            failed = summary.failed,
            grouped = summary.grouped,
            errors = summary.errors,
            "Batch summary"
        );
        self.checkpoint(Phase::Finalizing, 1, 1, "Done")
    }

    /// Summary of whatever results exist so far.
    pub(super) fn summary(&self) -> BatchSummary {
        let results = self.results.iter().flatten();
        BatchSummary {
            total: self.items.len(),
            processed: self.processed,
            passed: results.clone().filter(|r| r.passed).count(),
            failed: results.clone().filter(|r| !r.passed).count(),
            grouped: self.groups.iter().map(|g| g.len()).sum(),
            errors: results.filter(|r| r.error.is_some()).count(),
        }
    }
}
