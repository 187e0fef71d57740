//! State owned by one running batch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::domain::{BatchOptions, BatchState, CullError, Group, Phase, PhotoItem, ScoreResult};
use crate::ports::{Catalog, ProgressCallback, ProgressUpdate};
use crate::scoring::Scorer;

use super::BatchResults;

/// Why a phase stopped early.
#[derive(Debug)]
pub(super) enum Halt {
    /// Token cancelled or the progress callback asked to stop.
    Cancelled,
    /// Structural fault; the batch ends in `Error`.
    Fault(CullError),
}

impl From<CullError> for Halt {
    fn from(err: CullError) -> Self {
        Self::Fault(err)
    }
}

/// A batch in flight. Owned exclusively by its task.
pub(super) struct BatchRun {
    pub(super) id: u64,
    pub(super) items: Vec<PhotoItem>,
    pub(super) options: BatchOptions,
    pub(super) scorer: Arc<Scorer>,
    pub(super) catalog: Option<Arc<dyn Catalog>>,
    pub(super) progress: Arc<dyn ProgressCallback>,
    pub(super) token: CancellationToken,
    pub(super) chunk_pause: Duration,
    /// One slot per input item, filled as results become available.
    pub(super) results: Vec<Option<ScoreResult>>,
    /// Items that went through the processing phase.
    pub(super) processed: usize,
    pub(super) groups: Vec<Group>,
}

impl BatchRun {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        id: u64,
        items: Vec<PhotoItem>,
        options: BatchOptions,
        scorer: Arc<Scorer>,
        catalog: Option<Arc<dyn Catalog>>,
        progress: Arc<dyn ProgressCallback>,
        token: CancellationToken,
        chunk_pause: Duration,
    ) -> Self {
        let results = vec![None; items.len()];
        Self {
            id,
            items,
            options,
            scorer,
            catalog,
            progress,
            token,
            chunk_pause,
            results,
            processed: 0,
            groups: Vec::new(),
        }
    }

    /// Runs every phase and returns the results with the terminal state.
    ///
    /// Intermediate states are published on `state`; the terminal state is
    /// left to the caller so it can store the results first.
    pub(super) async fn execute(mut self, state: &watch::Sender<BatchState>) -> BatchResults {
        let mut terminal = BatchState::Completed;

        for phase in Phase::ALL {
            state.send_replace(phase.into());
            info!(batch = self.id, %phase, "Entering phase");

            let outcome = match phase {
                Phase::Preparing => self.phase_preparing(),
                Phase::Processing => self.phase_processing().await,
                Phase::Grouping => self.phase_grouping().await,
                Phase::Finalizing => self.phase_finalizing(),
            };

            match outcome {
                Ok(()) => {}
                Err(Halt::Cancelled) => {
                    info!(batch = self.id, %phase, processed = self.processed, "Batch cancelled");
                    terminal = BatchState::Cancelled;
                    break;
                }
                Err(Halt::Fault(err)) => {
                    error!(batch = self.id, %phase, error = %err, "Batch failed");
                    terminal = BatchState::Error;
                    break;
                }
            }
        }

        self.into_results(terminal)
    }

    /// Checks the token, then reports progress. Either may stop the phase.
    pub(super) fn checkpoint(
        &self,
        phase: Phase,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Result<(), Halt> {
        self.check_cancelled()?;
        let update = ProgressUpdate::new(phase, current, total, message);
        if self.progress.on_progress(&update) {
            Ok(())
        } else {
            info!(batch = self.id, %phase, current, total, "Progress callback requested stop");
            self.token.cancel();
            Err(Halt::Cancelled)
        }
    }

    /// Checks the token only.
    pub(super) fn check_cancelled(&self) -> Result<(), Halt> {
        if self.token.is_cancelled() {
            Err(Halt::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Indices of items that passed preparation.
    pub(super) fn valid_indices(&self) -> Vec<usize> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| match r {
                Some(r) if !r.valid => None,
                _ => Some(i),
            })
            .collect()
    }

    fn into_results(self, state: BatchState) -> BatchResults {
        let summary = self.summary();
        BatchResults {
            state,
            results: self.results.into_iter().flatten().collect(),
            groups: self.groups,
            summary,
        }
    }
}
