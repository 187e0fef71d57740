//! Batch orchestrator.
//!
//! Drives one batch at a time through four phases (preparing, processing,
//! grouping, finalizing) on a spawned tokio task. The caller holds a
//! [`BatchHandle`] to observe state, cancel, and collect results.

mod phase_finalizing;
mod phase_grouping;
mod phase_preparing;
mod phase_processing;
mod run;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{
    BatchOptions, BatchState, BatchSummary, CullError, Group, ItemId, PhotoItem, PreconditionError,
    ScoreResult,
};
use crate::ports::{Catalog, ProgressCallback};
use crate::scoring::Scorer;

use run::BatchRun;

/// Default pause between processing chunks.
pub const DEFAULT_CHUNK_PAUSE: Duration = Duration::from_millis(10);

/// Orchestrator-level settings that are not per-batch options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Cooperative pause between processing chunks; zero only yields.
    pub chunk_pause: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chunk_pause: DEFAULT_CHUNK_PAUSE,
        }
    }
}

/// Opaque reference to a batch started on an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchHandle {
    id: u64,
}

impl BatchHandle {
    /// Numeric batch id, unique per orchestrator.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.id
    }
}

/// Everything a finished batch produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResults {
    /// Terminal state.
    pub state: BatchState,
    /// Per-item results in input order; items never reached are absent.
    pub results: Vec<ScoreResult>,
    /// Similarity groups.
    pub groups: Vec<Group>,
    /// Counters.
    pub summary: BatchSummary,
}

impl BatchResults {
    /// Result for one item.
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&ScoreResult> {
        self.results.iter().find(|r| &r.item_id == id)
    }

    /// Items whose result carries an error, with the message.
    pub fn errors(&self) -> impl Iterator<Item = (&ItemId, &str)> {
        self.results
            .iter()
            .filter_map(|r| r.error.as_deref().map(|e| (&r.item_id, e)))
    }

    /// Results that passed.
    pub fn passed(&self) -> impl Iterator<Item = &ScoreResult> {
        self.results.iter().filter(|r| r.passed)
    }
}

/// Bookkeeping for the most recent batch.
struct BatchSlot {
    id: u64,
    token: CancellationToken,
    state: watch::Receiver<BatchState>,
    results: Option<BatchResults>,
}

type SharedSlot = Arc<Mutex<Option<BatchSlot>>>;

/// Runs batches through the scoring pipeline.
///
/// At most one batch is active per orchestrator. Only the most recent batch
/// can be queried; starting a new batch forgets the previous one.
pub struct BatchOrchestrator {
    scorer: Arc<Scorer>,
    catalog: Option<Arc<dyn Catalog>>,
    config: OrchestratorConfig,
    next_id: AtomicU64,
    slot: SharedSlot,
}

impl BatchOrchestrator {
    /// Creates an orchestrator around a scorer.
    #[must_use]
    pub fn new(scorer: Arc<Scorer>, config: OrchestratorConfig) -> Self {
        Self {
            scorer,
            catalog: None,
            config,
            next_id: AtomicU64::new(1),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Attaches a catalog for rating/label write-back.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// The scorer used by this orchestrator.
    #[must_use]
    pub const fn scorer(&self) -> &Arc<Scorer> {
        &self.scorer
    }

    /// Starts a batch on a new tokio task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for out-of-range options, `Precondition` if a
    /// batch is still running, and `Resource` if no runtime is available.
    pub fn start_batch(
        &self,
        items: Vec<PhotoItem>,
        options: BatchOptions,
        progress: impl ProgressCallback + 'static,
    ) -> Result<BatchHandle, CullError> {
        options.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CullError::Resource(format!("no tokio runtime: {e}")))?;

        let mut slot = lock(&self.slot);
        if let Some(active) = slot.as_ref() {
            if !active.state.borrow().is_terminal() {
                warn!(batch = active.id, "Rejected start: batch still active");
                return Err(PreconditionError::BatchActive(active.id).into());
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(BatchState::Idle);
        *slot = Some(BatchSlot {
            id,
            token: token.clone(),
            state: state_rx,
            results: None,
        });
        drop(slot);

        info!(batch = id, items = items.len(), "Starting batch");

        let run = BatchRun::new(
            id,
            items,
            options,
            Arc::clone(&self.scorer),
            self.catalog.clone(),
            Arc::new(progress),
            token,
            self.config.chunk_pause,
        );
        let shared = Arc::clone(&self.slot);
        runtime.spawn(async move {
            let results = run.execute(&state_tx).await;
            let state = results.state;
            if let Some(current) = lock(&shared).as_mut().filter(|s| s.id == id) {
                current.results = Some(results);
            }
            state_tx.send_replace(state);
            info!(batch = id, ?state, "Batch finished");
        });

        Ok(BatchHandle { id })
    }

    /// Requests cooperative cancellation.
    ///
    /// Cancelling a finished batch has no effect.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` if the handle is not the current batch.
    pub fn cancel(&self, handle: &BatchHandle) -> Result<(), CullError> {
        let slot = lock(&self.slot);
        let current = current(&slot, handle)?;
        info!(batch = handle.id, "Cancellation requested");
        current.token.cancel();
        Ok(())
    }

    /// Current state of a batch.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` if the handle is not the current batch.
    pub fn state(&self, handle: &BatchHandle) -> Result<BatchState, CullError> {
        let slot = lock(&self.slot);
        let state = *current(&slot, handle)?.state.borrow();
        Ok(state)
    }

    /// Waits for a batch to reach a terminal state and returns its results.
    ///
    /// # Errors
    ///
    /// Returns `Precondition` if the handle is not the current batch, and
    /// `Resource` if the batch task ended without reporting.
    pub async fn results(&self, handle: &BatchHandle) -> Result<BatchResults, CullError> {
        let mut state = {
            let slot = lock(&self.slot);
            current(&slot, handle)?.state.clone()
        };

        state
            .wait_for(|s| s.is_terminal())
            .await
            .map_err(|_| CullError::Resource(format!("batch {} task ended unexpectedly", handle.id)))?;

        let slot = lock(&self.slot);
        current(&slot, handle)?
            .results
            .clone()
            .ok_or_else(|| CullError::Resource(format!("batch {} has no results", handle.id)))
    }

    /// Starts a batch and waits for its results.
    ///
    /// # Errors
    ///
    /// See [`BatchOrchestrator::start_batch`] and [`BatchOrchestrator::results`].
    pub async fn run_batch(
        &self,
        items: Vec<PhotoItem>,
        options: BatchOptions,
        progress: impl ProgressCallback + 'static,
    ) -> Result<BatchResults, CullError> {
        let handle = self.start_batch(items, options, progress)?;
        self.results(&handle).await
    }
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("scorer", &self.scorer)
            .field("has_catalog", &self.catalog.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn lock(slot: &Mutex<Option<BatchSlot>>) -> MutexGuard<'_, Option<BatchSlot>> {
    slot.lock().unwrap_or_else(|poisoned| {
        warn!("Batch slot lock poisoned, recovering");
        poisoned.into_inner()
    })
}

fn current<'a>(slot: &'a Option<BatchSlot>, handle: &BatchHandle) -> Result<&'a BatchSlot, CullError> {
    slot.as_ref()
        .filter(|s| s.id == handle.id)
        .ok_or_else(|| PreconditionError::UnknownBatch(handle.id).into())
}
