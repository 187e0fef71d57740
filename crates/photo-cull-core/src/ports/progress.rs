//! Progress reporting port for UI integration.

use crate::domain::Phase;

/// Progress report delivered at every phase boundary and before every unit
/// of work.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Phase the batch is in.
    pub phase: Phase,
    /// Units completed within the phase.
    pub current: usize,
    /// Units in the phase.
    pub total: usize,
    /// Overall progress across all phases (0.0 to 1.0).
    pub overall: f64,
    /// Human-readable status line.
    pub message: String,
}

impl ProgressUpdate {
    /// Builds an update with `overall` derived from the phase weights.
    #[must_use]
    pub fn new(phase: Phase, current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            phase,
            current,
            total,
            overall: phase.overall_progress(current, total),
            message: message.into(),
        }
    }
}

/// Port for receiving progress updates.
///
/// Returning `false` requests cancellation of the batch.
pub trait ProgressCallback: Send + Sync {
    /// Called with each progress update.
    fn on_progress(&self, update: &ProgressUpdate) -> bool;
}

impl<F> ProgressCallback for F
where
    F: Fn(&ProgressUpdate) -> bool + Send + Sync,
{
    fn on_progress(&self, update: &ProgressUpdate) -> bool {
        self(update)
    }
}
