//! Batch-level types: options, phases, states and the summary.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Options recognized by a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Minimum overall score to pass (0.0-1.0).
    pub threshold: f32,
    /// Relative weight of the technical component.
    pub technical_weight: f32,
    /// Relative weight of the aesthetic component.
    pub aesthetic_weight: f32,
    /// Minimum pairwise similarity to join a group (0.0-1.0).
    pub similarity_threshold: f32,
    /// Blur variance at or above which an image counts as sharp.
    pub blur_threshold: f32,
    /// Run the grouping phase.
    pub enable_grouping: bool,
    /// Confirm metadata groups with the backend's similarity comparison.
    pub visual_check: bool,
    /// Write a star rating back to the catalog for passed items.
    pub auto_rate: bool,
    /// Write `passed_label` back to the catalog for passed items.
    pub auto_label: bool,
    /// Color label applied by `auto_label`.
    pub passed_label: String,
    /// Items per processing chunk.
    pub batch_size: usize,
    /// Bypass the result cache and rescore every item.
    pub force: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            technical_weight: 0.5,
            aesthetic_weight: 0.5,
            similarity_threshold: 0.85,
            blur_threshold: 100.0,
            enable_grouping: true,
            visual_check: false,
            auto_rate: false,
            auto_label: false,
            passed_label: "Green".to_string(),
            batch_size: 20,
            force: false,
        }
    }
}

impl BatchOptions {
    /// Checks every option for a usable value.
    ///
    /// # Errors
    ///
    /// Returns the first option found out of range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        unit_range("threshold", self.threshold)?;
        unit_range("similarity_threshold", self.similarity_threshold)?;
        positive("technical_weight", self.technical_weight)?;
        positive("aesthetic_weight", self.aesthetic_weight)?;
        if !self.blur_threshold.is_finite() || self.blur_threshold < 0.0 {
            return Err(ValidationError::InvalidOption {
                name: "blur_threshold",
                reason: format!("must be a non-negative number, got {}", self.blur_threshold),
            });
        }
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidOption {
                name: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn unit_range(name: &'static str, value: f32) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidOption {
            name,
            reason: format!("{value} is not in 0.0..=1.0"),
        })
    }
}

fn positive(name: &'static str, value: f32) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidOption {
            name,
            reason: format!("must be a positive number, got {value}"),
        })
    }
}

/// Work phases of a batch run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Item validation.
    Preparing,
    /// Per-item scoring.
    Processing,
    /// Similarity grouping.
    Grouping,
    /// Summary computation.
    Finalizing,
}

impl Phase {
    /// All phases in order.
    pub const ALL: [Self; 4] = [
        Self::Preparing,
        Self::Processing,
        Self::Grouping,
        Self::Finalizing,
    ];

    /// Share of the overall progress bar taken by this phase.
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::Preparing | Self::Finalizing => 0.10,
            Self::Processing => 0.60,
            Self::Grouping => 0.20,
        }
    }

    /// Overall progress at which this phase starts.
    #[must_use]
    pub const fn start(self) -> f64 {
        match self {
            Self::Preparing => 0.0,
            Self::Processing => 0.10,
            Self::Grouping => 0.70,
            Self::Finalizing => 0.90,
        }
    }

    /// Overall progress fraction after `done` of `total` units.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn overall_progress(self, done: usize, total: usize) -> f64 {
        if total == 0 {
            return self.start() + self.weight();
        }
        let fraction = (done.min(total) as f64) / (total as f64);
        self.start() + fraction * self.weight()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Preparing => "preparing",
            Self::Processing => "processing",
            Self::Grouping => "grouping",
            Self::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

/// State machine of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Created, not started.
    Idle,
    /// Validating items.
    Preparing,
    /// Scoring items.
    Processing,
    /// Clustering similar items.
    Grouping,
    /// Computing the summary.
    Finalizing,
    /// Finished all phases.
    Completed,
    /// Stopped by the caller; partial results kept.
    Cancelled,
    /// Stopped by a structural fault; partial results kept.
    Error,
}

impl BatchState {
    /// Returns true once the run can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }
}

impl From<Phase> for BatchState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Preparing => Self::Preparing,
            Phase::Processing => Self::Processing,
            Phase::Grouping => Self::Grouping,
            Phase::Finalizing => Self::Finalizing,
        }
    }
}

/// Counters reported at the end of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items submitted.
    pub total: usize,
    /// Items that went through the processing phase.
    pub processed: usize,
    /// Items that passed.
    pub passed: usize,
    /// Items with a result that did not pass (rejected, errored or invalid).
    pub failed: usize,
    /// Items that ended up in a similarity group.
    pub grouped: usize,
    /// Items whose result carries an error.
    pub errors: usize,
}
