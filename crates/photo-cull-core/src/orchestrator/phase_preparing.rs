//! Phase 1: PREPARING
//!
//! Validates every item before any scoring happens. Invalid items get an
//! invalid result and are skipped by later phases; a duplicate id is a
//! structural fault.

use std::collections::HashSet;

use tracing::debug;

use super::run::{BatchRun, Halt};
use crate::domain::{CullError, ItemId, Phase, PhotoItem, ScoreResult, ValidationError};

impl BatchRun {
    pub(super) fn phase_preparing(&mut self) -> Result<(), Halt> {
        let total = self.items.len();
        self.checkpoint(Phase::Preparing, 0, total, format!("Validating {total} items"))?;

        let mut seen: HashSet<ItemId> = HashSet::with_capacity(total);
        let mut invalid = 0;

        for index in 0..total {
            self.check_cancelled()?;

            let item = &self.items[index];
            if !seen.insert(item.id.clone()) {
                return Err(CullError::from(ValidationError::DuplicateItem(item.id.clone())).into());
            }

            if let Err(err) = validate_item(item) {
                debug!(batch = self.id, item = %item.id, error = %err, "Item rejected");
                self.results[index] = Some(ScoreResult::invalid(item.id.clone(), err.to_string()));
                invalid += 1;
            }
        }

        self.checkpoint(
            Phase::Preparing,
            total,
            total,
            format!("{} valid, {invalid} invalid", total - invalid),
        )
    }
}

/// Format allow-list and non-zero dimensions.
pub(super) fn validate_item(item: &PhotoItem) -> Result<(), ValidationError> {
    if !item.has_supported_format() {
        return Err(ValidationError::UnsupportedFormat(item.file_format.clone()));
    }
    if item.width == 0 {
        return Err(ValidationError::MissingMetadata("width"));
    }
    if item.height == 0 {
        return Err(ValidationError::MissingMetadata("height"));
    }
    Ok(())
}
