//! Similarity group type.

use serde::{Deserialize, Serialize};

use super::ItemId;

/// A cluster of near-duplicate items with one designated representative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group identifier (`group-1`, `group-2`, ...).
    pub id: String,
    /// Members in input order. Always at least two.
    pub members: Vec<ItemId>,
    /// Member with the highest overall score.
    pub best: ItemId,
}

impl Group {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Groups are never empty once built; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns true if `id` is a member.
    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.members.contains(id)
    }
}
