//! Bounded result cache with insertion-order eviction.

use std::collections::{HashMap, VecDeque};

use crate::domain::{ItemId, ScoreResult};

/// Default number of cached results.
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Bounded `ItemId -> ScoreResult` store.
///
/// Eviction is FIFO on first insertion: reading an entry does not refresh it,
/// and overwriting an existing key keeps its original position. A `max_size`
/// of zero disables caching.
#[derive(Debug, Clone)]
pub struct ResultCache {
    max_size: usize,
    entries: HashMap<ItemId, ScoreResult>,
    order: VecDeque<ItemId>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl ResultCache {
    /// Creates an empty cache holding at most `max_size` results.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: HashMap::with_capacity(max_size.min(1024)),
            order: VecDeque::with_capacity(max_size.min(1024)),
        }
    }

    /// Returns a copy of the cached result for `id`.
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<ScoreResult> {
        self.entries.get(id).cloned()
    }

    /// Stores `result` under `id`, evicting the oldest entry when full.
    pub fn put(&mut self, id: ItemId, result: ScoreResult) {
        if self.max_size == 0 {
            return;
        }
        if let Some(slot) = self.entries.get_mut(&id) {
            *slot = result;
            return;
        }
        while self.entries.len() >= self.max_size {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            tracing::trace!(item = %oldest, "Evicted cached result");
        }
        self.order.push_back(id.clone());
        self.entries.insert(id, result);
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Number of cached results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if `id` is cached.
    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.entries.contains_key(id)
    }

    /// Configured capacity.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, overall: f32) -> ScoreResult {
        ScoreResult {
            overall,
            error: None,
            ..ScoreResult::failed(ItemId::new(id), "")
        }
    }

    #[test]
    fn test_put_and_get() {
        let mut cache = ResultCache::new(3);
        cache.put(ItemId::new("a"), result("a", 0.5));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&ItemId::new("a")));
        assert_eq!(cache.get(&ItemId::new("a")).map(|r| r.overall), Some(0.5));
        assert!(cache.get(&ItemId::new("b")).is_none());
    }

    #[test]
    fn test_fifo_eviction() {
        let mut cache = ResultCache::new(5);
        for i in 0..6 {
            let id = format!("item-{i}");
            cache.put(ItemId::new(id.clone()), result(&id, 0.5));
        }
        assert_eq!(cache.len(), 5);
        assert!(!cache.contains(&ItemId::new("item-0")));
        assert!(cache.contains(&ItemId::new("item-5")));
    }

    #[test]
    fn test_read_does_not_refresh() {
        let mut cache = ResultCache::new(2);
        cache.put(ItemId::new("a"), result("a", 0.1));
        cache.put(ItemId::new("b"), result("b", 0.2));
        let _ = cache.get(&ItemId::new("a"));
        cache.put(ItemId::new("c"), result("c", 0.3));
        assert!(!cache.contains(&ItemId::new("a")));
        assert!(cache.contains(&ItemId::new("b")));
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut cache = ResultCache::new(2);
        cache.put(ItemId::new("a"), result("a", 0.1));
        cache.put(ItemId::new("b"), result("b", 0.2));
        cache.put(ItemId::new("a"), result("a", 0.9));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&ItemId::new("a")).map(|r| r.overall), Some(0.9));

        cache.put(ItemId::new("c"), result("c", 0.3));
        assert!(!cache.contains(&ItemId::new("a")));
        assert!(cache.contains(&ItemId::new("b")));
    }

    #[test]
    fn test_zero_size_disables_cache() {
        let mut cache = ResultCache::new(0);
        cache.put(ItemId::new("a"), result("a", 0.1));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut cache = ResultCache::new(3);
        cache.put(ItemId::new("a"), result("a", 0.1));
        cache.clear();
        assert!(cache.is_empty());
        cache.put(ItemId::new("b"), result("b", 0.1));
        assert_eq!(cache.len(), 1);
    }
}
