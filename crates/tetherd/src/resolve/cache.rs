//! Bounded name-to-symbol cache.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use lru::LruCache;

use super::Symbol;

/// LRU cache of resolved symbols.
///
/// The lock is held only for the map operation itself, never across a
/// lookup. Two threads missing on the same name both look it up and the last
/// insert wins; lookups are deterministic so either entry is correct.
#[derive(Debug)]
pub(crate) struct SymbolCache {
    entries: Mutex<LruCache<String, Symbol>>,
}

impl SymbolCache {
    pub(crate) fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<Symbol> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub(crate) fn insert(&self, name: &str, symbol: Symbol) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(name.to_owned(), symbol);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::TargetKind;

    fn capacity(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).expect("non-zero capacity")
    }

    #[test]
    fn evicts_the_least_recently_used_name() {
        let cache = SymbolCache::new(capacity(2));
        cache.insert("A", Symbol::new("A", TargetKind::Job));
        cache.insert("B", Symbol::new("B", TargetKind::Job));
        assert!(cache.get("A").is_some());
        cache.insert("C", Symbol::new("C", TargetKind::Job));

        assert!(cache.get("B").is_none());
        assert!(cache.get("A").is_some());
        assert!(cache.get("C").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = SymbolCache::new(capacity(4));
        cache.insert("A", Symbol::new("A", TargetKind::Job));
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
