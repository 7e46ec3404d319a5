use crate::types::FoldingResult;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DEFAULT_CAPACITY: usize = 16384;

/// Post-processed foldings of one sequence
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFolding {
    /// Absent when no MFE plugin was active
    pub mfe: Option<FoldingResult>,
    pub partition: FoldingResult,
}

impl CachedFolding {
    /// MFE fields first, completed from the partition result
    pub fn merged(&self) -> FoldingResult {
        FoldingResult::merge(self.mfe.as_ref(), &self.partition)
    }
}

/// Run-wide LRU cache of foldings keyed by the nucleotide string
pub struct FoldingCache {
    entries: Mutex<LruCache<String, CachedFolding>>,
    capacity: usize,
}

impl FoldingCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity)
            .unwrap_or(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN));
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            capacity: cap.get(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CachedFolding>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lookup that marks the entry as most recently used
    pub fn get(&self, seq: &str) -> Option<CachedFolding> {
        self.lock().get(seq).cloned()
    }

    /// Lookup without touching recency
    pub fn contains(&self, seq: &str) -> bool {
        self.lock().contains(seq)
    }

    pub fn insert(&self, seq: String, folding: CachedFolding) {
        self.lock().put(seq, folding);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for FoldingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
