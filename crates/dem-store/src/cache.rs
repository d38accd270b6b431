//! Striped LRU of decompressed source arrays, shared across request threads.

use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

use crate::array::DecompressedSourceArray;

const STRIPE_COUNT: usize = 16;

/// Bounded LRU of [`DecompressedSourceArray`], sharded into lock stripes so
/// that concurrent lookups for different cells rarely contend on the same
/// mutex (the "shared-resource policy" the engine's resource model calls for).
pub struct SourceCache {
    stripes: Vec<Mutex<LruCache<(i32, i32), Arc<DecompressedSourceArray>>>>,
}

impl SourceCache {
    pub fn new(capacity: usize) -> Self {
        let per_stripe = (capacity / STRIPE_COUNT).max(1);
        let cap = NonZeroUsize::new(per_stripe).expect("capacity is clamped to at least 1");
        SourceCache {
            stripes: (0..STRIPE_COUNT).map(|_| Mutex::new(LruCache::new(cap))).collect(),
        }
    }

    fn stripe_for(&self, key: (i32, i32)) -> &Mutex<LruCache<(i32, i32), Arc<DecompressedSourceArray>>> {
        // A simple odd-multiplier hash is enough to spread integer degree
        // keys across stripes; cryptographic quality is not needed here.
        let hash = (key.0 as i64)
            .wrapping_mul(73_856_093)
            .wrapping_add((key.1 as i64).wrapping_mul(19_349_663));
        &self.stripes[(hash.unsigned_abs() as usize) % STRIPE_COUNT]
    }

    pub fn get(&self, key: (i32, i32)) -> Option<Arc<DecompressedSourceArray>> {
        self.stripe_for(key).lock().get(&key).cloned()
    }

    pub fn insert(&self, key: (i32, i32), value: Arc<DecompressedSourceArray>) {
        self.stripe_for(key).lock().put(key, value);
    }

    /// Total number of interned arrays currently held, across all stripes.
    pub fn len(&self) -> usize {
        self.stripes.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
