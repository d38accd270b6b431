//! Tile Cache: a bounded, striped LRU of rendered PNG tile bodies.
//!
//! Keyed by `(mode, water_level_quantum, z, x, y)`. RAM-only, never
//! persisted - eviction is strict least-recently-used, and an insert of an
//! identical key overwrites.

use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// The rendering mode part of a cache key. Mirrors `colormap::Mode` without
/// introducing a dependency cycle between the cache and the color mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Topographic,
    Flood,
}

/// Cache key: `(mode, water_level_quantum, z, x, y)`. The water level is
/// stored as tenths of a meter so the key is exactly hashable/comparable -
/// `colormap::quantize_water_level` already snaps to this grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    mode: Mode,
    water_level_decimeters: i32,
    z: i32,
    x: i32,
    y: i32,
}

impl CacheKey {
    pub fn topographic(z: i32, x: i32, y: i32) -> Self {
        CacheKey {
            mode: Mode::Topographic,
            water_level_decimeters: 0,
            z,
            x,
            y,
        }
    }

    /// `water_level_quantum` must already be snapped to the 0.1 m grid.
    pub fn flood(water_level_quantum: f64, z: i32, x: i32, y: i32) -> Self {
        CacheKey {
            mode: Mode::Flood,
            water_level_decimeters: (water_level_quantum * 10.0).round() as i32,
            z,
            x,
            y,
        }
    }
}

const STRIPE_COUNT: usize = 16;

/// Default number of PNG entries the cache holds in total (spread across
/// stripes).
pub const DEFAULT_CAPACITY: usize = 1000;

/// Bounded, striped LRU cache of rendered PNG tile bytes.
pub struct TileCache {
    stripes: Vec<Mutex<LruCache<CacheKey, Arc<[u8]>>>>,
}

impl TileCache {
    pub fn new(capacity: usize) -> Self {
        let per_stripe = (capacity / STRIPE_COUNT).max(1);
        let cap = NonZeroUsize::new(per_stripe).expect("capacity is clamped to at least 1");
        TileCache {
            stripes: (0..STRIPE_COUNT).map(|_| Mutex::new(LruCache::new(cap))).collect(),
        }
    }

    fn stripe_for(&self, key: &CacheKey) -> &Mutex<LruCache<CacheKey, Arc<[u8]>>> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % STRIPE_COUNT]
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<[u8]>> {
        self.stripe_for(key).lock().get(key).cloned()
    }

    /// Inserts or overwrites the entry for `key`.
    pub fn insert(&self, key: CacheKey, body: Arc<[u8]>) {
        self.stripe_for(&key).lock().put(key, body);
    }

    /// Total number of entries currently held, across all stripes.
    pub fn len(&self) -> usize {
        self.stripes.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
