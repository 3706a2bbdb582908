use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::RwLock;

use common::hash::{PreHashedKeyMap, StringHash};

use crate::building::{Level, LEVEL_COUNT, PrefabId};

// ----------------------------------------------
// CacheStats
// ----------------------------------------------

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub prefabs: usize,
}

// ----------------------------------------------
// CapacityCache
// ----------------------------------------------

#[derive(Copy, Clone, Debug)]
struct CacheEntry {
    // Pack the value was computed with. A lookup with any other pack misses.
    pack: StringHash,
    value: u32,
}

type LevelEntries = [Option<CacheEntry>; LEVEL_COUNT];

// Computed capacities keyed by prefab, one slot per level.
// Read-mostly; invalidation takes the write lock once.
#[derive(Default)]
pub struct CapacityCache {
    entries: RwLock<PreHashedKeyMap<PrefabId, LevelEntries>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CapacityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, prefab: PrefabId, level: Level, pack: StringHash) -> Option<u32> {
        let found = self.entries
            .read()
            .get(&prefab)
            .and_then(|levels| levels[level.index()])
            .filter(|entry| entry.pack == pack)
            .map(|entry| entry.value);

        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);

        found
    }

    pub fn insert(&self, prefab: PrefabId, level: Level, pack: StringHash, value: u32) {
        let mut entries = self.entries.write();
        let levels = entries.entry(prefab).or_insert([None; LEVEL_COUNT]);
        levels[level.index()] = Some(CacheEntry { pack, value });
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    // Returns true if anything was cached for the prefab.
    pub fn clear_prefab(&self, prefab: PrefabId) -> bool {
        self.entries.write().remove(&prefab).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            prefabs: self.len(),
        }
    }
}
