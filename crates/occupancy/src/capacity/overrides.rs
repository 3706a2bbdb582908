use common::{
    log,
    hash::PreHashedKeyMap
};

use crate::building::PrefabId;

// ----------------------------------------------
// OverrideTable
// ----------------------------------------------

// Per-prefab capacity adjustments for one kind of capacity. An override
// replaces the computed value; a bonus is added once and then becomes an
// override holding the result, so it is never applied twice.
#[derive(Clone, Debug, Default)]
pub struct OverrideTable {
    overrides: PreHashedKeyMap<PrefabId, u32>,
    bonuses: PreHashedKeyMap<PrefabId, u32>,
}

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn set_override(&mut self, prefab: PrefabId, value: u32) {
        self.overrides.insert(prefab, value);
    }

    #[inline]
    pub fn clear_override(&mut self, prefab: PrefabId) -> bool {
        self.overrides.remove(&prefab).is_some()
    }

    #[inline]
    pub fn set_bonus(&mut self, prefab: PrefabId, bonus: u32) {
        self.bonuses.insert(prefab, bonus);
    }

    #[inline]
    pub fn clear_bonus(&mut self, prefab: PrefabId) -> bool {
        self.bonuses.remove(&prefab).is_some()
    }

    #[inline]
    pub fn override_for(&self, prefab: PrefabId) -> Option<u32> {
        self.overrides.get(&prefab).copied()
    }

    #[inline]
    pub fn bonus_for(&self, prefab: PrefabId) -> Option<u32> {
        self.bonuses.get(&prefab).copied()
    }

    #[inline]
    pub fn has_entry(&self, prefab: PrefabId) -> bool {
        self.overrides.contains_key(&prefab) || self.bonuses.contains_key(&prefab)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && self.bonuses.is_empty()
    }

    pub fn clear(&mut self) {
        self.overrides.clear();
        self.bonuses.clear();
    }

    // Final value for `computed`. Migrates a pending bonus into the overrides.
    pub fn resolve(&mut self, prefab: PrefabId, computed: u32) -> u32 {
        if let Some(value) = self.override_for(prefab) {
            return value;
        }

        match self.bonuses.remove(&prefab) {
            Some(bonus) => {
                let value = computed.saturating_add(bonus);
                self.overrides.insert(prefab, value);
                log::info!(log::channel!("capacity"),
                           "Prefab {prefab}: bonus {bonus} applied ({computed} -> {value}), now an override.");
                value
            },
            None => computed,
        }
    }
}
