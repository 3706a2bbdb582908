use std::{collections::HashMap, sync::Arc};
use parking_lot::RwLock;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use common::{
    log,
    hash::{self, PreHashedKeyMap, StringHash}
};

use crate::{
    building::{Level, PrefabId, PrefabInfo, Service, SubCategory},
    constants::*,
    error::ConfigError,
    occupant::TIER_COUNT
};

pub mod pack;
pub mod cache;
pub mod overrides;
pub mod visitors;

pub use pack::{CalculationPack, LevelParams, PackVersion, CapacityModel, Estimate};
pub use cache::{CapacityCache, CacheStats};
pub use overrides::OverrideTable;


// ----------------------------------------------
// CapacityKind
// ----------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum CapacityKind {
    Households,
    Workplaces,
}

// ----------------------------------------------
// PackRegistry
// ----------------------------------------------

#[derive(Default)]
struct PackRegistry {
    packs: PreHashedKeyMap<StringHash, Arc<CalculationPack>>,
    selections: HashMap<SubCategory, StringHash>,
}

impl PackRegistry {
    fn find(&self, name: &str) -> Option<&Arc<CalculationPack>> {
        self.packs.get(&hash::fnv1a_from_str(name))
    }

    fn default_for(&self, service: Service) -> Option<&Arc<CalculationPack>> {
        self.find(pack::default_pack_name(service))
    }
}

// ----------------------------------------------
// CapacityEngine
// ----------------------------------------------

// Target capacities of buildings: households, workers per tier and visitors.
// Results are cached per prefab and level. Every settings change goes
// through the cache invalidation below.
pub struct CapacityEngine {
    registry: RwLock<PackRegistry>,
    household_overrides: RwLock<OverrideTable>,
    workplace_overrides: RwLock<OverrideTable>,
    household_cache: CapacityCache,
    workplace_cache: CapacityCache,
}

impl CapacityEngine {
    // Engine with the built-in packs registered and no selections.
    pub fn new() -> Self {
        let engine = Self::empty();
        {
            let mut registry = engine.registry.write();
            for pack in pack::builtin_packs() {
                registry.packs.insert(pack.name_hash(), Arc::new(pack));
            }
        }
        engine
    }

    fn empty() -> Self {
        Self {
            registry: RwLock::new(PackRegistry::default()),
            household_overrides: RwLock::new(OverrideTable::new()),
            workplace_overrides: RwLock::new(OverrideTable::new()),
            household_cache: CapacityCache::new(),
            workplace_cache: CapacityCache::new(),
        }
    }

    // ----------------------
    // Packs:
    // ----------------------

    pub fn register_pack(&self, pack: CalculationPack) -> Result<(), ConfigError> {
        pack.validate()?;

        {
            let mut registry = self.registry.write();
            let key = pack.name_hash();
            if registry.packs.contains_key(&key) {
                return Err(ConfigError::DuplicatePack(pack.name));
            }
            registry.packs.insert(key, Arc::new(pack));
        }

        self.invalidate_cache();
        Ok(())
    }

    // Makes `name` the active pack for the sub-category. The pack must be
    // registered and made for the sub-category's service.
    pub fn select_pack(&self, sub_category: SubCategory, name: &str) -> Result<(), ConfigError> {
        {
            let mut registry = self.registry.write();
            let pack = registry.find(name).ok_or_else(|| ConfigError::UnknownPack(name.to_string()))?;

            let wanted = sub_category.service();
            if pack.service != wanted {
                return Err(ConfigError::ServiceMismatch {
                    pack: name.to_string(),
                    pack_service: pack.service.to_string(),
                    wanted: wanted.to_string(),
                });
            }

            let key = pack.name_hash();
            registry.selections.insert(sub_category, key);
        }

        self.invalidate_cache();
        Ok(())
    }

    // Back to the service's built-in default.
    pub fn clear_selection(&self, sub_category: SubCategory) {
        if self.registry.write().selections.remove(&sub_category).is_some() {
            self.invalidate_cache();
        }
    }

    pub fn pack(&self, name: &str) -> Option<Arc<CalculationPack>> {
        self.registry.read().find(name).cloned()
    }

    pub fn pack_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry
            .read()
            .packs
            .values()
            .map(|pack| pack.name.clone())
            .collect();
        names.sort();
        names
    }

    // Selected pack for the sub-category, else the service's built-in default.
    // An engine without any pack for the service falls back to an empty
    // legacy pack, which computes with default level parameters.
    pub fn pack_for(&self, sub_category: SubCategory) -> Arc<CalculationPack> {
        let registry = self.registry.read();
        let service = sub_category.service();

        let selected = registry.selections
            .get(&sub_category)
            .and_then(|key| registry.packs.get(key));

        if let Some(pack) = selected.or_else(|| registry.default_for(service)) {
            return pack.clone();
        }

        log::warn!(log::channel!("capacity"), "No calculation pack for {sub_category}; using defaults.");
        Arc::new(CalculationPack {
            name: pack::default_pack_name(service).to_string(),
            service,
            ..Default::default()
        })
    }

    // ----------------------
    // Overrides & bonuses:
    // ----------------------

    fn overrides(&self, kind: CapacityKind) -> &RwLock<OverrideTable> {
        match kind {
            CapacityKind::Households => &self.household_overrides,
            CapacityKind::Workplaces => &self.workplace_overrides,
        }
    }

    fn cache(&self, kind: CapacityKind) -> &CapacityCache {
        match kind {
            CapacityKind::Households => &self.household_cache,
            CapacityKind::Workplaces => &self.workplace_cache,
        }
    }

    pub fn set_override(&self, kind: CapacityKind, prefab: PrefabId, value: u32) {
        self.overrides(kind).write().set_override(prefab, value);
        self.invalidate_cache_for(prefab);
    }

    pub fn clear_override(&self, kind: CapacityKind, prefab: PrefabId) {
        if self.overrides(kind).write().clear_override(prefab) {
            self.invalidate_cache_for(prefab);
        }
    }

    pub fn set_bonus(&self, kind: CapacityKind, prefab: PrefabId, bonus: u32) {
        self.overrides(kind).write().set_bonus(prefab, bonus);
        self.invalidate_cache_for(prefab);
    }

    pub fn clear_bonus(&self, kind: CapacityKind, prefab: PrefabId) {
        if self.overrides(kind).write().clear_bonus(prefab) {
            self.invalidate_cache_for(prefab);
        }
    }

    pub fn override_for(&self, kind: CapacityKind, prefab: PrefabId) -> Option<u32> {
        self.overrides(kind).read().override_for(prefab)
    }

    pub fn bonus_for(&self, kind: CapacityKind, prefab: PrefabId) -> Option<u32> {
        self.overrides(kind).read().bonus_for(prefab)
    }

    // ----------------------
    // Cache:
    // ----------------------

    pub fn invalidate_cache(&self) {
        for kind in CapacityKind::iter() {
            self.cache(kind).clear();
        }
        log::verbose!(log::channel!("cache"), "Capacity caches cleared.");
    }

    pub fn invalidate_cache_for(&self, prefab: PrefabId) {
        let mut cleared = false;
        for kind in CapacityKind::iter() {
            cleared |= self.cache(kind).clear_prefab(prefab);
        }
        if cleared {
            log::verbose!(log::channel!("cache"), "Capacity cache cleared for prefab {prefab}.");
        }
    }

    pub fn cache_stats(&self, kind: CapacityKind) -> CacheStats {
        self.cache(kind).stats()
    }

    // ----------------------
    // Capacities:
    // ----------------------

    // Raw capacity with the pack's model, then the legacy override tables.
    // Cached per prefab and level for the pack it was computed with.
    fn resolve_total<F>(&self,
                        kind: CapacityKind,
                        prefab: &PrefabInfo,
                        level: Level,
                        pack: &CalculationPack,
                        clamp: F) -> u32
        where F: FnOnce(Estimate) -> u32
    {
        let pack_key = pack.name_hash();
        if let Some(cached) = self.cache(kind).get(prefab.id, level, pack_key) {
            return cached;
        }

        let estimate = pack.model().estimate(prefab, pack.level(level));
        let mut total = clamp(estimate);

        if pack.is_legacy() {
            total = self.overrides(kind).write().resolve(prefab.id, total);
        }

        self.cache(kind).insert(prefab.id, level, pack_key, total);
        total
    }

    pub fn compute_household_count(&self, prefab: &PrefabInfo, level: Level, pack: &CalculationPack) -> u32 {
        let high_density = prefab.sub_category.is_high_density_residential();

        let households = self.resolve_total(CapacityKind::Households, prefab, level, pack, |estimate| {
            if high_density {
                let floor_minimum = estimate.floors.saturating_mul(HIGH_DENSITY_FLOOR_PERCENT).div_ceil(100);
                estimate.base.max(floor_minimum.max(HIGH_DENSITY_MIN_HOUSEHOLDS))
            } else {
                estimate.base
            }
        });

        // An override of zero still leaves one household.
        households.max(1)
    }

    // Worker total split across the four education tiers.
    pub fn compute_workplace_counts(&self,
                                    prefab: &PrefabInfo,
                                    level: Level,
                                    pack: &CalculationPack,
                                    min_workers: u32) -> [u32; TIER_COUNT] {
        let total = self.resolve_total(CapacityKind::Workplaces, prefab, level, pack, |estimate| estimate.base);
        distribute_tiers(total.max(min_workers), &pack.level(level).tier_weights)
    }

    #[inline]
    pub fn compute_visitor_count(&self, total_workers: u32, sub_category: SubCategory, level: Level) -> u32 {
        visitors::compute_visitor_count(total_workers, sub_category, level)
    }

    // Same as above with the pack selected for the prefab's sub-category.
    pub fn household_count(&self, prefab: &PrefabInfo, level: Level) -> u32 {
        let pack = self.pack_for(prefab.sub_category);
        self.compute_household_count(prefab, level, &pack)
    }

    pub fn workplace_counts(&self, prefab: &PrefabInfo, level: Level, min_workers: u32) -> [u32; TIER_COUNT] {
        let pack = self.pack_for(prefab.sub_category);
        self.compute_workplace_counts(prefab, level, &pack, min_workers)
    }

    // Visitors drawn by a shop with the given workforce.
    pub fn visitor_count(&self, prefab: &PrefabInfo, level: Level, min_workers: u32) -> u32 {
        let workers: u32 = self.workplace_counts(prefab, level, min_workers).iter().sum();
        self.compute_visitor_count(workers, prefab.sub_category, level)
    }
}

impl Default for CapacityEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------
// Tier distribution
// ----------------------------------------------

// tier[i] = total * w[i] / sum(w), with tier 0 taking the rounding remainder
// so the tiers always add up to `total`. No workers or no weights still
// leaves one uneducated slot.
pub fn distribute_tiers(total: u32, weights: &[u32; TIER_COUNT]) -> [u32; TIER_COUNT] {
    let weight_sum: u64 = weights.iter().map(|&weight| weight as u64).sum();

    if weight_sum == 0 {
        log::warn!(log::channel!("capacity"), "Tier weights sum to zero; keeping a single worker.");
        return [1, 0, 0, 0];
    }
    if total == 0 {
        return [1, 0, 0, 0];
    }

    let mut tiers = [0; TIER_COUNT];
    for tier in 1..TIER_COUNT {
        tiers[tier] = (total as u64 * weights[tier] as u64 / weight_sum) as u32;
    }

    let assigned: u32 = tiers[1..].iter().sum();
    tiers[0] = total - assigned;
    tiers
}
