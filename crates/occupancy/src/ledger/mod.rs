use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use common::bitflags_with_display;

use crate::{
    constants::*,
    occupant::{OccupantId, TIER_COUNT},
    config::LedgerConfigs
};

pub mod pool;
pub mod store;
pub mod growth;
pub mod reconcile;
pub mod rebalance;
pub mod diagnostics;

pub use pool::{UnitPool, SlabUnitPool};
pub use store::{OccupantStore, MemoryStore};
pub use rebalance::{TierDice, RandomGenerator, new_random_generator};
pub use diagnostics::{ListStats, BackRefViolation};

#[cfg(test)]
mod tests;

/*
------------------------
  Occupant Unit Lists
------------------------

Every building threads a singly-linked list of fixed-size occupant units
through the shared unit pool:

  building.head -> [Home | c1 c2 c3 -- --] -> [Home | c4 -- -- -- --] -> None

 - A unit carries one or more category flags and up to 5 occupant slots.
 - An occupant named in a unit slot of category C must point back at the
   building through its C reference, and vice versa. Every mutation below
   keeps both sides in lock-step.
 - The head unit is never removed once a building is initialized.
 - Released units leave the pool and reused slots start zeroed; handles to them go stale.
*/

// ----------------------------------------------
// UnitCategory
// ----------------------------------------------

bitflags_with_display! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct UnitCategory: u8 {
        const Home    = 1 << 0;
        const Work    = 1 << 1;
        const Visit   = 1 << 2;
        const Student = 1 << 3;
    }
}

impl UnitCategory {
    #[inline]
    pub const fn is_single(self) -> bool {
        self.bits().count_ones() == 1
    }

    // How much target allowance one unit of this category uses up by default:
    // a home unit is one household, the others hold up to a full block of occupants.
    #[inline]
    pub fn default_allowance(self, target: u32) -> Allowance {
        if self == Self::Home {
            Allowance::Units(target)
        } else {
            Allowance::Occupants(target)
        }
    }
}

// ----------------------------------------------
// UnitRef
// ----------------------------------------------

// Generational handle into the unit pool. A handle to a slot that was released
// (and possibly reused) no longer resolves, instead of silently aliasing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitRef {
    generation: u32,
    index: u32,
}

impl UnitRef {
    #[inline]
    pub fn new(generation: u32, index: usize) -> Self {
        debug_assert!(generation != RESERVED_GENERATION);
        debug_assert!(index < u32::MAX as usize);
        Self {
            generation,
            index: u32::try_from(index).unwrap_or(u32::MAX),
        }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.generation != RESERVED_GENERATION && self.index < u32::MAX
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }

    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl std::fmt::Display for UnitRef {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "[{},{}]", self.generation, self.index)
        } else {
            write!(f, "[invalid]")
        }
    }
}

// ----------------------------------------------
// OccupantUnit
// ----------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupantUnit {
    pub categories: UnitCategory,
    pub slots: [Option<OccupantId>; UNIT_SLOT_COUNT],
    pub next: Option<UnitRef>,
}

impl OccupantUnit {
    #[inline]
    pub fn new(categories: UnitCategory) -> Self {
        Self {
            categories,
            slots: [None; UNIT_SLOT_COUNT],
            next: None,
        }
    }

    #[inline]
    pub fn is(&self, category: UnitCategory) -> bool {
        self.categories.intersects(category)
    }

    #[inline]
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.occupied_count() == UNIT_SLOT_COUNT
    }

    #[inline]
    pub fn first_free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|slot| slot.is_none())
    }

    #[inline]
    pub fn slot_of(&self, occupant: OccupantId) -> Option<usize> {
        self.slots.iter().position(|slot| *slot == Some(occupant))
    }

    #[inline]
    pub fn occupants(&self) -> impl Iterator<Item = OccupantId> + '_ {
        self.slots.iter().flatten().copied()
    }
}

// ----------------------------------------------
// Allowance
// ----------------------------------------------

// Target for one category, in the currency the list is trimmed in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Allowance {
    // Each matching unit uses up 1 (households).
    Units(u32),
    // Each matching unit uses up to UNIT_SLOT_COUNT (workers, visitors, students).
    Occupants(u32),
}

impl Allowance {
    #[inline]
    fn remaining(self) -> u32 {
        match self {
            Self::Units(count) | Self::Occupants(count) => count,
        }
    }

    #[inline]
    fn per_unit(self) -> u32 {
        match self {
            Self::Units(_) => 1,
            Self::Occupants(_) => UNIT_SLOT_COUNT as u32,
        }
    }

    // Number of units of the category that survive a reconcile with this target.
    #[inline]
    pub fn units_retained(self) -> u32 {
        self.remaining().div_ceil(self.per_unit())
    }

    // Consumes one unit's worth. Returns false once nothing is left.
    #[inline]
    fn consume(&mut self) -> bool {
        let per_unit = self.per_unit();
        match self {
            Self::Units(count) | Self::Occupants(count) => {
                if *count == 0 {
                    return false;
                }
                *count -= per_unit.min(*count);
                true
            }
        }
    }
}

// Per-category allowances walked together, so a unit carrying several
// flags is measured against every applicable target.
#[derive(Clone, Debug, Default)]
pub struct Allowances {
    entries: ArrayVec<(UnitCategory, Allowance), 4>,
}

impl Allowances {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: UnitCategory, allowance: Allowance) -> Self {
        debug_assert!(category.is_single());
        if let Some(entry) = self.entries.iter_mut().find(|(cat, _)| *cat == category) {
            entry.1 = allowance;
        } else if !self.entries.is_full() {
            self.entries.push((category, allowance));
        }
        self
    }

    #[inline]
    pub fn categories(&self) -> UnitCategory {
        self.entries
            .iter()
            .fold(UnitCategory::empty(), |acc, (cat, _)| acc | *cat)
    }

    // Returns true if any of the unit's reconciled categories still had
    // allowance left, i.e. the unit is retained.
    fn consume(&mut self, unit_categories: UnitCategory) -> bool {
        let mut retained = false;
        for (category, allowance) in self.entries.iter_mut() {
            if unit_categories.intersects(*category) && allowance.consume() {
                retained = true;
            }
        }
        retained
    }
}

// ----------------------------------------------
// Reports
// ----------------------------------------------

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub evicted_units: u32,
    pub evicted_occupants: u32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RebalanceReport {
    pub promoted: u32,
    pub evicted: u32,

    // Workers per tier before and after the pass.
    pub before: [u32; TIER_COUNT],
    pub after: [u32; TIER_COUNT],

    // Allowance left per tier; negative is surplus, positive is deficit.
    pub remaining: [i32; TIER_COUNT],
}

// ----------------------------------------------
// Ledger
// ----------------------------------------------

// Explicit context for every list mutation: the host's unit pool and its
// building/occupant store, borrowed for the duration of one simulation step.
pub struct Ledger<'a> {
    pool: &'a mut dyn UnitPool,
    store: &'a mut dyn OccupantStore,
    iteration_limit: usize,
    check_cycles: bool,
}

impl<'a> Ledger<'a> {
    pub fn new(pool: &'a mut dyn UnitPool, store: &'a mut dyn OccupantStore) -> Self {
        Self {
            pool,
            store,
            iteration_limit: MAX_LIST_ITERATIONS,
            check_cycles: cfg!(debug_assertions),
        }
    }

    pub fn with_configs(pool: &'a mut dyn UnitPool,
                        store: &'a mut dyn OccupantStore,
                        configs: &LedgerConfigs) -> Self {
        Self {
            pool,
            store,
            iteration_limit: configs.iteration_limit.clamp(1, MAX_LIST_ITERATIONS),
            check_cycles: configs.check_cycles,
        }
    }

    #[inline]
    pub fn with_iteration_limit(mut self, limit: usize) -> Self {
        self.iteration_limit = limit.max(1);
        self
    }

    #[inline]
    pub fn with_cycle_check(mut self, enable: bool) -> Self {
        self.check_cycles = enable;
        self
    }

    #[inline]
    pub fn iteration_limit(&self) -> usize {
        self.iteration_limit
    }

    #[inline]
    pub fn pool(&self) -> &dyn UnitPool {
        &*self.pool
    }

    #[inline]
    pub fn store(&self) -> &dyn OccupantStore {
        &*self.store
    }
}
