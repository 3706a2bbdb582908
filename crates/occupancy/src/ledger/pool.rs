use slab::Slab;

use common::log;

use crate::{
    constants::*,
    error::LedgerError
};

use super::{
    UnitRef,
    UnitCategory,
    OccupantUnit
};

// ----------------------------------------------
// UnitPool
// ----------------------------------------------

// Allocation primitives of the host's shared occupant unit buffer.
// The ledger consumes this; it never owns the pool's lifetime.
pub trait UnitPool {
    // Hands out a zeroed unit carrying `categories`, or PoolExhausted.
    fn alloc_unit(&mut self, categories: UnitCategory) -> Result<UnitRef, LedgerError>;

    // Returns false for stale or already released handles.
    fn release_unit(&mut self, unit: UnitRef) -> bool;

    fn unit(&self, unit: UnitRef) -> Option<&OccupantUnit>;
    fn unit_mut(&mut self, unit: UnitRef) -> Option<&mut OccupantUnit>;

    fn units_in_use(&self) -> usize;
    fn capacity(&self) -> usize;
}

// ----------------------------------------------
// SlabUnitPool
// ----------------------------------------------

struct PooledUnit {
    id: UnitRef,
    unit: OccupantUnit,
}

// Fixed-capacity unit pool on a slab with generation checked handles.
pub struct SlabUnitPool {
    units: Slab<PooledUnit>,
    capacity: usize,
    generation: u32,
}

impl SlabUnitPool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_UNIT_POOL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            units: Slab::with_capacity(capacity.min(UNIT_POOL_INITIAL_RESERVE)),
            capacity,
            generation: INITIAL_GENERATION,
        }
    }

    fn next_generation(&mut self) -> u32 {
        let generation = self.generation;
        self.generation = self.generation.wrapping_add(1);
        if self.generation == RESERVED_GENERATION {
            self.generation = INITIAL_GENERATION;
        }
        generation
    }

    #[inline]
    fn is_live(&self, unit: UnitRef) -> bool {
        unit.is_valid() &&
        self.units.get(unit.index()).is_some_and(|pooled| pooled.id == unit)
    }
}

impl UnitPool for SlabUnitPool {
    fn alloc_unit(&mut self, categories: UnitCategory) -> Result<UnitRef, LedgerError> {
        if self.units.len() >= self.capacity {
            log::warn!(log::channel!("ledger"), "Unit pool exhausted ({} units in use).", self.units.len());
            return Err(LedgerError::PoolExhausted { capacity: self.capacity });
        }

        let generation = self.next_generation();
        let id = UnitRef::new(generation, self.units.vacant_key());
        let index = self.units.insert(PooledUnit { id, unit: OccupantUnit::new(categories) });

        debug_assert!(id == self.units[index].id);
        Ok(id)
    }

    fn release_unit(&mut self, unit: UnitRef) -> bool {
        // Handle freeing an invalid handle gracefully.
        // The generation check also rejects slots that were already reused.
        if !self.is_live(unit) {
            return false;
        }

        // The slot's contents are dropped here; alloc_unit always constructs
        // a fresh unit, so a reused slot starts zeroed.
        self.units.try_remove(unit.index()).is_some()
    }

    #[inline]
    fn unit(&self, unit: UnitRef) -> Option<&OccupantUnit> {
        if !unit.is_valid() {
            return None;
        }

        self.units.get(unit.index())
            .filter(|pooled| pooled.id == unit)
            .map(|pooled| &pooled.unit)
    }

    #[inline]
    fn unit_mut(&mut self, unit: UnitRef) -> Option<&mut OccupantUnit> {
        if !unit.is_valid() {
            return None;
        }

        self.units.get_mut(unit.index())
            .filter(|pooled| pooled.id == unit)
            .map(|pooled| &mut pooled.unit)
    }

    #[inline]
    fn units_in_use(&self) -> usize {
        self.units.len()
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.capacity
    }
}
