use std::ops::ControlFlow;
use smallvec::SmallVec;

use common::log;

use crate::{
    building::BuildingId,
    occupant::OccupantId,
    error::LedgerError
};

use super::{
    Ledger,
    UnitRef,
    UnitCategory
};

// ----------------------------------------------
// List growth & occupant moves
// ----------------------------------------------

impl Ledger<'_> {
    // Gives an uninitialized building its first units, one per category flag,
    // in flag order. Returns the head. Already initialized buildings are left
    // untouched. Either every unit is linked or none is.
    pub fn initialize_building(&mut self,
                               building: BuildingId,
                               categories: UnitCategory) -> Result<UnitRef, LedgerError> {
        if let Some(head) = self.head_of(building)? {
            return Ok(head);
        }

        let categories = if categories.is_empty() {
            self.store.building(building).ok_or(LedgerError::UnknownBuilding(building))?.usage
        } else {
            categories
        };

        // An unknown usage still gets a home unit; the list can never be empty.
        let flags: SmallVec<[UnitCategory; 4]> = if categories.is_empty() {
            SmallVec::from_elem(UnitCategory::Home, 1)
        } else {
            categories.iter().collect()
        };

        let units = self.alloc_units(&flags)?;
        let head = self.link_units(&units, None);

        if let Some(record) = self.store.building_mut(building) {
            record.head = head;
        }

        head.ok_or(LedgerError::UnknownBuilding(building))
    }

    // Appends units of `category` until the building's list holds `units` of
    // them. Returns the number appended. All allocations happen up front, so
    // a PoolExhausted failure leaves the list exactly as it was.
    pub fn ensure_units(&mut self,
                        building: BuildingId,
                        category: UnitCategory,
                        units: u32) -> Result<u32, LedgerError> {
        debug_assert!(category.is_single());

        let mut existing = 0;
        let walk = self.walk_units(building, |_, unit| {
            if unit.categories == category {
                existing += 1;
            }
            ControlFlow::Continue(())
        })?;

        if existing >= units {
            return Ok(0);
        }

        let missing = units - existing;

        // Bail out before building the allocation list for a target the pool can never hold.
        let available = self.pool.capacity().saturating_sub(self.pool.units_in_use());
        if missing as usize > available {
            log::warn!(log::channel!("ledger"),
                       "{building}: {missing} {category} units requested, only {available} left in the pool.");
            return Err(LedgerError::PoolExhausted { capacity: self.pool.capacity() });
        }

        let flags: SmallVec<[UnitCategory; 8]> = SmallVec::from_elem(category, missing as usize);
        let new_units = self.alloc_units(&flags)?;

        let first = self.link_units(&new_units, walk.tail);
        if walk.tail.is_none() {
            if let Some(record) = self.store.building_mut(building) {
                record.head = first;
            }
        }

        log::verbose!(log::channel!("ledger"), "{building}: added {missing} {category} units.");
        Ok(missing)
    }

    // Moves `occupant` into the first free slot of one of the building's
    // `category` units, appending a unit when all are full. The slot is secured
    // before any back-reference is touched; if the pool is exhausted the
    // occupant keeps its previous assignment.
    pub fn assign_occupant(&mut self,
                           building: BuildingId,
                           category: UnitCategory,
                           occupant: OccupantId) -> Result<UnitRef, LedgerError> {
        debug_assert!(category.is_single());

        let previous = self.store
            .occupant(occupant)
            .ok_or(LedgerError::UnknownOccupant(occupant))?
            .back_ref(category);

        // Already here?
        if previous == Some(building) {
            if let Some(unit_ref) = self.find_occupant(building, category, occupant)? {
                return Ok(unit_ref);
            }
        }

        let mut free_unit = None;
        let walk = self.walk_units(building, |unit_ref, unit| {
            if unit.categories == category && unit.first_free_slot().is_some() {
                free_unit = Some(unit_ref);
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        })?;

        let target = match free_unit {
            Some(unit_ref) => unit_ref,
            None => {
                let units = self.alloc_units(&[category])?;
                let first = self.link_units(&units, walk.tail);
                if walk.tail.is_none() {
                    if let Some(record) = self.store.building_mut(building) {
                        record.head = first;
                    }
                }
                first.ok_or(LedgerError::UnknownBuilding(building))?
            }
        };

        if let Some(old_building) = previous {
            if old_building != building {
                if let Err(err) = self.remove_occupant(old_building, category, occupant) {
                    log::warn!(log::channel!("ledger"),
                               "Failed to detach {occupant} from {old_building}: {err}");
                }
            }
        }

        let unit = self.pool.unit_mut(target).ok_or(LedgerError::StaleUnit(target))?;
        let slot = unit.first_free_slot().ok_or(LedgerError::StaleUnit(target))?;
        unit.slots[slot] = Some(occupant);

        if let Some(record) = self.store.occupant_mut(occupant) {
            record.set_back_ref(category, Some(building));
        }

        Ok(target)
    }

    // Clears the occupant's slot in the building's `category` units and its
    // back-reference to the building. Returns whether a slot was found.
    pub fn remove_occupant(&mut self,
                           building: BuildingId,
                           category: UnitCategory,
                           occupant: OccupantId) -> Result<bool, LedgerError> {
        debug_assert!(category.is_single());

        if self.store.occupant(occupant).is_none() {
            return Err(LedgerError::UnknownOccupant(occupant));
        }

        let found = self.find_occupant(building, category, occupant)?;

        if let Some(unit_ref) = found {
            if let Some(unit) = self.pool.unit_mut(unit_ref) {
                if let Some(slot) = unit.slot_of(occupant) {
                    unit.slots[slot] = None;
                }
            }
        }

        if let Some(record) = self.store.occupant_mut(occupant) {
            record.clear_back_ref_if(category, building);
        }

        Ok(found.is_some())
    }

    pub fn find_occupant(&self,
                         building: BuildingId,
                         category: UnitCategory,
                         occupant: OccupantId) -> Result<Option<UnitRef>, LedgerError> {
        let walk = self.walk_units(building, |_, unit| {
            if unit.is(category) && unit.slot_of(occupant).is_some() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(walk.stopped_at)
    }

    // Allocates one unit per entry. On failure every unit allocated so far
    // goes back to the pool.
    fn alloc_units(&mut self, categories: &[UnitCategory]) -> Result<SmallVec<[UnitRef; 8]>, LedgerError> {
        let mut units = SmallVec::<[UnitRef; 8]>::new();

        for &category in categories {
            match self.pool.alloc_unit(category) {
                Ok(unit_ref) => units.push(unit_ref),
                Err(err) => {
                    for &unit_ref in &units {
                        self.pool.release_unit(unit_ref);
                    }
                    return Err(err);
                }
            }
        }

        Ok(units)
    }

    // Chains `units` in order and hangs them after `tail`, if any.
    // Returns the first of the new units.
    fn link_units(&mut self, units: &[UnitRef], tail: Option<UnitRef>) -> Option<UnitRef> {
        for pair in units.windows(2) {
            if let Some(unit) = self.pool.unit_mut(pair[0]) {
                unit.next = Some(pair[1]);
            }
        }

        let first = units.first().copied();

        if let Some(tail_ref) = tail {
            if let Some(tail_unit) = self.pool.unit_mut(tail_ref) {
                debug_assert!(tail_unit.next.is_none());
                tail_unit.next = first;
            }
        }

        first
    }
}
