use std::ops::ControlFlow;
use bitvec::vec::BitVec;

use crate::{
    building::BuildingId,
    occupant::OccupantId,
    error::LedgerError
};

use super::{
    Ledger,
    UnitRef,
    UnitCategory,
    OccupantUnit,
    ReconcileReport
};

// ----------------------------------------------
// ListStats
// ----------------------------------------------

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ListStats {
    pub units: u32,
    pub home_units: u32,
    pub work_units: u32,
    pub visit_units: u32,
    pub student_units: u32,
    pub occupied_slots: u32,
    pub free_slots: u32,
}

impl ListStats {
    pub fn units_of(&self, category: UnitCategory) -> u32 {
        let mut count = 0;
        if category.contains(UnitCategory::Home)    { count += self.home_units; }
        if category.contains(UnitCategory::Work)    { count += self.work_units; }
        if category.contains(UnitCategory::Visit)   { count += self.visit_units; }
        if category.contains(UnitCategory::Student) { count += self.student_units; }
        count
    }
}

// ----------------------------------------------
// BackRefViolation
// ----------------------------------------------

// An occupant sits in a unit of `category` but doesn't point back at the building.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BackRefViolation {
    pub unit: UnitRef,
    pub occupant: OccupantId,
    pub category: UnitCategory,
    pub points_at: Option<BuildingId>,
}

// ----------------------------------------------
// UnitWalk
// ----------------------------------------------

// Where a bounded list walk ended. `tail` is the last unit visited, which is
// the list tail unless the visitor stopped early.
#[derive(Copy, Clone, Debug, Default)]
pub(super) struct UnitWalk {
    pub units: u32,
    pub tail: Option<UnitRef>,
    pub stopped_at: Option<UnitRef>,
}

// ----------------------------------------------
// Diagnostics
// ----------------------------------------------

impl Ledger<'_> {
    // Visited-set walk from `head`. Returns the first unit reached twice.
    // Independent of the iteration ceiling, so a long but healthy list
    // is never mistaken for a loop.
    pub fn find_cycle(&self, head: UnitRef) -> Option<UnitRef> {
        let mut visited = BitVec::<usize>::new();
        let mut current = Some(head);

        while let Some(unit_ref) = current {
            let unit = self.pool.unit(unit_ref)?;

            let index = unit_ref.index();
            if index >= visited.len() {
                visited.resize(index + 1, false);
            }
            if visited[index] {
                return Some(unit_ref);
            }
            visited.set(index, true);

            current = unit.next;
        }

        None
    }

    // Bounded walk over the building's list, in order. The visitor may stop
    // early; the returned walk tells where it stopped and where the list ends.
    pub(super) fn walk_units<F>(&self, building: BuildingId, mut visitor: F) -> Result<UnitWalk, LedgerError>
        where F: FnMut(UnitRef, &OccupantUnit) -> ControlFlow<()>
    {
        let mut walk = UnitWalk::default();
        let mut current = self.head_of(building)?;
        let mut iterations = 0;

        while let Some(unit_ref) = current {
            if iterations >= self.iteration_limit {
                return Err(self.list_corrupted(building, iterations, ReconcileReport::default()));
            }
            iterations += 1;

            let unit = match self.pool.unit(unit_ref) {
                Some(unit) => unit,
                None if iterations == 1 => return Err(LedgerError::StaleUnit(unit_ref)),
                None => return Err(LedgerError::CorruptList {
                    building,
                    iterations,
                    partial: ReconcileReport::default(),
                }),
            };

            walk.units += 1;
            walk.tail = Some(unit_ref);

            if visitor(unit_ref, unit).is_break() {
                walk.stopped_at = Some(unit_ref);
                break;
            }

            current = unit.next;
        }

        Ok(walk)
    }

    // Calls `visitor` on every unit of the building's list, in order.
    pub fn for_each_unit<F>(&self, building: BuildingId, mut visitor: F) -> Result<(), LedgerError>
        where F: FnMut(UnitRef, &OccupantUnit)
    {
        self.walk_units(building, |unit_ref, unit| {
            visitor(unit_ref, unit);
            ControlFlow::Continue(())
        })?;
        Ok(())
    }

    pub fn list_stats(&self, building: BuildingId) -> Result<ListStats, LedgerError> {
        let mut stats = ListStats::default();

        self.for_each_unit(building, |_, unit| {
            stats.units += 1;
            if unit.is(UnitCategory::Home)    { stats.home_units += 1; }
            if unit.is(UnitCategory::Work)    { stats.work_units += 1; }
            if unit.is(UnitCategory::Visit)   { stats.visit_units += 1; }
            if unit.is(UnitCategory::Student) { stats.student_units += 1; }

            let occupied = unit.occupied_count() as u32;
            stats.occupied_slots += occupied;
            stats.free_slots += unit.slots.len() as u32 - occupied;
        })?;

        Ok(stats)
    }

    // Every occupant in the building's units must point back at the
    // building for each category its unit carries.
    pub fn verify_back_references(&self, building: BuildingId) -> Result<Vec<BackRefViolation>, LedgerError> {
        let mut violations = Vec::new();

        self.for_each_unit(building, |unit_ref, unit| {
            for occupant_id in unit.occupants() {
                let occupant = self.store.occupant(occupant_id);
                for category in unit.categories.iter() {
                    let points_at = occupant.and_then(|occupant| occupant.back_ref(category));
                    if points_at != Some(building) {
                        violations.push(BackRefViolation {
                            unit: unit_ref,
                            occupant: occupant_id,
                            category,
                            points_at,
                        });
                    }
                }
            }
        })?;

        Ok(violations)
    }
}
