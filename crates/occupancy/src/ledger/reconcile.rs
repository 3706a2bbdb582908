use smallvec::SmallVec;

use common::log;

use crate::{
    building::BuildingId,
    constants::UNIT_SLOT_COUNT,
    occupant::OccupantId,
    error::LedgerError
};

use super::{
    Ledger,
    UnitRef,
    UnitCategory,
    Allowance,
    Allowances,
    ReconcileReport
};

// ----------------------------------------------
// Reconciliation
// ----------------------------------------------

impl Ledger<'_> {
    // Trims the building's units of `category` down to `target`, in the
    // category's default currency (households for Home, occupants otherwise).
    pub fn reconcile_category(&mut self,
                              building: BuildingId,
                              category: UnitCategory,
                              target: u32) -> Result<ReconcileReport, LedgerError> {
        self.reconcile_category_with(building, category, category.default_allowance(target))
    }

    pub fn reconcile_category_with(&mut self,
                                   building: BuildingId,
                                   category: UnitCategory,
                                   allowance: Allowance) -> Result<ReconcileReport, LedgerError> {
        debug_assert!(category.is_single());
        self.reconcile(building, Allowances::new().with(category, allowance))
    }

    // One pass over the list for every category the building uses. A unit
    // carrying several flags stays as long as any of them still has allowance.
    pub fn reconcile_all_categories(&mut self,
                                    building: BuildingId,
                                    home_target: u32,
                                    work_target: u32,
                                    visit_target: u32,
                                    student_target: u32) -> Result<ReconcileReport, LedgerError> {
        let usage = self.store
            .building(building)
            .ok_or(LedgerError::UnknownBuilding(building))?
            .usage;

        let mut allowances = Allowances::new();
        for (category, target) in [
            (UnitCategory::Home,    home_target),
            (UnitCategory::Work,    work_target),
            (UnitCategory::Visit,   visit_target),
            (UnitCategory::Student, student_target),
        ] {
            if usage.contains(category) {
                allowances = allowances.with(category, category.default_allowance(target));
            }
        }

        if allowances.categories().is_empty() {
            return Ok(ReconcileReport::default());
        }

        self.reconcile(building, allowances)
    }

    pub fn reconcile(&mut self,
                     building: BuildingId,
                     mut allowances: Allowances) -> Result<ReconcileReport, LedgerError> {
        let reconciled = allowances.categories();
        let mut report = ReconcileReport::default();

        let head = match self.head_of(building)? {
            Some(head) => head,
            None => return Ok(report), // Uninitialized, nothing to trim.
        };

        if self.check_cycles {
            if let Some(repeated) = self.find_cycle(head) {
                log::error!(log::channel!("ledger"), "Unit list of {building} loops back at unit {repeated}.");
                return Err(LedgerError::CorruptList { building, iterations: 0, partial: report });
            }
        }

        // The head is always retained, but it still uses up its share.
        let head_unit = self.pool.unit(head).ok_or(LedgerError::StaleUnit(head))?;
        allowances.consume(head_unit.categories & reconciled);

        let mut previous = head;
        let mut current = head_unit.next;
        let mut iterations = 0;

        while let Some(current_ref) = current {
            if iterations >= self.iteration_limit {
                return Err(self.list_corrupted(building, iterations, report));
            }
            iterations += 1;

            // Looped back to the head. It must never be released, cycle check or not.
            if current_ref == head {
                return Err(self.list_corrupted(building, iterations, report));
            }

            let (categories, slots, next) = match self.pool.unit(current_ref) {
                Some(unit) => (unit.categories, unit.slots, unit.next),
                None => {
                    // Link to a released unit; the rest of the list is unreachable.
                    log::error!(log::channel!("ledger"), "Unit list of {building} links stale unit {current_ref}.");
                    return Err(LedgerError::CorruptList { building, iterations, partial: report });
                }
            };

            let matched = categories & reconciled;
            if matched.is_empty() || allowances.consume(matched) {
                // Retained.
                previous = current_ref;
            } else {
                report.evicted_occupants += self.evict_unit(building, categories, &slots);
                self.unlink_and_release(previous, current_ref, next);
                report.evicted_units += 1;
            }

            current = next;
        }

        if report.evicted_units != 0 {
            log::verbose!(log::channel!("ledger"),
                          "{building}: evicted {} units ({} occupants) for {reconciled}.",
                          report.evicted_units, report.evicted_occupants);
        }

        Ok(report)
    }

    // Clears back-references of every occupant in the unit, for every category
    // the unit carries, as long as they still point at this building.
    fn evict_unit(&mut self,
                  building: BuildingId,
                  categories: UnitCategory,
                  slots: &[Option<OccupantId>; UNIT_SLOT_COUNT]) -> u32 {
        let occupants: SmallVec<[OccupantId; UNIT_SLOT_COUNT]> = slots.iter().flatten().copied().collect();

        for &occupant_id in &occupants {
            match self.store.occupant_mut(occupant_id) {
                Some(occupant) => {
                    for category in categories.iter() {
                        occupant.clear_back_ref_if(category, building);
                    }
                },
                None => {
                    log::warn!(log::channel!("ledger"), "{building}: evicting unknown occupant {occupant_id}.");
                }
            }
        }

        occupants.len() as u32
    }

    fn unlink_and_release(&mut self, previous: UnitRef, removed: UnitRef, next: Option<UnitRef>) {
        if let Some(previous_unit) = self.pool.unit_mut(previous) {
            debug_assert!(previous_unit.next == Some(removed));
            previous_unit.next = next;
        }

        // Detach before handing it back so nothing reachable still points at it.
        if let Some(removed_unit) = self.pool.unit_mut(removed) {
            removed_unit.next = None;
        }

        let released = self.pool.release_unit(removed);
        debug_assert!(released, "Failed to release unit {removed}!");
    }

    pub(super) fn head_of(&self, building: BuildingId) -> Result<Option<UnitRef>, LedgerError> {
        self.store
            .building(building)
            .map(|record| record.head)
            .ok_or(LedgerError::UnknownBuilding(building))
    }

    #[cold]
    pub(super) fn list_corrupted(&self,
                                 building: BuildingId,
                                 iterations: usize,
                                 partial: ReconcileReport) -> LedgerError {
        log::error!(log::channel!("ledger"),
                    "Unit list of {building} is corrupted after {iterations} iterations; aborting pass (partial: {partial:?}).");
        LedgerError::CorruptList { building, iterations, partial }
    }
}
