use std::collections::HashSet;

use super::*;
use crate::{
    building::{BuildingId, BuildingRecord, Footprint, Level, PrefabInfo, SubCategory},
    error::LedgerError,
    occupant::{Occupant, OccupantId, Tier}
};

// ----------------------------------------------
// Test helpers
// ----------------------------------------------

struct Fixture {
    pool: SlabUnitPool,
    store: MemoryStore,
}

impl Fixture {
    fn new() -> Self {
        Self::with_capacity(1024)
    }

    fn with_capacity(capacity: usize) -> Self {
        Self { pool: SlabUnitPool::with_capacity(capacity), store: MemoryStore::new() }
    }

    fn ledger(&mut self) -> Ledger<'_> {
        Ledger::new(&mut self.pool, &mut self.store)
    }

    fn add_building(&mut self, sub_category: SubCategory) -> BuildingId {
        let prefab = PrefabInfo::new("test_building", sub_category, Footprint::new(16.0, 16.0), 12.0);
        self.store.add_building(BuildingRecord::new(&prefab, Level::Level1))
    }

    fn add_occupants(&mut self, count: usize, tier: Tier) -> Vec<OccupantId> {
        (0..count).map(|_| self.store.add_occupant(Occupant::with_tier(tier))).collect()
    }

    fn occupant(&self, id: OccupantId) -> &Occupant {
        self.store.occupant(id).unwrap()
    }

    fn head(&self, building: BuildingId) -> UnitRef {
        self.store.building(building).unwrap().head.unwrap()
    }

    // Walks the list directly on the pool and returns the unit handles.
    fn units(&self, building: BuildingId) -> Vec<UnitRef> {
        let mut units = Vec::new();
        let mut current = self.store.building(building).unwrap().head;
        while let Some(unit_ref) = current {
            units.push(unit_ref);
            current = self.pool.unit(unit_ref).unwrap().next;
        }
        units
    }

    // Both directions of the back-reference invariant for one category.
    fn assert_back_refs(&mut self, building: BuildingId, category: UnitCategory) {
        let mut listed = HashSet::new();
        for unit_ref in self.units(building) {
            let unit = self.pool.unit(unit_ref).unwrap();
            if unit.is(category) {
                listed.extend(unit.occupants());
            }
        }

        assert!(self.ledger().verify_back_references(building).unwrap().is_empty());

        for (id, occupant) in self.store.occupants() {
            if occupant.back_ref(category) == Some(building) {
                assert!(listed.contains(&id), "{id} references {building} but has no slot there");
            }
        }
    }
}

// Hands out pre-recorded rolls, then keeps returning zero.
struct ScriptedDice {
    rolls: Vec<u32>,
    next: usize,
}

impl ScriptedDice {
    fn new(rolls: &[u32]) -> Self {
        Self { rolls: rolls.to_vec(), next: 0 }
    }
}

impl TierDice for ScriptedDice {
    fn roll_percent(&mut self) -> u32 {
        let roll = self.rolls.get(self.next).copied().unwrap_or(0);
        self.next += 1;
        roll
    }
}

// Residential building with `units` home units filled with `occupants` people.
fn filled_house(fixture: &mut Fixture, units: u32, occupants: usize) -> (BuildingId, Vec<OccupantId>) {
    let building = fixture.add_building(SubCategory::ResidentialLow);
    let people = fixture.add_occupants(occupants, Tier::Uneducated);

    let mut ledger = fixture.ledger();
    ledger.initialize_building(building, UnitCategory::Home).unwrap();
    ledger.ensure_units(building, UnitCategory::Home, units).unwrap();
    for &person in &people {
        ledger.assign_occupant(building, UnitCategory::Home, person).unwrap();
    }

    (building, people)
}

// ----------------------------------------------
// Pool
// ----------------------------------------------

#[test]
fn test_stale_unit_handles() {
    let mut pool = SlabUnitPool::with_capacity(4);

    let first = pool.alloc_unit(UnitCategory::Home).unwrap();
    assert!(pool.unit(first).is_some());
    assert!(pool.release_unit(first));
    assert!(!pool.release_unit(first));
    assert!(pool.unit(first).is_none());

    // Same slot, new generation.
    let second = pool.alloc_unit(UnitCategory::Work).unwrap();
    assert_eq!(first.index(), second.index());
    assert_ne!(first, second);
    assert!(pool.unit(first).is_none());

    let unit = pool.unit(second).unwrap();
    assert_eq!(unit.categories, UnitCategory::Work);
    assert_eq!(unit.occupied_count(), 0);
    assert!(unit.next.is_none());
}

#[test]
fn test_pool_capacity() {
    let mut pool = SlabUnitPool::with_capacity(2);
    pool.alloc_unit(UnitCategory::Home).unwrap();
    pool.alloc_unit(UnitCategory::Home).unwrap();

    match pool.alloc_unit(UnitCategory::Home) {
        Err(LedgerError::PoolExhausted { capacity }) => assert_eq!(capacity, 2),
        other => panic!("Expected PoolExhausted, got {other:?}"),
    }
    assert_eq!(pool.units_in_use(), 2);
}

// ----------------------------------------------
// Reconciliation
// ----------------------------------------------

#[test]
fn test_reconcile_three_units_to_seven_occupants() {
    let mut fixture = Fixture::new();
    let (building, people) = filled_house(&mut fixture, 3, 15);
    assert_eq!(fixture.units(building).len(), 3);

    let report = fixture.ledger()
        .reconcile_category_with(building, UnitCategory::Home, Allowance::Occupants(7))
        .unwrap();

    assert_eq!(report, ReconcileReport { evicted_units: 1, evicted_occupants: 5 });
    assert_eq!(fixture.units(building).len(), 2);
    assert_eq!(fixture.pool.units_in_use(), 2);

    // Units fill in list order, so the last five people lived in the evicted unit.
    for &person in &people[..10] {
        assert_eq!(fixture.occupant(person).home, Some(building));
    }
    for &person in &people[10..] {
        assert_eq!(fixture.occupant(person).home, None);
    }

    fixture.assert_back_refs(building, UnitCategory::Home);
}

#[test]
fn test_reconcile_households() {
    let mut fixture = Fixture::new();
    let (building, _) = filled_house(&mut fixture, 4, 12);

    // Home targets count households: one per unit.
    let report = fixture.ledger().reconcile_category(building, UnitCategory::Home, 2).unwrap();
    assert_eq!(report.evicted_units, 2);
    assert_eq!(report.evicted_occupants, 2);
    assert_eq!(fixture.units(building).len(), 2);
    assert_eq!(Allowance::Units(2).units_retained(), 2);
    assert_eq!(Allowance::Occupants(7).units_retained(), 2);

    fixture.assert_back_refs(building, UnitCategory::Home);
}

#[test]
fn test_reconcile_is_idempotent() {
    let mut fixture = Fixture::new();
    let (building, _) = filled_house(&mut fixture, 5, 20);

    let first = fixture.ledger().reconcile_category(building, UnitCategory::Home, 3).unwrap();
    assert_eq!(first.evicted_units, 2);

    let second = fixture.ledger().reconcile_category(building, UnitCategory::Home, 3).unwrap();
    assert_eq!(second, ReconcileReport::default());
    assert_eq!(fixture.units(building).len(), 3);
}

#[test]
fn test_reconcile_never_removes_head() {
    let mut fixture = Fixture::new();
    let (building, people) = filled_house(&mut fixture, 3, 11);
    let head = fixture.head(building);

    let report = fixture.ledger().reconcile_category(building, UnitCategory::Home, 0).unwrap();
    assert_eq!(report.evicted_units, 2);
    assert_eq!(report.evicted_occupants, 6);
    assert_eq!(fixture.units(building), vec![head]);

    // Head occupants stay.
    for &person in &people[..5] {
        assert_eq!(fixture.occupant(person).home, Some(building));
    }

    fixture.assert_back_refs(building, UnitCategory::Home);
}

#[test]
fn test_reconcile_uninitialized_and_unknown_buildings() {
    let mut fixture = Fixture::new();
    let building = fixture.add_building(SubCategory::ResidentialLow);

    let report = fixture.ledger().reconcile_category(building, UnitCategory::Home, 0).unwrap();
    assert_eq!(report, ReconcileReport::default());

    let unknown = BuildingId(999);
    assert!(matches!(fixture.ledger().reconcile_category(unknown, UnitCategory::Home, 1),
                     Err(LedgerError::UnknownBuilding(id)) if id == unknown));
}

#[test]
fn test_reconcile_leaves_other_categories() {
    let mut fixture = Fixture::new();
    let building = fixture.add_building(SubCategory::CommercialLow);
    let workers = fixture.add_occupants(10, Tier::Educated);
    let visitors = fixture.add_occupants(10, Tier::Uneducated);

    {
        let mut ledger = fixture.ledger();
        ledger.initialize_building(building, UnitCategory::empty()).unwrap();
        for &worker in &workers {
            ledger.assign_occupant(building, UnitCategory::Work, worker).unwrap();
        }
        for &visitor in &visitors {
            ledger.assign_occupant(building, UnitCategory::Visit, visitor).unwrap();
        }
    }

    // List: Work(head), Visit, Work, Visit.
    assert_eq!(fixture.units(building).len(), 4);

    let report = fixture.ledger().reconcile_category(building, UnitCategory::Work, 5).unwrap();
    assert_eq!(report, ReconcileReport { evicted_units: 1, evicted_occupants: 5 });

    let stats = fixture.ledger().list_stats(building).unwrap();
    assert_eq!(stats.work_units, 1);
    assert_eq!(stats.visit_units, 2);
    assert_eq!(stats.units_of(UnitCategory::Work | UnitCategory::Visit), 3);
    assert_eq!(stats.occupied_slots, 15);

    for &visitor in &visitors {
        assert_eq!(fixture.occupant(visitor).visit, Some(building));
    }

    fixture.assert_back_refs(building, UnitCategory::Work);
    fixture.assert_back_refs(building, UnitCategory::Visit);
}

#[test]
fn test_reconcile_all_categories_single_pass() {
    let mut fixture = Fixture::new();
    let building = fixture.add_building(SubCategory::CommercialHigh);

    {
        let mut ledger = fixture.ledger();
        ledger.initialize_building(building, UnitCategory::empty()).unwrap();
        ledger.ensure_units(building, UnitCategory::Work, 3).unwrap();
        ledger.ensure_units(building, UnitCategory::Visit, 2).unwrap();
    }

    // List: Work(head), Visit, Work, Work, Visit. Home is not used by shops.
    let report = fixture.ledger().reconcile_all_categories(building, 40, 6, 5, 0).unwrap();
    assert_eq!(report.evicted_units, 2);

    let stats = fixture.ledger().list_stats(building).unwrap();
    assert_eq!(stats.units, 3);
    assert_eq!(stats.work_units, 2);
    assert_eq!(stats.visit_units, 1);
    assert_eq!(stats.home_units, 0);
}

#[test]
fn test_multi_category_unit_retained_by_any_allowance() {
    let mut fixture = Fixture::new();
    let building = fixture.add_building(SubCategory::CommercialLow);
    let person = fixture.add_occupants(1, Tier::Uneducated)[0];

    // Host-built list: Work(head) -> Work|Visit holding one person on both sides.
    let head = fixture.pool.alloc_unit(UnitCategory::Work).unwrap();
    let shared = fixture.pool.alloc_unit(UnitCategory::Work | UnitCategory::Visit).unwrap();
    fixture.pool.unit_mut(head).unwrap().next = Some(shared);
    fixture.pool.unit_mut(shared).unwrap().slots[0] = Some(person);
    fixture.store.building_mut(building).unwrap().head = Some(head);
    {
        let occupant = fixture.store.occupant_mut(person).unwrap();
        occupant.work = Some(building);
        occupant.visit = Some(building);
    }

    // Work runs out at the head, but Visit still keeps the shared unit.
    let keep = Allowances::new()
        .with(UnitCategory::Work, Allowance::Occupants(5))
        .with(UnitCategory::Visit, Allowance::Occupants(5));
    let report = fixture.ledger().reconcile(building, keep).unwrap();
    assert_eq!(report, ReconcileReport::default());
    assert_eq!(fixture.units(building), vec![head, shared]);

    // Neither category retains it now: both back-references go.
    let trim = Allowances::new()
        .with(UnitCategory::Work, Allowance::Occupants(5))
        .with(UnitCategory::Visit, Allowance::Occupants(0));
    let report = fixture.ledger().reconcile(building, trim).unwrap();
    assert_eq!(report, ReconcileReport { evicted_units: 1, evicted_occupants: 1 });
    assert_eq!(fixture.units(building), vec![head]);
    assert!(fixture.pool.unit(shared).is_none());

    let occupant = fixture.occupant(person);
    assert_eq!(occupant.work, None);
    assert_eq!(occupant.visit, None);
}

#[test]
fn test_eviction_keeps_references_to_other_buildings() {
    let mut fixture = Fixture::new();
    let building = fixture.add_building(SubCategory::ResidentialLow);
    let elsewhere = fixture.add_building(SubCategory::ResidentialLow);
    let person = fixture.add_occupants(1, Tier::Uneducated)[0];

    // Slot says `building` while the person already points elsewhere.
    let head = fixture.pool.alloc_unit(UnitCategory::Home).unwrap();
    let tail = fixture.pool.alloc_unit(UnitCategory::Home).unwrap();
    fixture.pool.unit_mut(head).unwrap().next = Some(tail);
    fixture.pool.unit_mut(tail).unwrap().slots[0] = Some(person);
    fixture.store.building_mut(building).unwrap().head = Some(head);
    fixture.store.occupant_mut(person).unwrap().home = Some(elsewhere);

    let report = fixture.ledger().reconcile_category(building, UnitCategory::Home, 1).unwrap();
    assert_eq!(report.evicted_units, 1);
    assert_eq!(fixture.occupant(person).home, Some(elsewhere));
}

// ----------------------------------------------
// Corruption
// ----------------------------------------------

fn looping_house(fixture: &mut Fixture) -> (BuildingId, Vec<UnitRef>) {
    let (building, _) = filled_house(fixture, 3, 0);
    let units = fixture.units(building);
    // Tail links back to the second unit.
    fixture.pool.unit_mut(units[2]).unwrap().next = Some(units[1]);
    (building, units)
}

#[test]
fn test_find_cycle() {
    let mut fixture = Fixture::new();
    let (healthy, _) = filled_house(&mut fixture, 4, 0);
    let head = fixture.head(healthy);
    assert!(fixture.ledger().find_cycle(head).is_none());

    let (building, units) = looping_house(&mut fixture);
    assert_eq!(fixture.ledger().find_cycle(units[0]), Some(units[1]));
    assert!(fixture.ledger().list_stats(building).unwrap_err().is_corruption());
}

#[test]
fn test_reconcile_cycle_hits_iteration_ceiling() {
    let mut fixture = Fixture::new();
    let (building, _) = looping_house(&mut fixture);

    let result = fixture.ledger()
        .with_cycle_check(false)
        .with_iteration_limit(64)
        .reconcile_category(building, UnitCategory::Home, 100);

    match result {
        Err(LedgerError::CorruptList { building: id, iterations, partial }) => {
            assert_eq!(id, building);
            assert_eq!(iterations, 64);
            assert_eq!(partial, ReconcileReport::default());
        },
        other => panic!("Expected CorruptList, got {other:?}"),
    }
}

#[test]
fn test_reconcile_cycle_check_rejects_before_walking() {
    let mut fixture = Fixture::new();
    let (building, units) = looping_house(&mut fixture);

    let result = fixture.ledger()
        .with_cycle_check(true)
        .reconcile_category(building, UnitCategory::Home, 0);

    assert!(matches!(result, Err(LedgerError::CorruptList { iterations: 0, .. })));
    // Nothing was released.
    for unit_ref in units {
        assert!(fixture.pool.unit(unit_ref).is_some());
    }
}

#[test]
fn test_reconcile_stale_link_is_corruption() {
    let mut fixture = Fixture::new();
    let (building, _) = filled_house(&mut fixture, 3, 0);
    let units = fixture.units(building);

    // Release the middle unit behind the ledger's back.
    fixture.pool.release_unit(units[1]);

    let result = fixture.ledger().reconcile_category(building, UnitCategory::Home, 5);
    let err = result.unwrap_err();
    assert!(err.is_corruption());
    assert!(matches!(err, LedgerError::CorruptList { iterations: 1, .. }));
}

#[test]
fn test_reconcile_loop_to_head_keeps_head() {
    let mut fixture = Fixture::new();
    let (building, _) = filled_house(&mut fixture, 3, 0);
    let units = fixture.units(building);

    // Tail links back to the head.
    fixture.pool.unit_mut(units[2]).unwrap().next = Some(units[0]);

    let result = fixture.ledger()
        .with_cycle_check(false)
        .reconcile_category(building, UnitCategory::Home, 1);

    match result {
        Err(LedgerError::CorruptList { iterations, partial, .. }) => {
            assert_eq!(iterations, 3);
            assert_eq!(partial, ReconcileReport { evicted_units: 2, evicted_occupants: 0 });
        },
        other => panic!("Expected CorruptList, got {other:?}"),
    }

    assert_eq!(fixture.head(building), units[0]);
    assert!(fixture.pool.unit(units[0]).is_some());
    assert_eq!(fixture.pool.units_in_use(), 1);
}

// ----------------------------------------------
// Growth
// ----------------------------------------------

#[test]
fn test_initialize_building() {
    let mut fixture = Fixture::new();
    let school = fixture.add_building(SubCategory::School);

    let head = fixture.ledger().initialize_building(school, UnitCategory::empty()).unwrap();
    assert_eq!(fixture.head(school), head);

    let stats = fixture.ledger().list_stats(school).unwrap();
    assert_eq!(stats.units, 2);
    assert_eq!(stats.work_units, 1);
    assert_eq!(stats.student_units, 1);
    assert_eq!(stats.free_slots, 10);

    // Second call is a no-op.
    assert_eq!(fixture.ledger().initialize_building(school, UnitCategory::Home).unwrap(), head);
    assert_eq!(fixture.pool.units_in_use(), 2);
}

#[test]
fn test_ensure_units_is_all_or_nothing() {
    let mut fixture = Fixture::with_capacity(3);
    let building = fixture.add_building(SubCategory::ResidentialLow);
    fixture.ledger().initialize_building(building, UnitCategory::Home).unwrap();

    let result = fixture.ledger().ensure_units(building, UnitCategory::Home, 5);
    assert!(matches!(result, Err(LedgerError::PoolExhausted { capacity: 3 })));
    assert_eq!(fixture.pool.units_in_use(), 1);
    assert_eq!(fixture.units(building).len(), 1);

    assert_eq!(fixture.ledger().ensure_units(building, UnitCategory::Home, 3).unwrap(), 2);
    assert_eq!(fixture.ledger().ensure_units(building, UnitCategory::Home, 3).unwrap(), 0);
    assert_eq!(fixture.units(building).len(), 3);
}

#[test]
fn test_ensure_units_beyond_pool_capacity() {
    let mut fixture = Fixture::with_capacity(8);
    let building = fixture.add_building(SubCategory::ResidentialLow);
    fixture.ledger().initialize_building(building, UnitCategory::Home).unwrap();

    let result = fixture.ledger().ensure_units(building, UnitCategory::Home, u32::MAX);
    assert!(matches!(result, Err(LedgerError::PoolExhausted { capacity: 8 })));
    assert_eq!(fixture.pool.units_in_use(), 1);
    assert_eq!(fixture.units(building).len(), 1);
}

#[test]
fn test_assign_grows_list() {
    let mut fixture = Fixture::new();
    let building = fixture.add_building(SubCategory::ResidentialHigh);
    let people = fixture.add_occupants(12, Tier::Uneducated);

    {
        let mut ledger = fixture.ledger();
        for &person in &people {
            ledger.assign_occupant(building, UnitCategory::Home, person).unwrap();
        }
        // Assigning twice keeps the original slot.
        let unit = ledger.find_occupant(building, UnitCategory::Home, people[0]).unwrap();
        assert_eq!(ledger.assign_occupant(building, UnitCategory::Home, people[0]).ok(), unit);
    }

    let stats = fixture.ledger().list_stats(building).unwrap();
    assert_eq!(stats.units, 3);
    assert_eq!(stats.occupied_slots, 12);
    fixture.assert_back_refs(building, UnitCategory::Home);
}

#[test]
fn test_assign_moves_between_buildings() {
    let mut fixture = Fixture::new();
    let old_home = fixture.add_building(SubCategory::ResidentialLow);
    let new_home = fixture.add_building(SubCategory::ResidentialLow);
    let person = fixture.add_occupants(1, Tier::Uneducated)[0];

    fixture.ledger().assign_occupant(old_home, UnitCategory::Home, person).unwrap();
    fixture.ledger().assign_occupant(new_home, UnitCategory::Home, person).unwrap();

    assert_eq!(fixture.occupant(person).home, Some(new_home));
    assert_eq!(fixture.ledger().list_stats(old_home).unwrap().occupied_slots, 0);
    assert_eq!(fixture.ledger().list_stats(new_home).unwrap().occupied_slots, 1);
    fixture.assert_back_refs(old_home, UnitCategory::Home);
    fixture.assert_back_refs(new_home, UnitCategory::Home);
}

#[test]
fn test_assign_pool_exhausted_leaves_back_refs() {
    let mut fixture = Fixture::with_capacity(2);
    let full = fixture.add_building(SubCategory::ResidentialLow);
    let other = fixture.add_building(SubCategory::ResidentialLow);
    let residents = fixture.add_occupants(5, Tier::Uneducated);
    let mover = fixture.add_occupants(1, Tier::Uneducated)[0];

    {
        let mut ledger = fixture.ledger();
        for &resident in &residents {
            ledger.assign_occupant(full, UnitCategory::Home, resident).unwrap();
        }
        ledger.assign_occupant(other, UnitCategory::Home, mover).unwrap();
    }

    let result = fixture.ledger().assign_occupant(full, UnitCategory::Home, mover);
    assert!(matches!(result, Err(LedgerError::PoolExhausted { .. })));

    // Mover still lives where it was.
    assert_eq!(fixture.occupant(mover).home, Some(other));
    assert!(fixture.ledger().find_occupant(other, UnitCategory::Home, mover).unwrap().is_some());
    assert_eq!(fixture.pool.units_in_use(), 2);
}

#[test]
fn test_remove_occupant() {
    let mut fixture = Fixture::new();
    let (building, people) = filled_house(&mut fixture, 1, 3);

    assert!(fixture.ledger().remove_occupant(building, UnitCategory::Home, people[1]).unwrap());
    assert!(!fixture.ledger().remove_occupant(building, UnitCategory::Home, people[1]).unwrap());
    assert_eq!(fixture.occupant(people[1]).home, None);
    assert_eq!(fixture.ledger().list_stats(building).unwrap().occupied_slots, 2);

    let unknown = OccupantId(777);
    assert!(matches!(fixture.ledger().remove_occupant(building, UnitCategory::Home, unknown),
                     Err(LedgerError::UnknownOccupant(_))));

    fixture.assert_back_refs(building, UnitCategory::Home);
}

// ----------------------------------------------
// Tier rebalancing
// ----------------------------------------------

fn staffed_office(fixture: &mut Fixture, tiers: &[Tier]) -> (BuildingId, Vec<OccupantId>) {
    let building = fixture.add_building(SubCategory::OfficeGeneric);
    let workers: Vec<OccupantId> = tiers.iter()
        .map(|tier| fixture.store.add_occupant(Occupant::with_tier(*tier)))
        .collect();

    let mut ledger = fixture.ledger();
    for &worker in &workers {
        ledger.assign_occupant(building, UnitCategory::Work, worker).unwrap();
    }

    (building, workers)
}

#[test]
fn test_rebalance_promotes_then_evicts() {
    let mut fixture = Fixture::new();
    let (building, workers) = staffed_office(&mut fixture, &[Tier::Uneducated, Tier::Uneducated]);

    // Tier 0 has two too many, tier 1 is two short.
    let mut dice = ScriptedDice::new(&[80, 10]);
    let report = fixture.ledger().rebalance_tiers(building, [0, 2, 0, 0], &mut dice).unwrap();

    assert_eq!(report.promoted, 1);
    assert_eq!(report.evicted, 1);
    assert_eq!(report.before, [2, 0, 0, 0]);
    assert_eq!(report.after, [0, 1, 0, 0]);
    assert_eq!(report.remaining, [0, 1, 0, 0]);

    assert_eq!(fixture.occupant(workers[0]).tier, Tier::Educated);
    assert_eq!(fixture.occupant(workers[0]).work, Some(building));
    assert_eq!(fixture.occupant(workers[1]).tier, Tier::Uneducated);
    assert_eq!(fixture.occupant(workers[1]).work, None);

    fixture.assert_back_refs(building, UnitCategory::Work);
}

#[test]
fn test_rebalance_roll_thresholds() {
    let mut fixture = Fixture::new();

    // Tier 2 needs more than 50 + 30.
    let (building, workers) = staffed_office(&mut fixture, &[Tier::WellEducated, Tier::WellEducated]);
    let mut dice = ScriptedDice::new(&[80, 81]);
    let report = fixture.ledger().rebalance_tiers(building, [0, 0, 0, 2], &mut dice).unwrap();

    assert_eq!(report.promoted, 1);
    assert_eq!(report.evicted, 1);
    assert_eq!(fixture.occupant(workers[0]).work, None);
    assert_eq!(fixture.occupant(workers[1]).tier, Tier::HighlyEducated);
}

#[test]
fn test_rebalance_without_deficit_only_evicts() {
    let mut fixture = Fixture::new();
    let (building, _) = staffed_office(&mut fixture, &[Tier::HighlyEducated, Tier::HighlyEducated, Tier::Educated]);

    // Top tier can't be promoted; no rolls should be drawn.
    let mut dice = ScriptedDice::new(&[]);
    let report = fixture.ledger().rebalance_tiers(building, [0, 1, 0, 1], &mut dice).unwrap();

    assert_eq!(report.promoted, 0);
    assert_eq!(report.evicted, 1);
    assert_eq!(dice.next, 0);
    assert_eq!(report.after, [0, 1, 0, 1]);
}

#[test]
fn test_rebalance_conservation() {
    let mut fixture = Fixture::new();
    let tiers: Vec<Tier> = (0..40).map(|i| Tier::from_index(i % 3)).collect();
    let (building, _) = staffed_office(&mut fixture, &tiers);

    let targets = [4, 10, 12, 14];
    let mut rng = new_random_generator(crate::constants::DEFAULT_RANDOM_SEED);
    let report = fixture.ledger().rebalance_tiers(building, targets, &mut rng).unwrap();

    let before: u32 = report.before.iter().sum();
    let after: u32 = report.after.iter().sum();
    let remaining: i32 = report.remaining.iter().sum();
    let target_total: u32 = targets.iter().sum();

    assert_eq!(before, 40);
    assert_eq!(after + report.evicted, before);
    assert_eq!(after as i32 + remaining, target_total as i32);

    let stats = fixture.ledger().list_stats(building).unwrap();
    assert_eq!(stats.occupied_slots, after);
    fixture.assert_back_refs(building, UnitCategory::Work);
}

#[test]
fn test_rebalance_eviction_clears_every_category() {
    let mut fixture = Fixture::new();
    let building = fixture.add_building(SubCategory::CommercialLow);
    let person = fixture.add_occupants(1, Tier::Uneducated)[0];

    // Host-built Work|Visit unit holding one person on both sides.
    let shared = fixture.pool.alloc_unit(UnitCategory::Work | UnitCategory::Visit).unwrap();
    fixture.pool.unit_mut(shared).unwrap().slots[0] = Some(person);
    fixture.store.building_mut(building).unwrap().head = Some(shared);
    {
        let occupant = fixture.store.occupant_mut(person).unwrap();
        occupant.work = Some(building);
        occupant.visit = Some(building);
    }

    let mut dice = ScriptedDice::new(&[]);
    let report = fixture.ledger().rebalance_tiers(building, [0, 0, 0, 0], &mut dice).unwrap();
    assert_eq!(report.evicted, 1);

    let occupant = fixture.occupant(person);
    assert_eq!(occupant.work, None);
    assert_eq!(occupant.visit, None);
    assert_eq!(fixture.pool.unit(shared).unwrap().occupied_count(), 0);
    assert!(fixture.ledger().verify_back_references(building).unwrap().is_empty());
}

#[test]
fn test_rebalance_huge_targets_stay_in_deficit() {
    let mut fixture = Fixture::new();
    let (building, workers) = staffed_office(&mut fixture, &[Tier::Uneducated]);

    let mut dice = ScriptedDice::new(&[90]);
    let report = fixture.ledger().rebalance_tiers(building, [0, u32::MAX, 0, 0], &mut dice).unwrap();

    assert_eq!(report.promoted, 1);
    assert_eq!(report.evicted, 0);
    assert_eq!(report.remaining, [0, i32::MAX - 1, 0, 0]);
    assert_eq!(fixture.occupant(workers[0]).tier, Tier::Educated);
}
