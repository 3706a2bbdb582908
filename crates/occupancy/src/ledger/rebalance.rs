use std::ops::ControlFlow;
use rand::{Rng, SeedableRng};

use common::log;

use crate::{
    building::BuildingId,
    constants::*,
    occupant::{OccupantId, Tier, TIER_COUNT},
    error::LedgerError
};

use super::{
    Ledger,
    UnitRef,
    UnitCategory,
    RebalanceReport
};

// ----------------------------------------------
// RandomGenerator / TierDice
// ----------------------------------------------

pub type RandomGenerator = rand_pcg::Pcg64;

#[inline]
pub fn new_random_generator(seed: u64) -> RandomGenerator {
    RandomGenerator::seed_from_u64(seed)
}

// Source of promotion rolls, uniform in [0,100).
pub trait TierDice {
    fn roll_percent(&mut self) -> u32;
}

impl TierDice for RandomGenerator {
    #[inline]
    fn roll_percent(&mut self) -> u32 {
        self.random_range(0..100)
    }
}

#[inline]
fn promotion_succeeds(roll: u32, tier: Tier) -> bool {
    (roll as i32) - PROMOTION_TIER_PENALTY * (tier.index() as i32) > PROMOTION_THRESHOLD
}

// ----------------------------------------------
// Tier rebalancing
// ----------------------------------------------

impl Ledger<'_> {
    // Single best-effort pass over the building's Work units moving the
    // workforce towards `tier_targets`. Surplus workers are promoted into a
    // deficit tier right above theirs if the roll allows it, otherwise
    // evicted. Repeated passes converge over time.
    pub fn rebalance_tiers(&mut self,
                           building: BuildingId,
                           tier_targets: [u32; TIER_COUNT],
                           dice: &mut dyn TierDice) -> Result<RebalanceReport, LedgerError> {
        let mut report = RebalanceReport::default();

        // Gather workers first; the pass below mutates units and occupants.
        let mut workers: Vec<(UnitRef, usize, OccupantId, UnitCategory)> = Vec::new();
        self.walk_units(building, |unit_ref, unit| {
            if unit.is(UnitCategory::Work) {
                for (slot, occupant) in unit.slots.iter().enumerate() {
                    if let Some(occupant) = occupant {
                        workers.push((unit_ref, slot, *occupant, unit.categories));
                    }
                }
            }
            ControlFlow::Continue(())
        })?;

        for &(_, _, occupant_id, _) in &workers {
            match self.store.occupant(occupant_id) {
                Some(occupant) => report.before[occupant.tier.index()] += 1,
                None => log::warn!(log::channel!("ledger"), "{building}: unknown worker {occupant_id}."),
            }
        }

        for tier in 0..TIER_COUNT {
            let target = i32::try_from(tier_targets[tier]).unwrap_or(i32::MAX);
            let present = i32::try_from(report.before[tier]).unwrap_or(i32::MAX);
            report.remaining[tier] = target.saturating_sub(present);
        }
        report.after = report.before;

        for (unit_ref, slot, occupant_id, categories) in workers {
            let tier = match self.store.occupant(occupant_id) {
                Some(occupant) => occupant.tier,
                None => continue,
            };

            let t = tier.index();
            if report.remaining[t] >= 0 {
                continue; // Not in surplus.
            }

            if !tier.is_top() && report.remaining[t + 1] > 0 {
                let roll = dice.roll_percent();
                if promotion_succeeds(roll, tier) {
                    if let Some(occupant) = self.store.occupant_mut(occupant_id) {
                        occupant.tier = tier.next();
                    }
                    report.remaining[t]     += 1;
                    report.remaining[t + 1] -= 1;
                    report.after[t]         -= 1;
                    report.after[t + 1]     += 1;
                    report.promoted += 1;
                    continue;
                }
            }

            // Surplus and not promoted: evict. The slot is gone for every
            // category the unit carries, not just Work.
            if let Some(unit) = self.pool.unit_mut(unit_ref) {
                debug_assert!(unit.slots[slot] == Some(occupant_id));
                unit.slots[slot] = None;
            }
            if let Some(occupant) = self.store.occupant_mut(occupant_id) {
                for category in categories.iter() {
                    occupant.clear_back_ref_if(category, building);
                }
            }
            report.remaining[t] += 1;
            report.after[t]     -= 1;
            report.evicted += 1;
        }

        if report.promoted != 0 || report.evicted != 0 {
            log::verbose!(log::channel!("ledger"),
                          "{building}: promoted {}, evicted {} workers (remaining {:?}).",
                          report.promoted, report.evicted, report.remaining);
        }

        Ok(report)
    }
}
