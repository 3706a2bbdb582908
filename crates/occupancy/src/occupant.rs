use serde::{Deserialize, Serialize};
use strum::EnumCount;
use strum_macros::{Display, EnumCount, EnumIter};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    building::BuildingId,
    ledger::UnitCategory
};

// ----------------------------------------------
// OccupantId
// ----------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OccupantId(pub u32);

impl std::fmt::Display for OccupantId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "C#{}", self.0)
    }
}

// ----------------------------------------------
// Tier
// ----------------------------------------------

// Workforce skill level, from uneducated to highly educated.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Default, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[derive(Display, EnumCount, EnumIter, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize)]
pub enum Tier {
    #[default]
    Uneducated,
    Educated,
    WellEducated,
    HighlyEducated,
}

pub const TIER_COUNT: usize = Tier::COUNT;

impl Tier {
    #[inline]
    pub fn index(self) -> usize {
        let value: u32 = self.into();
        value as usize
    }

    #[inline]
    pub fn is_top(self) -> bool {
        self == Self::HighlyEducated
    }

    #[inline]
    #[must_use]
    pub fn from_index(index: usize) -> Tier {
        let clamped = index.min(TIER_COUNT - 1) as u32;
        Tier::try_from(clamped).unwrap_or_default()
    }

    #[inline]
    #[must_use]
    pub fn next(self) -> Tier {
        Self::from_index(self.index() + 1)
    }
}

// ----------------------------------------------
// Occupant
// ----------------------------------------------

// Host-owned person record. One back-reference per category; the Student
// category shares the work reference (a school is a student's workplace).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Occupant {
    pub home: Option<BuildingId>,
    pub work: Option<BuildingId>,
    pub visit: Option<BuildingId>,
    pub tier: Tier,
}

impl Occupant {
    #[inline]
    pub fn with_tier(tier: Tier) -> Self {
        Self { tier, ..Default::default() }
    }

    #[inline]
    fn slot(&self, category: UnitCategory) -> Option<&Option<BuildingId>> {
        if category == UnitCategory::Home {
            Some(&self.home)
        } else if category == UnitCategory::Work || category == UnitCategory::Student {
            Some(&self.work)
        } else if category == UnitCategory::Visit {
            Some(&self.visit)
        } else {
            None
        }
    }

    #[inline]
    fn slot_mut(&mut self, category: UnitCategory) -> Option<&mut Option<BuildingId>> {
        if category == UnitCategory::Home {
            Some(&mut self.home)
        } else if category == UnitCategory::Work || category == UnitCategory::Student {
            Some(&mut self.work)
        } else if category == UnitCategory::Visit {
            Some(&mut self.visit)
        } else {
            None
        }
    }

    // `category` must be a single flag; anything else has no back-reference.
    #[inline]
    pub fn back_ref(&self, category: UnitCategory) -> Option<BuildingId> {
        self.slot(category).copied().flatten()
    }

    #[inline]
    pub fn set_back_ref(&mut self, category: UnitCategory, building: Option<BuildingId>) {
        debug_assert!(category.is_single());
        if let Some(slot) = self.slot_mut(category) {
            *slot = building;
        }
    }

    // Clears the back-reference only if it still names `building`.
    // Returns true if something was cleared.
    pub fn clear_back_ref_if(&mut self, category: UnitCategory, building: BuildingId) -> bool {
        match self.slot_mut(category) {
            Some(slot) if *slot == Some(building) => {
                *slot = None;
                true
            },
            _ => false,
        }
    }
}
