use serde::{Deserialize, Serialize};
use strum::EnumCount;
use strum_macros::{Display, EnumCount, EnumIter};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use common::hash::{self, StringHash};

use crate::{
    constants::DEGENERATE_FOOTPRINT_SCALE,
    ledger::{UnitCategory, UnitRef}
};

// ----------------------------------------------
// BuildingId
// ----------------------------------------------

// Host-owned building handle. The ledger never allocates these.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildingId(pub u32);

impl std::fmt::Display for BuildingId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "B#{}", self.0)
    }
}

// ----------------------------------------------
// PrefabId
// ----------------------------------------------

// Identity of a building prefab (asset), derived from its name. Used as the
// key of the capacity caches and the override tables.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrefabId(pub StringHash);

impl PrefabId {
    #[inline]
    pub const fn from_name(name: &str) -> Self {
        Self(hash::fnv1a_from_str(name))
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != hash::NULL_HASH
    }
}

impl std::fmt::Display for PrefabId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// ----------------------------------------------
// Level
// ----------------------------------------------

#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[derive(Display, EnumCount, EnumIter, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize)]
pub enum Level {
    Level1,
    Level2,
    Level3,
    Level4,
    Level5,
}

pub const LEVEL_COUNT: usize = Level::COUNT;

impl Level {
    #[inline]
    #[must_use]
    pub fn min() -> Level {
        Self::Level1
    }

    #[inline]
    #[must_use]
    pub fn max() -> Level {
        Self::Level5
    }

    // Out of range levels are coerced to the nearest valid one.
    #[inline]
    #[must_use]
    pub fn from_index(index: usize) -> Level {
        let clamped = index.min(LEVEL_COUNT - 1) as u32;
        Level::try_from(clamped).unwrap_or(Self::Level1)
    }

    #[inline]
    pub fn index(self) -> usize {
        let value: u32 = self.into();
        value as usize
    }

    #[inline]
    pub fn is_max(self) -> bool {
        self == Self::max()
    }

    #[inline]
    pub fn is_min(self) -> bool {
        self == Self::min()
    }

    #[inline]
    #[must_use]
    pub fn next(self) -> Level {
        Self::from_index(self.index() + 1)
    }

    #[inline]
    #[must_use]
    pub fn prev(self) -> Level {
        Self::from_index(self.index().saturating_sub(1))
    }
}

// ----------------------------------------------
// Service / SubCategory
// ----------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum Service {
    Residential,
    Commercial,
    Industrial,
    Office,
    Education,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumCount, EnumIter, Serialize, Deserialize)]
pub enum SubCategory {
    ResidentialLow,
    ResidentialHigh,
    ResidentialLowEco,
    ResidentialHighEco,
    CommercialLow,
    CommercialHigh,
    CommercialLeisure,
    CommercialTourist,
    CommercialEco,
    IndustrialGeneric,
    IndustrialFarming,
    IndustrialForestry,
    IndustrialOil,
    IndustrialOre,
    OfficeGeneric,
    OfficeHighTech,
    School,
}

impl SubCategory {
    pub fn service(self) -> Service {
        match self {
            Self::ResidentialLow
            | Self::ResidentialHigh
            | Self::ResidentialLowEco
            | Self::ResidentialHighEco => Service::Residential,

            Self::CommercialLow
            | Self::CommercialHigh
            | Self::CommercialLeisure
            | Self::CommercialTourist
            | Self::CommercialEco => Service::Commercial,

            Self::IndustrialGeneric
            | Self::IndustrialFarming
            | Self::IndustrialForestry
            | Self::IndustrialOil
            | Self::IndustrialOre => Service::Industrial,

            Self::OfficeGeneric
            | Self::OfficeHighTech => Service::Office,

            Self::School => Service::Education,
        }
    }

    #[inline]
    pub fn is_high_density_residential(self) -> bool {
        matches!(self, Self::ResidentialHigh | Self::ResidentialHighEco)
    }

    // Occupant unit categories a building of this kind threads into its list.
    pub fn usage(self) -> UnitCategory {
        match self.service() {
            Service::Residential => UnitCategory::Home,
            Service::Commercial  => UnitCategory::Work | UnitCategory::Visit,
            Service::Industrial  => UnitCategory::Work,
            Service::Office      => UnitCategory::Work,
            Service::Education   => UnitCategory::Work | UnitCategory::Student,
        }
    }
}

// ----------------------------------------------
// Footprint
// ----------------------------------------------

// Building mesh extents in metres, plus the lot size in cells. The lot size is
// only consulted when the mesh reports a degenerate extent.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub width: f32,
    pub length: f32,
    pub lot_width: u32,
    pub lot_length: u32,
}

impl Footprint {
    #[inline]
    pub const fn new(width: f32, length: f32) -> Self {
        Self { width, length, lot_width: 1, lot_length: 1 }
    }

    #[inline]
    pub const fn with_lot(mut self, lot_width: u32, lot_length: u32) -> Self {
        self.lot_width = lot_width;
        self.lot_length = lot_length;
        self
    }

    #[inline]
    fn coerce_axis(extent: f32, lot_cells: u32) -> f64 {
        let extent = extent as f64;
        // NaN compares false, so it lands on the fallback too.
        if extent > 1.0 {
            extent
        } else {
            lot_cells.max(1) as f64 * DEGENERATE_FOOTPRINT_SCALE
        }
    }

    // Floor area in square metres, with degenerate axes replaced.
    pub fn area(&self) -> f64 {
        Self::coerce_axis(self.width, self.lot_width) *
        Self::coerce_axis(self.length, self.lot_length)
    }
}

// ----------------------------------------------
// PrefabInfo
// ----------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrefabInfo {
    pub name: String,
    pub id: PrefabId,
    pub sub_category: SubCategory,
    pub footprint: Footprint,
    pub height: f32,
}

impl PrefabInfo {
    pub fn new(name: &str, sub_category: SubCategory, footprint: Footprint, height: f32) -> Self {
        Self {
            name: name.to_string(),
            id: PrefabId::from_name(name),
            sub_category,
            footprint,
            height,
        }
    }

    #[inline]
    pub fn service(&self) -> Service {
        self.sub_category.service()
    }

    // Negative or NaN heights are treated as zero.
    #[inline]
    pub fn clamped_height(&self) -> f64 {
        let height = self.height as f64;
        if height > 0.0 { height } else { 0.0 }
    }
}

// ----------------------------------------------
// BuildingRecord
// ----------------------------------------------

// The slice of a host building record the ledger reads and writes.
#[derive(Clone, Debug)]
pub struct BuildingRecord {
    pub prefab: PrefabId,
    pub level: Level,
    pub usage: UnitCategory,
    pub head: Option<UnitRef>,
}

impl BuildingRecord {
    pub fn new(prefab: &PrefabInfo, level: Level) -> Self {
        Self {
            prefab: prefab.id,
            level,
            usage: prefab.sub_category.usage(),
            head: None,
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.head.is_some()
    }
}
