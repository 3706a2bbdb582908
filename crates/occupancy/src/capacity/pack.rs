use arrayvec::ArrayVec;
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use common::hash::{self, StringHash};

use crate::{
    building::{Level, LEVEL_COUNT, PrefabInfo, Service},
    constants::*,
    error::ConfigError,
    occupant::TIER_COUNT
};

// ----------------------------------------------
// PackVersion
// ----------------------------------------------

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum PackVersion {
    // Footprint times whole floors, with the override/bonus tables.
    #[default]
    Legacy,
    // Ground floor plus upper floors, with densification.
    Volumetric,
    // User-tuned volumetric parameters.
    Custom,
}

// ----------------------------------------------
// LevelParams
// ----------------------------------------------

// Per-level pack parameters. Lengths in metres, areas in square metres.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelParams {
    pub floor_height: f32,
    pub area_per_unit: f32,
    pub first_floor_min: f32,
    pub first_floor_max: f32,
    pub first_floor_empty: bool,
    pub multi_floor_units: bool,
    pub densification_percent: u32,
    pub tier_weights: [u32; TIER_COUNT],
}

impl LevelParams {
    pub const DEFAULT: Self = Self {
        floor_height: 3.0,
        area_per_unit: 50.0,
        first_floor_min: 3.0,
        first_floor_max: 4.5,
        first_floor_empty: false,
        multi_floor_units: false,
        densification_percent: 0,
        tier_weights: [40, 30, 20, 10],
    };

    #[inline]
    pub fn floor_height(&self) -> f64 {
        positive_or(self.floor_height, MIN_FLOOR_HEIGHT)
    }

    #[inline]
    pub fn area_per_unit(&self) -> f64 {
        positive_or(self.area_per_unit, MIN_AREA_PER_UNIT)
    }

    // Ground floor height range, with the bounds put in order.
    #[inline]
    pub fn first_floor_range(&self) -> (f64, f64) {
        let min = positive_or(self.first_floor_min, MIN_FLOOR_HEIGHT);
        let max = positive_or(self.first_floor_max, MIN_FLOOR_HEIGHT);
        (min.min(max), min.max(max))
    }
}

impl Default for LevelParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// Non-positive and NaN parameters fall back to `min`.
#[inline]
fn positive_or(value: f32, min: f64) -> f64 {
    let value = value as f64;
    if value >= min { value } else { min }
}

// ----------------------------------------------
// CapacityModel
// ----------------------------------------------

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Estimate {
    pub floors: u32,
    pub base: u32,
}

// Raw capacity of a prefab, before minimums and overrides.
#[enum_dispatch(PackModel)]
pub trait CapacityModel {
    fn estimate(&self, prefab: &PrefabInfo, params: &LevelParams) -> Estimate;
}

#[enum_dispatch]
pub enum PackModel {
    LegacyModel,
    VolumetricModel,
}

pub struct LegacyModel;

impl CapacityModel for LegacyModel {
    fn estimate(&self, prefab: &PrefabInfo, params: &LevelParams) -> Estimate {
        let area = prefab.footprint.area();
        let floors = (prefab.clamped_height() / params.floor_height()).floor().max(1.0);
        let base = (area * floors / params.area_per_unit()).floor();

        Estimate { floors: floors as u32, base: base as u32 }
    }
}

pub struct VolumetricModel;

impl CapacityModel for VolumetricModel {
    fn estimate(&self, prefab: &PrefabInfo, params: &LevelParams) -> Estimate {
        let area = prefab.footprint.area();
        let height = prefab.clamped_height();

        // A building lower than the ground floor minimum still has one floor.
        let (first_min, first_max) = params.first_floor_range();
        let first_floor = height.max(first_min).min(first_max);
        let upper_floors = ((height - first_floor).max(0.0) / params.floor_height()).floor();
        // Float to int casts saturate; absurd heights end up at u32::MAX floors.
        let floors = 1u32.saturating_add(upper_floors as u32);

        let usable = if params.first_floor_empty && floors > 1 { floors - 1 } else { floors };

        let base = if params.multi_floor_units {
            (area * usable as f64 / params.area_per_unit()).floor() as u32
        } else {
            ((area / params.area_per_unit()).floor() as u32).saturating_mul(usable)
        };

        let densified = (base as u64).saturating_mul(100 + params.densification_percent as u64) / 100;

        Estimate { floors, base: u32::try_from(densified).unwrap_or(u32::MAX) }
    }
}

// ----------------------------------------------
// CalculationPack
// ----------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationPack {
    pub name: String,
    pub service: Service,
    pub version: PackVersion,
    pub levels: ArrayVec<LevelParams, LEVEL_COUNT>,
}

impl Default for CalculationPack {
    fn default() -> Self {
        Self {
            name: String::new(),
            service: Service::Residential,
            version: PackVersion::Legacy,
            levels: ArrayVec::new(),
        }
    }
}

impl CalculationPack {
    pub fn new(name: &str, service: Service, version: PackVersion, levels: &[LevelParams]) -> Self {
        Self {
            name: name.to_string(),
            service,
            version,
            levels: levels.iter().take(LEVEL_COUNT).cloned().collect(),
        }
    }

    #[inline]
    pub fn name_hash(&self) -> StringHash {
        hash::fnv1a_from_str(&self.name)
    }

    #[inline]
    pub fn is_legacy(&self) -> bool {
        self.version == PackVersion::Legacy
    }

    // Levels past the last defined one reuse the last one.
    pub fn level(&self, level: Level) -> &LevelParams {
        self.levels
            .get(level.index())
            .or(self.levels.last())
            .unwrap_or(&LevelParams::DEFAULT)
    }

    pub fn model(&self) -> PackModel {
        match self.version {
            PackVersion::Legacy => LegacyModel.into(),
            PackVersion::Volumetric | PackVersion::Custom => VolumetricModel.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.levels.is_empty() {
            return Err(ConfigError::EmptyPack(self.name.clone()));
        }
        Ok(())
    }
}

// ----------------------------------------------
// Built-in packs
// ----------------------------------------------

pub fn default_pack_name(service: Service) -> &'static str {
    match service {
        Service::Residential => "legacy_residential",
        Service::Commercial  => "legacy_commercial",
        Service::Industrial  => "legacy_industrial",
        Service::Office      => "legacy_office",
        Service::Education   => "legacy_education",
    }
}

const fn legacy_level(floor_height: f32, area_per_unit: f32, tier_weights: [u32; TIER_COUNT]) -> LevelParams {
    LevelParams {
        floor_height,
        area_per_unit,
        tier_weights,
        ..LevelParams::DEFAULT
    }
}

const fn volumetric_level(area_per_unit: f32,
                          first_floor_empty: bool,
                          densification_percent: u32,
                          tier_weights: [u32; TIER_COUNT]) -> LevelParams {
    LevelParams {
        floor_height: 3.0,
        area_per_unit,
        first_floor_min: 3.0,
        first_floor_max: 6.0,
        first_floor_empty,
        multi_floor_units: true,
        densification_percent,
        tier_weights,
    }
}

// Packs every engine starts with. Each service has a legacy default;
// residential and office also ship a volumetric alternative.
pub fn builtin_packs() -> Vec<CalculationPack> {
    vec![
        CalculationPack::new(
            default_pack_name(Service::Residential), Service::Residential, PackVersion::Legacy, &[
            legacy_level(10.0, 50.0,  [100, 0, 0, 0]),
            legacy_level(10.0, 45.0,  [100, 0, 0, 0]),
            legacy_level(10.0, 40.0,  [100, 0, 0, 0]),
            legacy_level(10.0, 35.0,  [100, 0, 0, 0]),
            legacy_level(10.0, 30.0,  [100, 0, 0, 0]),
        ]),
        CalculationPack::new(
            "volumetric_residential", Service::Residential, PackVersion::Volumetric, &[
            volumetric_level(140.0, false, 0,  [100, 0, 0, 0]),
            volumetric_level(130.0, false, 0,  [100, 0, 0, 0]),
            volumetric_level(120.0, false, 5,  [100, 0, 0, 0]),
            volumetric_level(110.0, false, 10, [100, 0, 0, 0]),
            volumetric_level(100.0, false, 15, [100, 0, 0, 0]),
        ]),
        CalculationPack::new(
            default_pack_name(Service::Commercial), Service::Commercial, PackVersion::Legacy, &[
            legacy_level(5.0, 100.0, [75, 20, 5,  0]),
            legacy_level(5.0, 90.0,  [25, 40, 25, 10]),
            legacy_level(5.0, 80.0,  [5,  15, 30, 50]),
        ]),
        CalculationPack::new(
            default_pack_name(Service::Industrial), Service::Industrial, PackVersion::Legacy, &[
            legacy_level(8.0, 120.0, [100, 0,  0,  0]),
            legacy_level(8.0, 110.0, [20,  60, 20, 0]),
            legacy_level(8.0, 100.0, [5,   15, 30, 50]),
        ]),
        CalculationPack::new(
            default_pack_name(Service::Office), Service::Office, PackVersion::Legacy, &[
            legacy_level(4.0, 60.0, [2, 8,  20, 70]),
            legacy_level(4.0, 50.0, [1, 5,  14, 80]),
            legacy_level(4.0, 40.0, [1, 0,  9,  90]),
        ]),
        CalculationPack::new(
            "volumetric_office", Service::Office, PackVersion::Volumetric, &[
            volumetric_level(34.0, true, 0, [2, 8,  20, 70]),
            volumetric_level(30.0, true, 0, [1, 5,  14, 80]),
            volumetric_level(26.0, true, 0, [1, 0,  9,  90]),
        ]),
        CalculationPack::new(
            default_pack_name(Service::Education), Service::Education, PackVersion::Legacy, &[
            legacy_level(4.0, 80.0, [0, 20, 40, 40]),
        ]),
    ]
}
