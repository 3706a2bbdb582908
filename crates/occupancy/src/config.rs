use std::path::Path;
use serde::{Serialize, Deserialize, de::DeserializeOwned};

use common::log;

use crate::{
    building::{PrefabId, SubCategory},
    capacity::{CalculationPack, CapacityEngine, CapacityKind},
    constants::*,
    error::ConfigError,
    ledger::{SlabUnitPool, RandomGenerator, new_random_generator}
};

// ----------------------------------------------
// Configs
// ----------------------------------------------

pub trait Configs {
    // Fixes up values a hand-edited file may get wrong.
    fn post_load(&mut self) {
    }

    fn from_json_str(json: &str) -> Result<Self, ConfigError>
        where Self: Configs + Sized + DeserializeOwned
    {
        let mut configs: Self = serde_json::from_str(json)?;
        configs.post_load();
        Ok(configs)
    }

    fn to_json_string(&self) -> Result<String, ConfigError>
        where Self: Serialize
    {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn try_load_file(path: &Path) -> Result<Self, ConfigError>
        where Self: Configs + Sized + DeserializeOwned
    {
        let json = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_json_str(&json)
    }

    // Either succeeds loading the config file or returns a default config.
    fn load_file_or_default(path: &Path) -> Self
        where Self: Configs + Sized + Default + DeserializeOwned
    {
        match Self::try_load_file(path) {
            Ok(configs) => configs,
            Err(err) => {
                log::error!(log::channel!("config"), "Failed to load config file {path:?}: {err}");
                let mut configs = Self::default();
                configs.post_load();
                configs
            }
        }
    }

    // Saves current configs to file.
    fn save_file(&self, path: &Path) -> bool
        where Self: Serialize
    {
        let json = match self.to_json_string() {
            Ok(json) => json,
            Err(err) => {
                log::error!(log::channel!("config"), "Failed to serialize config for {path:?}: {err}");
                return false;
            }
        };

        if let Err(err) = std::fs::write(path, json) {
            log::error!(log::channel!("config"), "Failed to write config file {path:?}: {err}");
            return false;
        }

        true
    }
}

// ----------------------------------------------
// LedgerConfigs
// ----------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)] // Missing fields in the config file get defaults from LedgerConfigs::default().
pub struct LedgerConfigs {
    pub iteration_limit: usize,
    pub check_cycles: bool,
    pub random_seed: u64,
    pub unit_pool_capacity: usize,
}

impl Default for LedgerConfigs {
    fn default() -> Self {
        Self {
            iteration_limit: MAX_LIST_ITERATIONS,
            check_cycles: cfg!(debug_assertions),
            random_seed: DEFAULT_RANDOM_SEED,
            unit_pool_capacity: DEFAULT_UNIT_POOL_CAPACITY,
        }
    }
}

impl Configs for LedgerConfigs {
    fn post_load(&mut self) {
        self.iteration_limit = self.iteration_limit.clamp(1, MAX_LIST_ITERATIONS);
        self.unit_pool_capacity = self.unit_pool_capacity.max(1);
    }
}

impl LedgerConfigs {
    pub fn new_unit_pool(&self) -> SlabUnitPool {
        SlabUnitPool::with_capacity(self.unit_pool_capacity)
    }

    pub fn new_rng(&self) -> RandomGenerator {
        new_random_generator(self.random_seed)
    }
}

// ----------------------------------------------
// OccupancyConfigs
// ----------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackSelection {
    pub sub_category: SubCategory,
    pub pack: String,
}

// Override or bonus value for the prefab with the given name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrefabValue {
    pub prefab: String,
    pub value: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)] // Missing fields in the config file get defaults from OccupancyConfigs::default().
pub struct OccupancyConfigs {
    // Debug Log:
    pub log_level: log::Level,
    pub log_source_location: bool,
    pub log_tty_colors: bool,
    pub log_to_stdout: bool,

    // Calculation packs on top of the built-in ones:
    pub packs: Vec<CalculationPack>,
    pub selections: Vec<PackSelection>,

    // Per-prefab adjustments:
    pub household_overrides: Vec<PrefabValue>,
    pub household_bonuses: Vec<PrefabValue>,
    pub workplace_overrides: Vec<PrefabValue>,
    pub workplace_bonuses: Vec<PrefabValue>,

    pub ledger: LedgerConfigs,
}

impl Default for OccupancyConfigs {
    fn default() -> Self {
        Self {
            log_level: log::Level::default(),
            log_source_location: false,
            log_tty_colors: true,
            log_to_stdout: true,
            packs: Vec::new(),
            selections: Vec::new(),
            household_overrides: Vec::new(),
            household_bonuses: Vec::new(),
            workplace_overrides: Vec::new(),
            workplace_bonuses: Vec::new(),
            ledger: LedgerConfigs::default(),
        }
    }
}

impl Configs for OccupancyConfigs {
    fn post_load(&mut self) {
        self.ledger.post_load();
    }
}

impl OccupancyConfigs {
    // Global logger settings. Affects every engine and ledger in the process.
    pub fn apply_logging(&self) {
        log::set_level(self.log_level);
        log::enable_source_location(self.log_source_location);
        log::enable_tty_colors(self.log_tty_colors);
        log::enable_stdout(self.log_to_stdout);
    }

    // Engine with the built-in packs plus everything configured here.
    // Packs are registered before selections are resolved.
    pub fn build_engine(&self) -> Result<CapacityEngine, ConfigError> {
        let engine = CapacityEngine::new();

        for pack in &self.packs {
            engine.register_pack(pack.clone())?;
        }

        for selection in &self.selections {
            engine.select_pack(selection.sub_category, &selection.pack)?;
        }

        let tables = [
            (CapacityKind::Households, &self.household_overrides, &self.household_bonuses),
            (CapacityKind::Workplaces, &self.workplace_overrides, &self.workplace_bonuses),
        ];

        for (kind, overrides, bonuses) in tables {
            for entry in overrides {
                engine.set_override(kind, PrefabId::from_name(&entry.prefab), entry.value);
            }
            for entry in bonuses {
                engine.set_bonus(kind, PrefabId::from_name(&entry.prefab), entry.value);
            }
        }

        Ok(engine)
    }
}
