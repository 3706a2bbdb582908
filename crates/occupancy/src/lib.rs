// Building occupancy core: target capacities of buildings (households,
// workers per education tier, visitors) and the per-building occupant
// unit lists that are trimmed and rebalanced to match them.

pub mod constants;
pub mod error;
pub mod config;
pub mod building;
pub mod occupant;
pub mod capacity;
pub mod ledger;

pub use error::{LedgerError, ConfigError};
pub use config::{Configs, OccupancyConfigs, LedgerConfigs};
pub use building::{BuildingId, BuildingRecord, Footprint, Level, PrefabId, PrefabInfo, Service, SubCategory};
pub use occupant::{Occupant, OccupantId, Tier};
pub use capacity::{CapacityEngine, CapacityKind, CalculationPack, LevelParams, PackVersion};
pub use ledger::{
    Ledger,
    UnitRef,
    UnitCategory,
    OccupantUnit,
    Allowance,
    Allowances,
    ReconcileReport,
    RebalanceReport,
    UnitPool,
    SlabUnitPool,
    OccupantStore,
    MemoryStore,
    TierDice,
    RandomGenerator
};
