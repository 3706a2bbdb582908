use std::{io, path::PathBuf};
use thiserror::Error;

use crate::{
    building::BuildingId,
    occupant::OccupantId,
    ledger::{UnitRef, ReconcileReport}
};

// ----------------------------------------------
// LedgerError
// ----------------------------------------------

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("occupant unit pool exhausted (capacity {capacity})")]
    PoolExhausted { capacity: usize },

    #[error("unit list of building {building} is corrupted after {iterations} iterations")]
    CorruptList {
        building: BuildingId,
        iterations: usize,
        partial: ReconcileReport,
    },

    #[error("unknown building {0}")]
    UnknownBuilding(BuildingId),

    #[error("unknown occupant {0}")]
    UnknownOccupant(OccupantId),

    #[error("stale occupant unit handle {0}")]
    StaleUnit(UnitRef),
}

impl LedgerError {
    // Conditions the caller must react to, as opposed to a diagnostic
    // where the ledger kept whatever partial state it reached.
    #[inline]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptList { .. } | Self::StaleUnit(_))
    }
}

// ----------------------------------------------
// ConfigError
// ----------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse occupancy config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read occupancy config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("duplicate calculation pack `{0}`")]
    DuplicatePack(String),

    #[error("calculation pack `{0}` has no level parameters")]
    EmptyPack(String),

    #[error("unknown calculation pack `{0}`")]
    UnknownPack(String),

    #[error("calculation pack `{pack}` is for {pack_service} buildings, not {wanted}")]
    ServiceMismatch {
        pack: String,
        pack_service: String,
        wanted: String,
    },
}
