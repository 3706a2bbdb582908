use slab::Slab;

use crate::{
    building::{BuildingId, BuildingRecord},
    occupant::{Occupant, OccupantId}
};

// ----------------------------------------------
// OccupantStore
// ----------------------------------------------

// Host building and person buffers, as far as the ledger needs them.
pub trait OccupantStore {
    fn building(&self, id: BuildingId) -> Option<&BuildingRecord>;
    fn building_mut(&mut self, id: BuildingId) -> Option<&mut BuildingRecord>;

    fn occupant(&self, id: OccupantId) -> Option<&Occupant>;
    fn occupant_mut(&mut self, id: OccupantId) -> Option<&mut Occupant>;
}

// ----------------------------------------------
// MemoryStore
// ----------------------------------------------

// Plain in-memory store. Hosts without their own buffers and tests use this.
#[derive(Default)]
pub struct MemoryStore {
    buildings: Slab<BuildingRecord>,
    occupants: Slab<Occupant>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_building(&mut self, record: BuildingRecord) -> BuildingId {
        let key = self.buildings.insert(record);
        BuildingId(key as u32)
    }

    pub fn add_occupant(&mut self, occupant: Occupant) -> OccupantId {
        let key = self.occupants.insert(occupant);
        OccupantId(key as u32)
    }

    #[inline]
    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    #[inline]
    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    pub fn buildings(&self) -> impl Iterator<Item = (BuildingId, &BuildingRecord)> {
        self.buildings.iter().map(|(key, record)| (BuildingId(key as u32), record))
    }

    pub fn occupants(&self) -> impl Iterator<Item = (OccupantId, &Occupant)> {
        self.occupants.iter().map(|(key, occupant)| (OccupantId(key as u32), occupant))
    }
}

impl OccupantStore for MemoryStore {
    #[inline]
    fn building(&self, id: BuildingId) -> Option<&BuildingRecord> {
        self.buildings.get(id.0 as usize)
    }

    #[inline]
    fn building_mut(&mut self, id: BuildingId) -> Option<&mut BuildingRecord> {
        self.buildings.get_mut(id.0 as usize)
    }

    #[inline]
    fn occupant(&self, id: OccupantId) -> Option<&Occupant> {
        self.occupants.get(id.0 as usize)
    }

    #[inline]
    fn occupant_mut(&mut self, id: OccupantId) -> Option<&mut Occupant> {
        self.occupants.get_mut(id.0 as usize)
    }
}
