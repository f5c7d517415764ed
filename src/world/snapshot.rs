//! Authoritative world snapshot
//!
//! The server sends the whole module on every update push. The client
//! never patches it in place: a new push builds a new `WorldSnapshot`,
//! which replaces the old one wholesale.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{ObjectId, Position};
use crate::spatial::SparseHashGrid;
use crate::world::character::Character;
use crate::world::{EntityKind, WorldView};

/// Cell size of the per-area proximity grids
const GRID_CELL_SIZE: f32 = 50.0;

/// Non-character object placed on the map (chests, doors, signs)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldObject {
    pub id: String,
    pub serial: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub position: Position,
}

impl WorldObject {
    pub fn object_id(&self) -> ObjectId {
        ObjectId::new(self.id.clone(), self.serial.clone())
    }
}

/// Module data as carried by the update push
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleData {
    pub id: String,
    pub characters: Vec<Character>,
    pub objects: Vec<WorldObject>,
}

/// Indexed, read-only view of one authoritative generation
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    data: ModuleData,
    characters: AHashMap<ObjectId, usize>,
    objects: AHashMap<ObjectId, usize>,
    grids: AHashMap<String, SparseHashGrid>,
}

impl WorldSnapshot {
    pub fn new(mut data: ModuleData) -> Self {
        let mut characters = AHashMap::new();
        let mut grids: AHashMap<String, SparseHashGrid> = AHashMap::new();

        for (idx, c) in data.characters.iter_mut().enumerate() {
            // Spawn point defaults to where the server first placed us
            if c.home.is_none() {
                c.home = Some(c.position);
            }
            let oid = c.object_id();
            if characters.contains_key(&oid) {
                tracing::warn!(id = %oid, "duplicate character in module, keeping first");
                continue;
            }
            grids
                .entry(c.area.clone())
                .or_insert_with(|| SparseHashGrid::new(GRID_CELL_SIZE))
                .insert(oid.clone(), c.position);
            characters.insert(oid, idx);
        }

        let mut objects = AHashMap::new();
        for (idx, o) in data.objects.iter().enumerate() {
            objects.entry(o.object_id()).or_insert(idx);
        }

        Self {
            data,
            characters,
            objects,
            grids,
        }
    }

    pub fn module_id(&self) -> &str {
        &self.data.id
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }
}

impl Default for WorldSnapshot {
    fn default() -> Self {
        Self::new(ModuleData::default())
    }
}

impl From<ModuleData> for WorldSnapshot {
    fn from(data: ModuleData) -> Self {
        Self::new(data)
    }
}

impl WorldView for WorldSnapshot {
    fn resolve(&self, id: &ObjectId) -> Option<&Character> {
        self.characters.get(id).map(|&idx| &self.data.characters[idx])
    }

    fn kind_of(&self, id: &ObjectId) -> Option<EntityKind> {
        if self.characters.contains_key(id) {
            Some(EntityKind::Character)
        } else if self.objects.contains_key(id) {
            Some(EntityKind::Object)
        } else {
            None
        }
    }

    fn nearby(&self, origin: &Character, radius: f32) -> Vec<&Character> {
        let Some(grid) = self.grids.get(&origin.area) else {
            return Vec::new();
        };
        grid.query_radius(origin.position, radius, |oid| {
            self.resolve(oid).map(|c| c.position)
        })
        .iter()
        .filter_map(|oid| self.resolve(oid))
        .collect()
    }
}
