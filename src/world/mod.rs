//! Read-only model of the authoritative game world
//!
//! The game rules live on the server. The client only needs enough of the
//! module to resolve identities, find nearby characters, judge hostility
//! and price inventory items. `WorldView` is that seam.

pub mod character;
pub mod inventory;
pub mod skill;
pub mod snapshot;

pub use character::{Attitude, Character, ChatMessage, UseError};
pub use inventory::{Inventory, Item};
pub use skill::{Requirement, Skill};
pub use snapshot::{ModuleData, WorldObject, WorldSnapshot};

use crate::core::types::ObjectId;

/// What an identity resolves to in the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Character,
    Object,
}

/// Queries the client makes against the authoritative world
pub trait WorldView {
    /// Character with this identity, if any
    fn resolve(&self, id: &ObjectId) -> Option<&Character>;

    /// Kind of entity with this identity, if any
    fn kind_of(&self, id: &ObjectId) -> Option<EntityKind>;

    /// Characters in the origin's area within `radius`, nearest first
    fn nearby(&self, origin: &Character, radius: f32) -> Vec<&Character>;

    fn is_hostile(&self, subject: &Character, other: &Character) -> bool {
        !other.agony() && subject.attitude_for(other) == Attitude::Hostile
    }

    /// Value of an item in `owner`'s inventory
    fn item_value(&self, owner: &Character, item: &ObjectId) -> Option<u64> {
        owner.inventory.item(item).map(|it| it.value)
    }
}
