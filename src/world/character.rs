//! Authoritative character state as pushed by the server

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{Millis, ObjectId, Position};
use crate::world::inventory::Inventory;
use crate::world::skill::Skill;

/// How one character regards another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attitude {
    Friendly,
    Neutral,
    Hostile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
}

/// Why a local skill use was refused
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UseError {
    #[error("skill not known: {0}")]
    UnknownSkill(String),
    #[error("skill on cooldown: {0}")]
    Cooldown(String),
    #[error("global cooldown active")]
    GlobalCooldown,
    #[error("already casting")]
    Casting,
    #[error("character is incapacitated")]
    Agony,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub serial: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub position: Position,
    /// Spawn point the NPC returns to when idle
    #[serde(default)]
    pub home: Option<Position>,
    #[serde(default)]
    pub dest: Option<Position>,
    #[serde(default)]
    pub race: Option<String>,
    #[serde(default)]
    pub faction: Option<String>,
    /// Factions this character attacks on sight
    #[serde(default)]
    pub enemies: Vec<String>,
    #[serde(default = "default_sight_range")]
    pub sight_range: f32,
    #[serde(default = "default_health")]
    pub health: i64,
    #[serde(default)]
    pub fighting: bool,
    #[serde(default)]
    pub casting: Option<ObjectId>,
    #[serde(default)]
    pub global_cooldown: Millis,
    #[serde(default)]
    pub target: Option<ObjectId>,
    /// Ordered; combat picks the first ready entry
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub chat_log: Vec<ChatMessage>,
}

fn default_sight_range() -> f32 {
    300.0
}

fn default_health() -> i64 {
    1
}

impl Character {
    pub fn new(id: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            serial: serial.into(),
            area: String::new(),
            position: Position::default(),
            home: None,
            dest: None,
            race: None,
            faction: None,
            enemies: Vec::new(),
            sight_range: default_sight_range(),
            health: default_health(),
            fighting: false,
            casting: None,
            global_cooldown: 0,
            target: None,
            skills: Vec::new(),
            inventory: Inventory::default(),
            chat_log: Vec::new(),
        }
    }

    pub fn object_id(&self) -> ObjectId {
        ObjectId::new(self.id.clone(), self.serial.clone())
    }

    pub fn is(&self, id: &ObjectId) -> bool {
        self.id == id.id && self.serial == id.serial
    }

    pub fn home(&self) -> Position {
        self.home.unwrap_or(self.position)
    }

    pub fn dest(&self) -> Position {
        self.dest.unwrap_or(self.position)
    }

    pub fn at_home(&self) -> bool {
        self.position == self.home()
    }

    pub fn moving(&self) -> bool {
        self.dest() != self.position
    }

    pub fn agony(&self) -> bool {
        self.health <= 0
    }

    /// Casting, moving, fighting or incapacitated
    pub fn busy(&self) -> bool {
        self.casting.is_some() || self.moving() || self.fighting || self.agony()
    }

    pub fn attitude_for(&self, other: &Character) -> Attitude {
        if self.is(&other.object_id()) {
            return Attitude::Friendly;
        }
        match other.faction.as_deref() {
            Some(f) if self.enemies.iter().any(|e| e == f) => Attitude::Hostile,
            Some(f) if self.faction.as_deref() == Some(f) => Attitude::Friendly,
            _ => Attitude::Neutral,
        }
    }

    pub fn set_dest(&mut self, pos: Position) {
        self.dest = Some(pos);
    }

    pub fn set_target(&mut self, target: Option<ObjectId>) {
        self.target = target;
    }

    /// Start using a skill locally. The server decides the outcome.
    pub fn use_skill(&mut self, id: &str) -> Result<&Skill, UseError> {
        if self.agony() {
            return Err(UseError::Agony);
        }
        if self.casting.is_some() {
            return Err(UseError::Casting);
        }
        if self.global_cooldown > 0 {
            return Err(UseError::GlobalCooldown);
        }
        let idx = self
            .skills
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| UseError::UnknownSkill(id.to_string()))?;
        if !self.skills[idx].ready() {
            return Err(UseError::Cooldown(id.to_string()));
        }
        self.casting = Some(self.skills[idx].object_id());
        Ok(&self.skills[idx])
    }

    pub fn add_chat_message(&mut self, text: impl Into<String>) {
        self.chat_log.push(ChatMessage { text: text.into() });
    }
}
