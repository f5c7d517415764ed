//! Skills and their use requirements

use serde::{Deserialize, Serialize};

use crate::core::types::{Millis, ObjectId, Position};

/// Condition that must hold before a skill can be used
///
/// Only target range is evaluated on the client. Every other kind is
/// checked by the server, so unknown kinds deserialize to `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Requirement {
    /// Target must be within `min_range` of the user
    TargetRange { min_range: f32 },
    /// User must have at least this level
    Level { min: u32 },
    #[serde(other)]
    Other,
}

impl Requirement {
    /// Range of a target-range requirement
    pub fn target_range(&self) -> Option<f32> {
        match self {
            Requirement::TargetRange { min_range } => Some(*min_range),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    #[serde(default)]
    pub serial: String,
    /// Remaining cooldown
    #[serde(default)]
    pub cooldown: Millis,
    /// Passive skills are never picked for combat
    #[serde(default)]
    pub passive: bool,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}

impl Skill {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            serial: String::new(),
            cooldown: 0,
            passive: false,
            requirements: Vec::new(),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Millis) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_requirement(mut self, req: Requirement) -> Self {
        self.requirements.push(req);
        self
    }

    pub fn object_id(&self) -> ObjectId {
        ObjectId::new(self.id.clone(), self.serial.clone())
    }

    pub fn ready(&self) -> bool {
        self.cooldown == 0
    }

    /// Usable in combat right now: active and off cooldown
    pub fn combat_ready(&self) -> bool {
        !self.passive && self.ready()
    }

    /// Strictest target range among the requirements, if any
    pub fn required_range(&self) -> Option<f32> {
        self.requirements
            .iter()
            .filter_map(Requirement::target_range)
            .reduce(f32::min)
    }

    /// True when every target-range requirement holds between `user` and
    /// `target`. Skills without range requirements always pass.
    pub fn target_in_range(&self, user: Position, target: Position) -> bool {
        let distance = user.distance(&target);
        self.requirements
            .iter()
            .filter_map(Requirement::target_range)
            .all(|range| distance <= range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_requirement_is_other() {
        let json = r#"{"id":"fireball","requirements":[
            {"type":"target-range","min_range":5.0},
            {"type":"mana","min":10}
        ]}"#;
        let skill: Skill = serde_json::from_str(json).unwrap();
        assert_eq!(skill.requirements.len(), 2);
        assert_eq!(skill.requirements[1], Requirement::Other);
    }

    #[test]
    fn test_required_range_picks_strictest() {
        let skill = Skill::new("slash")
            .with_requirement(Requirement::TargetRange { min_range: 5.0 })
            .with_requirement(Requirement::TargetRange { min_range: 2.0 })
            .with_requirement(Requirement::Level { min: 3 });
        assert_eq!(skill.required_range(), Some(2.0));
    }

    #[test]
    fn test_target_in_range() {
        let skill = Skill::new("slash").with_requirement(Requirement::TargetRange { min_range: 2.0 });
        let user = Position::new(0.0, 0.0);
        assert!(skill.target_in_range(user, Position::new(1.5, 0.0)));
        assert!(skill.target_in_range(user, Position::new(2.0, 0.0)));
        assert!(!skill.target_in_range(user, Position::new(3.0, 0.0)));
    }

    #[test]
    fn test_no_range_requirement_always_in_range() {
        let skill = Skill::new("shout");
        assert!(skill.target_in_range(Position::new(0.0, 0.0), Position::new(100.0, 100.0)));
        assert_eq!(skill.required_range(), None);
    }

    #[test]
    fn test_combat_ready() {
        assert!(Skill::new("a").combat_ready());
        assert!(!Skill::new("a").with_cooldown(200).combat_ready());
        let mut passive = Skill::new("p");
        passive.passive = true;
        assert!(!passive.combat_ready());
    }
}
