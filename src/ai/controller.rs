//! NPC behavior controller
//!
//! Runs once per tick over the roster. Two timers gate the idle
//! behaviors; targeting and combat run every tick.
//!
//! Per NPC, in order:
//! 1. movement (move timer due): walk home if displaced, else one random step
//! 2. chatter (chat timer due): say a race-keyed line
//! 3. targeting: keep a hostile target or pick the nearest hostile in sight
//! 4. combat (server reports the NPC fighting): close distance or use the
//!    first ready skill
//!
//! A busy NPC, a walk home, or a missing prerequisite ends that NPC's turn
//! early. The first NPC that reaches the end of the list "advances"; with
//! `single_npc_per_tick` the pass stops there.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::ai::npc::Npc;
use crate::ai::roster::RosterTable;
use crate::core::config::AiConfig;
use crate::core::types::{Direction, Millis, ObjectId, Position};
use crate::world::{Character, Skill, WorldView};

/// How far one NPC got this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    /// Turn ended early
    Yielded,
    /// Reached the end of the decision list
    Advanced,
}

/// Summary of one controller pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// NPCs looked at before the pass ended
    pub evaluated: usize,
    /// NPCs that went through the whole decision list
    pub advanced: Vec<ObjectId>,
}

pub struct Controller {
    config: AiConfig,
    move_timer: Millis,
    chat_timer: Millis,
    rng: ChaCha8Rng,
}

impl Controller {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            move_timer: 0,
            chat_timer: 0,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Create with specific RNG seed for deterministic behavior
    pub fn with_seed(config: AiConfig, seed: u64) -> Self {
        Self {
            config,
            move_timer: 0,
            chat_timer: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    #[cfg(test)]
    fn timers(&self) -> (Millis, Millis) {
        (self.move_timer, self.chat_timer)
    }

    /// Advance timers by `delta` and drive the roster for one tick
    ///
    /// While `paused`, no movement, targeting or combat happens; chatter
    /// still does.
    pub fn update(
        &mut self,
        delta: Millis,
        roster: &mut RosterTable,
        world: &dyn WorldView,
        paused: bool,
    ) -> TickReport {
        self.move_timer = self.move_timer.saturating_add(delta);
        self.chat_timer = self.chat_timer.saturating_add(delta);
        let move_due = self.move_timer >= self.config.move_freq;
        let chat_due = self.chat_timer >= self.config.chat_freq;

        let mut report = TickReport::default();
        for npc in roster.values_mut() {
            report.evaluated += 1;
            if self.drive(npc, world, move_due, chat_due, paused) == Turn::Advanced {
                report.advanced.push(npc.id().clone());
                if self.config.single_npc_per_tick {
                    break;
                }
            }
        }

        if move_due {
            self.move_timer = 0;
        }
        if chat_due {
            self.chat_timer = 0;
        }
        report
    }

    fn drive(
        &mut self,
        npc: &mut Npc,
        world: &dyn WorldView,
        move_due: bool,
        chat_due: bool,
        paused: bool,
    ) -> Turn {
        if move_due && !paused {
            if npc.character().busy() {
                return Turn::Yielded;
            }
            if !npc.character().at_home() {
                let home = npc.character().home();
                tracing::trace!(npc = %npc.id(), "returning home");
                npc.set_dest_point(home);
                return Turn::Yielded;
            }
            self.move_around(npc);
        }

        if chat_due {
            if npc.character().busy() {
                return Turn::Yielded;
            }
            self.say_something(npc);
        }

        if paused {
            return Turn::Yielded;
        }

        let target = match self.hostile_target(npc.character(), world) {
            Some(target) => target,
            None => match find_hostile(npc.character(), world) {
                Some(found) => {
                    tracing::debug!(npc = %npc.id(), target = %found.object_id(), "acquired target");
                    npc.set_target(Some(&found.object_id()));
                    found
                }
                None => return Turn::Yielded,
            },
        };

        // Combat state is the server's; targeting alone does not start a fight
        if npc.character().fighting && !fight(npc, target) {
            return Turn::Yielded;
        }
        Turn::Advanced
    }

    /// Current target, if it is still hostile
    fn hostile_target<'w>(&self, npc: &Character, world: &'w dyn WorldView) -> Option<&'w Character> {
        let target = world.resolve(npc.target.as_ref()?)?;
        world.is_hostile(npc, target).then_some(target)
    }

    /// Take one step in a random cardinal direction
    fn move_around(&mut self, npc: &mut Npc) {
        let dir = Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())];
        let dest = npc.character().position + dir.offset();
        tracing::trace!(npc = %npc.id(), ?dir, "wandering");
        npc.set_dest_point(dest);
    }

    /// Say a random line for the NPC's race
    fn say_something(&mut self, npc: &mut Npc) {
        let Some(race) = npc.character().race.clone() else {
            return;
        };
        let text = self
            .config
            .chat_lines
            .get(&race)
            .and_then(|lines| lines.choose(&mut self.rng))
            .cloned()
            .unwrap_or_else(|| format!("random_chat_{}", race));
        npc.add_chat_message(&text);
    }
}

/// Nearest hostile character in sight, excluding the NPC itself
fn find_hostile<'w>(npc: &Character, world: &'w dyn WorldView) -> Option<&'w Character> {
    let me = npc.object_id();
    world
        .nearby(npc, npc.sight_range)
        .into_iter()
        .find(|other| !other.is(&me) && world.is_hostile(npc, other))
}

/// Act against `target`. Returns false when the NPC has no ready skill.
fn fight(npc: &mut Npc, target: &Character) -> bool {
    let Some(skill) = combat_skill(npc.character()).cloned() else {
        tracing::trace!(npc = %npc.id(), "no combat skill ready");
        return false;
    };

    let here = npc.character().position;
    if !skill.target_in_range(here, target.position) {
        if let Some(range) = skill.required_range() {
            let dest = approach_point(here, target.position, range);
            if npc.character().dest() != dest {
                npc.set_dest_point(dest);
            }
        }
        return true;
    }

    let c = npc.character();
    if c.global_cooldown > 0 || c.casting.is_some() {
        return true;
    }
    if let Err(e) = npc.use_skill(&skill.id) {
        tracing::debug!(npc = %npc.id(), skill = %skill.id, error = %e, "skill refused");
    }
    true
}

/// First active skill off cooldown, in list order
fn combat_skill(npc: &Character) -> Option<&Skill> {
    npc.skills.iter().find(|s| s.combat_ready())
}

/// Point `range` short of `target` along the axis of greatest displacement
fn approach_point(from: Position, target: Position, range: f32) -> Position {
    let dx = target.x - from.x;
    let dy = target.y - from.y;
    if dx.abs() >= dy.abs() {
        Position::new(target.x - range * dx.signum(), target.y)
    } else {
        Position::new(target.x, target.y - range * dy.signum())
    }
}
