//! Controlled NPC proxy
//!
//! Wraps the server's character state. Every mutation the controller makes
//! goes through here, and when a sink is attached each one is mirrored to
//! the server as an intent.

use std::sync::Arc;

use crate::core::types::{ObjectId, Position};
use crate::net::{IntentSink, Request};
use crate::world::{Character, UseError};

pub struct Npc {
    id: ObjectId,
    character: Character,
    sink: Option<Arc<dyn IntentSink>>,
}

impl Npc {
    pub fn new(character: Character, sink: Option<Arc<dyn IntentSink>>) -> Self {
        Self {
            id: character.object_id(),
            character,
            sink,
        }
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn is_online(&self) -> bool {
        self.sink.is_some()
    }

    pub fn set_sink(&mut self, sink: Option<Arc<dyn IntentSink>>) {
        self.sink = sink;
    }

    /// Replace the wrapped state with a newer authoritative copy
    pub fn refresh(&mut self, character: Character) {
        debug_assert!(character.is(&self.id));
        self.character = character;
    }

    pub fn set_dest_point(&mut self, pos: Position) {
        self.character.set_dest(pos);
        self.emit("move", Request::move_to(&self.id, pos));
    }

    pub fn set_target(&mut self, target: Option<&ObjectId>) {
        self.character.set_target(target.cloned());
        self.emit("target", Request::target(&self.id, target));
    }

    /// Use a skill. Nothing is sent if the local state refuses it.
    pub fn use_skill(&mut self, skill_id: &str) -> Result<(), UseError> {
        let skill = self.character.use_skill(skill_id)?.object_id();
        self.emit("use", Request::use_object(&self.id, &skill));
        Ok(())
    }

    pub fn add_chat_message(&mut self, text: &str) {
        self.character.add_chat_message(text);
        self.emit("chat", Request::chat(&self.id, text));
    }

    fn emit(&self, kind: &str, request: Request) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(e) = sink.post(request) {
            tracing::warn!(npc = %self.id, kind, error = %e, "unable to send request");
        }
    }
}

impl std::fmt::Debug for Npc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Npc")
            .field("id", &self.id)
            .field("online", &self.is_online())
            .finish()
    }
}
