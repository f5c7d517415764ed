//! NPC control: proxies, the roster and the behavior controller

pub mod controller;
pub mod npc;
pub mod roster;

pub use controller::{Controller, TickReport};
pub use npc::Npc;
pub use roster::{ReconcileReport, Roster, RosterTable};
