//! Ignite - headless game client that drives server-side NPCs

pub mod ai;
pub mod core;
pub mod net;
pub mod session;
pub mod spatial;
pub mod trade;
pub mod world;
