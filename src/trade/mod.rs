//! Trade offer arbitration
//!
//! A proposal names a seller, a buyer and two item sets. The local side
//! accepts when what it receives is worth at least what it gives up.

pub mod arbitrator;

pub use arbitrator::{TradeArbitrator, TradeDecision, TradeError};
