//! Server transport and wire messages

pub mod connection;
pub mod message;

pub use connection::{Connection, Handler};
pub use message::{CharacterRef, Request, Response, TradeProposal, Update};

use std::sync::{Mutex, PoisonError};

use crate::core::error::Result;

/// Outbound channel for client intents
///
/// Implementations must not block: the tick posts intents and moves on.
pub trait IntentSink: Send + Sync {
    fn post(&self, request: Request) -> Result<()>;
}

/// Sink that keeps every posted request in memory
///
/// Used for offline runs and to observe what the controller would send.
#[derive(Debug, Default)]
pub struct RecordingSink {
    requests: Mutex<Vec<Request>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything posted so far
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Remove and return everything posted so far
    pub fn take(&self) -> Vec<Request> {
        std::mem::take(&mut *self.requests.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IntentSink for RecordingSink {
    fn post(&self, request: Request) -> Result<()> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        Ok(())
    }
}
