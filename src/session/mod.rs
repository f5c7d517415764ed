//! Client session: the context shared by the push handler and the tick
//!
//! The session owns everything both flows touch: the roster, the cached
//! world snapshot, the pause flag and the outbound sink. Pushes come in on
//! the transport's dispatch task via `handle_response`; the simulation
//! loop calls `tick`.

mod protocol;

pub use protocol::{ProtocolState, TransitionError};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::ai::{Controller, Npc, ReconcileReport, Roster, TickReport};
use crate::core::config::{ClientConfig, UserConfig};
use crate::core::error::{IgniteError, Result};
use crate::core::types::{Millis, ObjectId};
use crate::net::{CharacterRef, Connection, IntentSink, Request, Response, TradeProposal};
use crate::trade::{TradeArbitrator, TradeDecision, TradeError};
use crate::world::{ModuleData, WorldSnapshot, WorldView};

type SyncedHook = Box<dyn FnOnce(&Session) + Send>;

pub struct Session {
    roster: Roster,
    world: RwLock<Option<Arc<WorldSnapshot>>>,
    paused: AtomicBool,
    state: Mutex<ProtocolState>,
    controller: Mutex<Controller>,
    arbitrator: Mutex<TradeArbitrator>,
    sink: RwLock<Option<Arc<dyn IntentSink>>>,
    on_synced: Mutex<Option<SyncedHook>>,
}

impl Session {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_controller(Controller::new(config.ai.clone()), config.client.trade_memory)
    }

    pub fn with_controller(controller: Controller, trade_memory: usize) -> Self {
        Self {
            roster: Roster::new(),
            world: RwLock::new(None),
            paused: AtomicBool::new(false),
            state: Mutex::new(ProtocolState::Disconnected),
            controller: Mutex::new(controller),
            arbitrator: Mutex::new(TradeArbitrator::new(trade_memory)),
            sink: RwLock::new(None),
            on_synced: Mutex::new(None),
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Current authoritative snapshot, if one was received
    pub fn world(&self) -> Option<Arc<WorldSnapshot>> {
        self.world.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn state(&self) -> ProtocolState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn sink(&self) -> Option<Arc<dyn IntentSink>> {
        self.sink.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Run `hook` once, when the first non-login push arrives
    pub fn set_on_synced(&self, hook: impl FnOnce(&Session) + Send + 'static) {
        *self.on_synced.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    /// Route intents to `sink`, including those of NPCs already held
    pub fn attach(&self, sink: Arc<dyn IntentSink>) {
        *self.sink.write().unwrap_or_else(PoisonError::into_inner) = Some(sink.clone());
        self.roster.write(|t| {
            for npc in t.values_mut() {
                npc.set_sink(Some(sink.clone()));
            }
        });
        self.transition(ProtocolState::AwaitingLogin);
    }

    /// Attach a live connection and register this session as its handler
    ///
    /// The handler holds the session weakly; the session holds the
    /// connection as its sink.
    pub fn attach_connection(self: &Arc<Self>, conn: &Connection) {
        let session = Arc::downgrade(self);
        conn.set_handler(Arc::new(move |resp| match session.upgrade() {
            Some(session) => session.handle_response(resp),
            None => tracing::debug!("session dropped, ignoring push"),
        }));
        self.attach(Arc::new(conn.clone()));
    }

    /// Drop the sink; NPC changes become local only
    pub fn detach(&self) {
        *self.sink.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.roster.write(|t| {
            for npc in t.values_mut() {
                npc.set_sink(None);
            }
        });
        self.transition(ProtocolState::Disconnected);
    }

    pub fn login(&self, user: &UserConfig) -> Result<()> {
        tracing::info!(user = %user.id, "sending login request");
        self.post(Request::login(user.id.clone(), user.pass.clone()))
    }

    /// Ask the server for an update push
    pub fn request_update(&self) -> Result<()> {
        self.post(Request::default())
    }

    fn post(&self, request: Request) -> Result<()> {
        let sink = self.sink().ok_or(IgniteError::Closed)?;
        sink.post(request)
    }

    /// Apply one server push
    ///
    /// Order: world update, pause flag, roster, trades, errors. No part of
    /// a push can fail the others.
    pub fn handle_response(&self, resp: Response) {
        if resp.logon {
            tracing::debug!("login acknowledged");
            if self.state() == ProtocolState::AwaitingLogin {
                if let Err(e) = self.request_update() {
                    tracing::warn!(error = %e, "unable to send update request");
                }
            }
        } else {
            self.mark_synced();
        }

        if let Some(update) = resp.update {
            self.install_world(update.module);
        }
        if let Some(paused) = resp.paused {
            self.set_paused(paused);
        }
        if let Some(characters) = resp.character {
            self.reconcile(&characters);
        }
        for trade in &resp.trade {
            if let Err(e) = self.evaluate_trade(trade) {
                tracing::warn!(trade = trade.id, error = %e, "unable to handle trade");
            }
        }
        for err in &resp.error {
            tracing::warn!(error = %err, "game server error");
        }
    }

    /// Replace the cached world with a new authoritative generation
    ///
    /// Held NPCs take their state from the new snapshot; those missing
    /// from it are dropped. World and roster change under the roster
    /// lock, so a tick never mixes generations.
    pub fn install_world(&self, data: ModuleData) {
        let snapshot = Arc::new(WorldSnapshot::new(data));
        self.roster.write(|t| {
            {
                let mut world = self.world.write().unwrap_or_else(PoisonError::into_inner);
                drop(world.take());
                *world = Some(Arc::clone(&snapshot));
            }
            t.retain(|id, npc| match snapshot.resolve(id) {
                Some(c) => {
                    npc.refresh(c.clone());
                    true
                }
                None => {
                    tracing::warn!(id = %id, "controlled character missing from new module");
                    false
                }
            });
        });
        tracing::info!(
            module = %snapshot.module_id(),
            characters = snapshot.character_count(),
            "world snapshot installed"
        );
    }

    pub fn set_paused(&self, paused: bool) {
        if self.paused.swap(paused, Ordering::AcqRel) != paused {
            tracing::info!(paused, "world pause changed");
        }
    }

    /// Make the roster match the controlled set named by a push
    pub fn reconcile(&self, characters: &[CharacterRef]) -> ReconcileReport {
        let world = self.world();
        let sink = self.sink();
        let ids: Vec<ObjectId> = characters.iter().map(CharacterRef::object_id).collect();

        let report = self.roster.reconcile(&ids, |id| {
            let character = world.as_deref()?.resolve(id)?;
            Some(Npc::new(character.clone(), sink.clone()))
        });

        for id in &report.unresolved {
            tracing::warn!(id = %id, "unable to find character in module");
        }
        if !report.is_noop() {
            tracing::info!(
                added = report.added.len(),
                removed = report.removed.len(),
                total = self.roster.len(),
                "roster reconciled"
            );
        }
        report
    }

    pub fn evaluate_trade(&self, proposal: &TradeProposal) -> std::result::Result<TradeDecision, TradeError> {
        let world = self.world().unwrap_or_default();
        let sink = self.sink();
        self.arbitrator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .evaluate(proposal, world.as_ref(), sink.as_deref())
    }

    /// Drive the controller for one tick of `delta` milliseconds
    ///
    /// Does nothing until a world snapshot has been installed. The world is
    /// read under the roster lock, the same order `install_world` uses.
    pub fn tick(&self, delta: Millis) -> TickReport {
        let paused = self.is_paused();
        let mut controller = self.controller.lock().unwrap_or_else(PoisonError::into_inner);
        self.roster.write(|t| match self.world() {
            Some(world) => controller.update(delta, t, world.as_ref(), paused),
            None => TickReport::default(),
        })
    }

    fn mark_synced(&self) {
        let first = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let first = *state != ProtocolState::Synced;
            *state = ProtocolState::Synced;
            first
        };
        if !first {
            return;
        }
        tracing::info!("session synced with server");
        let hook = self.on_synced.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(hook) = hook {
            hook(self);
        }
    }

    fn transition(&self, next: ProtocolState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = state.check(next) {
            tracing::debug!(error = %e, "unusual protocol transition");
        }
        *state = next;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("roster", &self.roster.len())
            .field("paused", &self.is_paused())
            .finish()
    }
}
