//! Roster of controlled NPCs
//!
//! One lock guards the whole table. Reconciliation replaces the full
//! membership set under a single write, so a tick sees either the old
//! roster or the new one.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use crate::ai::npc::Npc;
use crate::core::types::ObjectId;

/// Ordered by identity, which fixes the per-tick evaluation order
pub type RosterTable = BTreeMap<ObjectId, Npc>;

/// Outcome of one membership reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<ObjectId>,
    pub removed: Vec<ObjectId>,
    pub unresolved: Vec<ObjectId>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Roster {
    table: RwLock<RosterTable>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with shared access to the table
    pub fn read<R>(&self, f: impl FnOnce(&RosterTable) -> R) -> R {
        let guard = self.table.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run `f` with exclusive access to the table
    pub fn write<R>(&self, f: impl FnOnce(&mut RosterTable) -> R) -> R {
        let mut guard = self.table.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn len(&self) -> usize {
        self.read(|t| t.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.read(|t| t.contains_key(id))
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        self.read(|t| t.keys().cloned().collect())
    }

    /// Make the roster match `present` exactly
    ///
    /// Identities already in the roster keep their proxy. New identities
    /// are built with `resolve` outside the lock; those it cannot build are
    /// reported as unresolved and skipped. Removals and additions are then
    /// applied in one write.
    pub fn reconcile<F>(&self, present: &[ObjectId], mut resolve: F) -> ReconcileReport
    where
        F: FnMut(&ObjectId) -> Option<Npc>,
    {
        let wanted: BTreeSet<&ObjectId> = present.iter().collect();
        let missing: Vec<&ObjectId> =
            self.read(|t| wanted.iter().copied().filter(|id| !t.contains_key(*id)).collect());

        let mut report = ReconcileReport::default();
        let mut fresh = Vec::with_capacity(missing.len());
        for id in missing {
            match resolve(id) {
                Some(npc) => fresh.push(npc),
                None => report.unresolved.push(id.clone()),
            }
        }

        self.write(|t| {
            let stale: Vec<ObjectId> =
                t.keys().filter(|id| !wanted.contains(id)).cloned().collect();
            for id in stale {
                t.remove(&id);
                report.removed.push(id);
            }
            for npc in fresh {
                if !t.contains_key(npc.id()) {
                    report.added.push(npc.id().clone());
                    t.insert(npc.id().clone(), npc);
                }
            }
        });

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Character;

    fn ids(names: &[&str]) -> Vec<ObjectId> {
        names.iter().map(|n| ObjectId::new(*n, "0")).collect()
    }

    fn build(id: &ObjectId) -> Option<Npc> {
        Some(Npc::new(Character::new(id.id.clone(), id.serial.clone()), None))
    }

    #[test]
    fn test_repeat_reconcile_is_noop() {
        let roster = Roster::new();
        roster.reconcile(&ids(&["a"]), build);
        let report = roster.reconcile(&ids(&["a"]), build);
        assert!(report.is_noop());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_reconcile_is_set_replace() {
        let roster = Roster::new();
        roster.reconcile(&ids(&["a", "b"]), build);

        let report = roster.reconcile(&ids(&["b", "c"]), build);
        assert_eq!(roster.ids(), ids(&["b", "c"]));
        assert_eq!(report.added, ids(&["c"]));
        assert_eq!(report.removed, ids(&["a"]));
    }

    #[test]
    fn test_reconcile_keeps_existing_proxy() {
        let roster = Roster::new();
        roster.reconcile(&ids(&["a"]), build);
        roster.write(|t| {
            if let Some(npc) = t.get_mut(&ObjectId::new("a", "0")) {
                npc.add_chat_message("marker");
            }
        });

        let report = roster.reconcile(&ids(&["a"]), |_| panic!("should not rebuild"));
        assert!(report.is_noop());
        let chat = roster.read(|t| t[&ObjectId::new("a", "0")].character().chat_log.len());
        assert_eq!(chat, 1);
    }

    #[test]
    fn test_reconcile_skips_unresolved() {
        let roster = Roster::new();
        let report = roster.reconcile(&ids(&["a", "ghost", "b"]), |id| {
            if id.id == "ghost" {
                None
            } else {
                build(id)
            }
        });
        assert_eq!(roster.ids(), ids(&["a", "b"]));
        assert_eq!(report.unresolved, ids(&["ghost"]));
    }

    #[test]
    fn test_reconcile_dedupes_push() {
        let roster = Roster::new();
        roster.reconcile(&ids(&["a", "a", "a"]), build);
        assert_eq!(roster.len(), 1);
    }
}
